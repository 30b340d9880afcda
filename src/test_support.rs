//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::classify::{OUT_OF_HOST_CAPACITY, TOO_MANY_REQUESTS};
use crate::oci::{CommandError, CommandFuture, CommandOutput, CommandRunner};
use crate::provider::{
    AvailabilityDomain, ComputeProvider, LaunchRequest, LaunchedInstance, ProviderError,
    ProviderFuture,
};
use crate::timer::{SleepFuture, Sleeper};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleeper that completes immediately and records every requested delay.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    recorded: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delay requested so far, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.recorded).clone()
    }

    /// Returns the recorded delays in whole seconds.
    #[must_use]
    pub fn recorded_secs(&self) -> Vec<u64> {
        self.recorded().iter().map(Duration::as_secs).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        lock(&self.recorded).push(duration);
        Box::pin(std::future::ready(()))
    }
}

/// Canned response for a launch call.
#[derive(Clone, Debug)]
enum ScriptedLaunch {
    Respond(Result<LaunchedInstance, ProviderError>),
    Hang,
}

#[derive(Debug, Default)]
struct ProviderState {
    listings: VecDeque<Result<Vec<AvailabilityDomain>, ProviderError>>,
    launches: HashMap<String, VecDeque<ScriptedLaunch>>,
    list_calls: usize,
    launch_calls: Vec<String>,
    drained: bool,
}

/// Provider double driven by queued listings and per-domain launch results.
///
/// Once the listing queue is drained the provider returns empty listings and
/// reports [`ScriptedProvider::is_drained`]. Wrap it in [`StopWhenDrained`]
/// to stop the poller loop at that point.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    /// Creates a provider with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful domain listing.
    pub fn push_domains(&self, names: &[&str]) {
        let domains = names.iter().map(|name| AvailabilityDomain::new(*name)).collect();
        lock(&self.state).listings.push_back(Ok(domains));
    }

    /// Queues a failed domain listing.
    pub fn push_listing_failure(&self, error: ProviderError) {
        lock(&self.state).listings.push_back(Err(error));
    }

    /// Whether a listing was requested after the listing queue ran out.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        lock(&self.state).drained
    }

    /// Queues a raw launch result for `domain`.
    pub fn push_launch(&self, domain: &str, result: Result<LaunchedInstance, ProviderError>) {
        self.push(domain, ScriptedLaunch::Respond(result));
    }

    /// Queues a successful launch in `domain`.
    pub fn push_success(&self, domain: &str) {
        self.push_launch(domain, Ok(instance_in(domain)));
    }

    /// Queues `times` throttled responses for `domain`.
    pub fn push_rate_limited(&self, domain: &str, times: usize) {
        for _ in 0..times {
            self.push_launch(domain, Err(rate_limited_error()));
        }
    }

    /// Queues an out-of-capacity response for `domain`.
    pub fn push_capacity_exhausted(&self, domain: &str) {
        self.push_launch(domain, Err(capacity_error()));
    }

    /// Queues an unrecognised failure for `domain`.
    pub fn push_other_error(&self, domain: &str, message: &str) {
        self.push_launch(
            domain,
            Err(ProviderError::Service {
                status: 400,
                code: String::from("InvalidParameter"),
                message: message.to_owned(),
            }),
        );
    }

    /// Makes the next launch in `domain` never complete.
    pub fn push_hang(&self, domain: &str) {
        self.push(domain, ScriptedLaunch::Hang);
    }

    /// Number of domain listings requested so far.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        lock(&self.state).list_calls
    }

    /// Domains targeted by launch calls, in call order.
    #[must_use]
    pub fn launch_calls(&self) -> Vec<String> {
        lock(&self.state).launch_calls.clone()
    }

    /// Number of launch calls made against `domain`.
    #[must_use]
    pub fn launch_calls_for(&self, domain: &str) -> usize {
        lock(&self.state)
            .launch_calls
            .iter()
            .filter(|called| called.as_str() == domain)
            .count()
    }

    fn push(&self, domain: &str, launch: ScriptedLaunch) {
        lock(&self.state)
            .launches
            .entry(domain.to_owned())
            .or_default()
            .push_back(launch);
    }
}

impl ComputeProvider for ScriptedProvider {
    fn list_availability_domains<'a>(
        &'a self,
        _compartment_id: &'a str,
    ) -> ProviderFuture<'a, Vec<AvailabilityDomain>> {
        let mut state = lock(&self.state);
        state.list_calls += 1;
        let next = state.listings.pop_front();
        let result = next.unwrap_or_else(|| {
            state.drained = true;
            Ok(Vec::new())
        });
        drop(state);
        Box::pin(std::future::ready(result))
    }

    fn launch_instance<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, LaunchedInstance> {
        let domain = request.availability_domain.clone();
        let mut state = lock(&self.state);
        state.launch_calls.push(domain.clone());
        let next = state
            .launches
            .get_mut(&domain)
            .and_then(VecDeque::pop_front);
        drop(state);
        match next {
            Some(ScriptedLaunch::Respond(result)) => Box::pin(std::future::ready(result)),
            Some(ScriptedLaunch::Hang) => Box::pin(std::future::pending::<
                Result<LaunchedInstance, ProviderError>,
            >()),
            None => Box::pin(std::future::ready(Err(ProviderError::Transport {
                message: format!("no scripted launch response for {domain}"),
            }))),
        }
    }
}

/// Delegates to a [`ScriptedProvider`] and cancels `shutdown` as soon as a
/// listing finds the scripted queue drained.
#[derive(Clone, Debug)]
pub struct StopWhenDrained {
    provider: ScriptedProvider,
    shutdown: CancellationToken,
}

impl StopWhenDrained {
    /// Wraps `provider`, cancelling `shutdown` once it is drained.
    #[must_use]
    pub const fn new(provider: ScriptedProvider, shutdown: CancellationToken) -> Self {
        Self { provider, shutdown }
    }
}

impl ComputeProvider for StopWhenDrained {
    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ProviderFuture<'a, Vec<AvailabilityDomain>> {
        let listing = self.provider.list_availability_domains(compartment_id);
        if self.provider.is_drained() {
            self.shutdown.cancel();
        }
        listing
    }

    fn launch_instance<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, LaunchedInstance> {
        self.provider.launch_instance(request)
    }
}

/// Instance reference used by scripted successes.
#[must_use]
pub fn instance_in(domain: &str) -> LaunchedInstance {
    LaunchedInstance {
        id: format!("ocid1.instance.oc1..{}", domain.to_ascii_lowercase()),
        display_name: String::from("myOciInstance"),
        availability_domain: domain.to_owned(),
        lifecycle_state: String::from("PROVISIONING"),
        shape: String::from("VM.Standard.A1.Flex"),
    }
}

/// Error the provider returns when throttling.
#[must_use]
pub fn rate_limited_error() -> ProviderError {
    ProviderError::Service {
        status: 429,
        code: TOO_MANY_REQUESTS.to_owned(),
        message: String::from("Too many requests for the user"),
    }
}

/// Error the provider returns when a domain is out of capacity.
#[must_use]
pub fn capacity_error() -> ProviderError {
    ProviderError::Service {
        status: 500,
        code: String::from("InternalError"),
        message: OUT_OF_HOST_CAPACITY.to_owned(),
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic `oci` CLI outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the value following `flag`, if present.
    #[must_use]
    pub fn flag_value(&self, flag: &str) -> Option<String> {
        self.args
            .iter()
            .skip_while(|arg| arg.to_string_lossy() != flag)
            .nth(1)
            .map(|value| value.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Pushes a successful run printing `stdout`.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing run printing `stderr`.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let next = lock(&self.responses).pop_front();
        let result = next.ok_or_else(|| CommandError::Spawn {
            program: program.to_owned(),
            message: String::from("no scripted response available"),
        });
        Box::pin(std::future::ready(result))
    }
}

/// Renders the `ServiceError` block the `oci` CLI prints on stderr.
#[must_use]
pub fn oci_service_error(status: u16, code: &str, message: &str) -> String {
    format!(
        concat!(
            "ServiceError:\n{{\n",
            "    \"client_version\": \"Oracle-PythonSDK/2.126.0, Oracle-PythonCLI/3.45.0\",\n",
            "    \"code\": \"{code}\",\n",
            "    \"message\": \"{message}\",\n",
            "    \"opc-request-id\": \"ABC123\",\n",
            "    \"operation_name\": \"launch_instance\",\n",
            "    \"status\": {status},\n",
            "    \"target_service\": \"compute\"\n",
            "}}\n"
        ),
        code = code,
        message = message,
        status = status
    )
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets `pairs` and removes `unset` while holding a global mutex.
    pub async fn apply(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| *key)
                    .chain(unset.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard::apply"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in unset {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
