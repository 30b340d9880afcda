//! Polling loop that repeatedly tries to launch an instance across
//! availability domains.
//!
//! [`Poller::run`] drives cycles until shutdown is requested: each cycle
//! fetches the domain list, walks it with the configured
//! [`DomainStrategy`], then waits before the next cycle. Errors inside a
//! cycle are logged and counted; they never stop the loop.

mod attempt;
mod sequential;
mod single_pass;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::{error, info};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::classify::ErrorClassifier;
use crate::provider::{ComputeProvider, LaunchSpec, LaunchedInstance, ProviderError};
use crate::timer::{Sleeper, Waiter};

/// How a cycle walks the domain list.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DomainStrategy {
    /// Retries a throttled domain with exponential backoff, abandons the
    /// cycle when a domain is out of capacity.
    #[default]
    Sequential,
    /// Tries each domain once, abandons the cycle after a long wait when
    /// throttled.
    SinglePass,
}

impl DomainStrategy {
    /// Configuration spelling of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::SinglePass => "single-pass",
        }
    }
}

impl fmt::Display for DomainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "single-pass" | "single_pass" => Ok(Self::SinglePass),
            other => Err(format!(
                "unknown strategy '{other}', expected 'sequential' or 'single-pass'"
            )),
        }
    }
}

/// Timing and retry knobs for the loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSchedule {
    /// Domain iteration strategy.
    pub strategy: DomainStrategy,
    /// Per-domain backoff used by the sequential strategy.
    pub backoff: BackoffPolicy,
    /// Pacing delay between domains.
    pub domain_interval: Duration,
    /// Delay between cycles.
    pub retry_wait: Duration,
    /// Rate-limit delay used by the single-pass strategy.
    pub long_wait: Duration,
    /// Upper bound on each provider call.
    pub call_timeout: Duration,
    /// Stop after the first launched instance.
    pub exit_on_success: bool,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            strategy: DomainStrategy::Sequential,
            backoff: BackoffPolicy::new(Duration::from_secs(15), 5),
            domain_interval: Duration::from_secs(5),
            retry_wait: Duration::from_secs(64),
            long_wait: Duration::from_secs(600),
            call_timeout: Duration::from_secs(120),
            exit_on_success: false,
        }
    }
}

/// How a single cycle ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CycleOutcome {
    /// An instance was created.
    Launched(LaunchedInstance),
    /// The sequential strategy hit a domain without capacity.
    CapacityExhausted {
        /// Domain that reported no capacity.
        domain: String,
    },
    /// The single-pass strategy was throttled and waited out the long wait.
    RateLimited {
        /// Domain that throttled the request.
        domain: String,
    },
    /// Every domain was tried without success.
    Exhausted {
        /// Launch calls made during the cycle.
        attempts: u32,
    },
    /// Shutdown was requested mid-cycle.
    Cancelled,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launched(instance) => write!(
                f,
                "launched {} in {}",
                instance.id, instance.availability_domain
            ),
            Self::CapacityExhausted { domain } => write!(f, "{domain} is out of host capacity"),
            Self::RateLimited { domain } => write!(f, "rate limited in {domain}"),
            Self::Exhausted { attempts } => {
                write!(f, "no domain accepted the launch after {attempts} attempts")
            }
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PollSummary {
    /// Cycles started.
    pub cycles: u64,
    /// Cycles that ended with an error.
    pub failed_cycles: u64,
    /// Instances created, in creation order.
    pub launched: Vec<LaunchedInstance>,
}

/// Errors that abandon a cycle.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PollerError {
    /// The availability domain list could not be fetched.
    #[error("failed to list availability domains: {0}")]
    DomainListing(#[source] ProviderError),
}

/// Launch loop over a [`ComputeProvider`].
#[derive(Debug)]
pub struct Poller<P, S> {
    provider: P,
    classifier: ErrorClassifier,
    waiter: Waiter<S>,
    spec: LaunchSpec,
    schedule: PollSchedule,
}

impl<P, S> Poller<P, S>
where
    P: ComputeProvider,
    S: Sleeper,
{
    /// Creates a poller with the default error classification table.
    #[must_use]
    pub fn new(provider: P, sleeper: S, spec: LaunchSpec, schedule: PollSchedule) -> Self {
        Self {
            provider,
            classifier: ErrorClassifier::default(),
            waiter: Waiter::new(sleeper),
            spec,
            schedule,
        }
    }

    /// Replaces the error classification table.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Runs cycles until `shutdown` is cancelled, or until the first launch
    /// when the schedule asks for it.
    pub async fn run(&self, shutdown: &CancellationToken) -> PollSummary {
        let mut summary = PollSummary::default();
        info!(
            "polling with the {} strategy, {}s between cycles",
            self.schedule.strategy,
            self.schedule.retry_wait.as_secs()
        );
        while !shutdown.is_cancelled() {
            summary.cycles += 1;
            let cycle = summary.cycles;
            match self.run_cycle(shutdown).await {
                Ok(CycleOutcome::Cancelled) => break,
                Ok(CycleOutcome::Launched(instance)) => {
                    info!("cycle {cycle}: launched {}", instance.id);
                    summary.launched.push(instance);
                    if self.schedule.exit_on_success {
                        break;
                    }
                }
                Ok(outcome) => info!("cycle {cycle}: {outcome}"),
                Err(err) => {
                    summary.failed_cycles += 1;
                    error!("cycle {cycle}: {err}");
                }
            }
            info!(
                "next cycle in {} seconds",
                self.schedule.retry_wait.as_secs()
            );
            if self
                .waiter
                .wait(self.schedule.retry_wait, shutdown)
                .await
                .is_cancelled()
            {
                break;
            }
        }
        info!(
            "poller stopped after {} cycles ({} failed, {} launched)",
            summary.cycles,
            summary.failed_cycles,
            summary.launched.len()
        );
        summary
    }

    /// Runs one cycle: fetches the domain list and walks it once.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::DomainListing`] when the domain list cannot be
    /// fetched.
    pub async fn run_cycle(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<CycleOutcome, PollerError> {
        if shutdown.is_cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }
        let Some(listing) = self
            .bounded(
                self.provider
                    .list_availability_domains(&self.spec.compartment_id),
                shutdown,
            )
            .await
        else {
            return Ok(CycleOutcome::Cancelled);
        };
        let domains = listing.map_err(PollerError::DomainListing)?;
        info!("found {} availability domains", domains.len());

        let outcome = match self.schedule.strategy {
            DomainStrategy::Sequential => self.run_sequential(&domains, shutdown).await,
            DomainStrategy::SinglePass => self.run_single_pass(&domains, shutdown).await,
        };
        Ok(outcome)
    }
}
