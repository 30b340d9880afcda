//! Shared fixtures and helpers for poller BDD scenarios.

use oci_poller::test_support::{RecordingSleeper, ScriptedProvider, StopWhenDrained};
use oci_poller::{CycleOutcome, LaunchSpec, PollSchedule, PollSummary, Poller};
use rstest::fixture;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct PollerContext {
    pub provider: ScriptedProvider,
    pub sleeper: RecordingSleeper,
    pub schedule: PollSchedule,
    pub cycle: Option<Result<CycleOutcome, String>>,
    pub summary: Option<PollSummary>,
}

#[fixture]
pub fn poller_context() -> PollerContext {
    PollerContext {
        provider: ScriptedProvider::new(),
        sleeper: RecordingSleeper::new(),
        schedule: PollSchedule::default(),
        cycle: None,
        summary: None,
    }
}

impl PollerContext {
    pub fn poller(&self) -> Poller<ScriptedProvider, RecordingSleeper> {
        Poller::new(
            self.provider.clone(),
            self.sleeper.clone(),
            launch_spec(),
            self.schedule,
        )
    }

    /// Poller that cancels `shutdown` once the scripted listings run out.
    pub fn draining_poller(
        &self,
        shutdown: &CancellationToken,
    ) -> Poller<StopWhenDrained, RecordingSleeper> {
        Poller::new(
            StopWhenDrained::new(self.provider.clone(), shutdown.clone()),
            self.sleeper.clone(),
            launch_spec(),
            self.schedule,
        )
    }
}

pub fn launch_spec() -> LaunchSpec {
    LaunchSpec::builder()
        .compartment_id("ocid1.compartment.oc1..bdd")
        .shape("VM.Standard.A1.Flex")
        .ocpus(4)
        .memory_in_gbs(24)
        .display_name("myOciInstance")
        .image_id("ocid1.image.oc1..bdd")
        .subnet_id("ocid1.subnet.oc1..bdd")
        .ssh_public_key("ssh-ed25519 AAAAC3Nza bdd@example")
        .build()
        .unwrap_or_else(|err| panic!("launch spec should be valid: {err}"))
}

pub fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}
