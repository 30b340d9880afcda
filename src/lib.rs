//! Core library for the `oci-poller` daemon.
//!
//! The crate keeps asking Oracle Cloud Infrastructure for a compute instance
//! until some availability domain has capacity. It exposes a provider
//! abstraction, an `oci` CLI implementation of it, an error classifier that
//! turns launch failures into retry decisions, and the polling loop that
//! ties them together with backoff and pacing.

pub mod backoff;
pub mod classify;
pub mod config;
pub mod oci;
pub mod poller;
pub mod provider;
pub mod test_support;
pub mod timer;

pub use backoff::{BackoffPolicy, BackoffState};
pub use classify::{AttemptOutcome, ClassificationRule, ErrorClassifier, ErrorPattern, FailureClass};
pub use config::{ConfigError, OciConfig, PollerConfig, Settings};
pub use oci::{OciCliConfig, OciCliError, OciCliProvider, ProcessCommandRunner};
pub use poller::{CycleOutcome, DomainStrategy, PollSchedule, PollSummary, Poller, PollerError};
pub use provider::{
    AvailabilityDomain, ComputeProvider, LaunchRequest, LaunchSpec, LaunchSpecBuilder,
    LaunchSpecError, LaunchedInstance, ProviderError,
};
pub use timer::{Sleeper, TokioSleeper, WaitStatus, Waiter};
