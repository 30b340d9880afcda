//! A single launch attempt against one domain.

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use super::Poller;
use crate::classify::AttemptOutcome;
use crate::provider::{AvailabilityDomain, ComputeProvider, ProviderError, ProviderFuture};
use crate::timer::Sleeper;

impl<P, S> Poller<P, S>
where
    P: ComputeProvider,
    S: Sleeper,
{
    /// Launches the template in `domain` and classifies the result. Returns
    /// `None` when shutdown interrupts the call.
    pub(in crate::poller) async fn attempt(
        &self,
        domain: &AvailabilityDomain,
        shutdown: &CancellationToken,
    ) -> Option<AttemptOutcome> {
        let request = self.spec.for_domain(domain);
        info!("sending launch request to {}", domain.name);
        let result = self
            .bounded(self.provider.launch_instance(&request), shutdown)
            .await?;
        let outcome = self.classifier.outcome(result);
        log_outcome(&domain.name, &outcome);
        Some(outcome)
    }

    /// Awaits a provider call under the call timeout. Returns `None` when
    /// shutdown wins the race.
    pub(in crate::poller) async fn bounded<T>(
        &self,
        call: ProviderFuture<'_, T>,
        shutdown: &CancellationToken,
    ) -> Option<Result<T, ProviderError>> {
        let limit = self.schedule.call_timeout;
        tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            result = tokio::time::timeout(limit, call) => Some(result.unwrap_or_else(|_| {
                Err(ProviderError::Timeout {
                    seconds: limit.as_secs(),
                })
            })),
        }
    }
}

fn log_outcome(domain: &str, outcome: &AttemptOutcome) {
    match outcome {
        AttemptOutcome::Success(instance) => info!(
            "instance {} ({}) created in {domain}, state {}",
            instance.id, instance.display_name, instance.lifecycle_state
        ),
        AttemptOutcome::RateLimited => warn!("too many requests in {domain}"),
        AttemptOutcome::CapacityExhausted => info!("{domain}: out of host capacity"),
        AttemptOutcome::OtherError(err) => {
            error!("failed to create instance in {domain}: {err}");
        }
    }
}
