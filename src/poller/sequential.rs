//! Sequential strategy with per-domain exponential backoff.

use std::ops::ControlFlow;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::{CycleOutcome, Poller};
use crate::classify::AttemptOutcome;
use crate::provider::{AvailabilityDomain, ComputeProvider};
use crate::timer::Sleeper;

impl<P, S> Poller<P, S>
where
    P: ComputeProvider,
    S: Sleeper,
{
    /// Walks `domains` in order. The pacing delay runs before each domain
    /// after the first, so nothing is paced after the last domain.
    pub(in crate::poller) async fn run_sequential(
        &self,
        domains: &[AvailabilityDomain],
        shutdown: &CancellationToken,
    ) -> CycleOutcome {
        let mut attempts = 0_u32;
        for (index, domain) in domains.iter().enumerate() {
            if index > 0
                && self
                    .waiter
                    .wait(self.schedule.domain_interval, shutdown)
                    .await
                    .is_cancelled()
            {
                return CycleOutcome::Cancelled;
            }
            if let ControlFlow::Break(outcome) =
                self.work_domain(domain, &mut attempts, shutdown).await
            {
                return outcome;
            }
        }
        CycleOutcome::Exhausted { attempts }
    }

    /// Retries `domain` while it keeps throttling. `Continue` moves on to
    /// the next domain; `Break` ends the cycle.
    async fn work_domain(
        &self,
        domain: &AvailabilityDomain,
        attempts: &mut u32,
        shutdown: &CancellationToken,
    ) -> ControlFlow<CycleOutcome> {
        let mut backoff = self.schedule.backoff.start();
        while backoff.has_attempts_left() {
            let Some(outcome) = self.attempt(domain, shutdown).await else {
                return ControlFlow::Break(CycleOutcome::Cancelled);
            };
            *attempts = attempts.saturating_add(1);
            match outcome {
                AttemptOutcome::Success(instance) => {
                    return ControlFlow::Break(CycleOutcome::Launched(instance));
                }
                AttemptOutcome::CapacityExhausted => {
                    return ControlFlow::Break(CycleOutcome::CapacityExhausted {
                        domain: domain.name.clone(),
                    });
                }
                AttemptOutcome::OtherError(_) => return ControlFlow::Continue(()),
                AttemptOutcome::RateLimited => {
                    let delay = backoff.record_throttled();
                    info!(
                        "waiting {} seconds before retrying {}",
                        delay.as_secs(),
                        domain.name
                    );
                    if self.waiter.wait(delay, shutdown).await.is_cancelled() {
                        return ControlFlow::Break(CycleOutcome::Cancelled);
                    }
                }
            }
        }
        warn!(
            "giving up on {} after {} throttled attempts",
            domain.name,
            backoff.attempt_index()
        );
        ControlFlow::Continue(())
    }
}
