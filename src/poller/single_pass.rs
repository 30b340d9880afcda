//! Single-pass strategy with one global rate-limit wait.

use log::warn;
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
    pub(in crate::poller) async fn run_single_pass(
        &self,
        domains: &[AvailabilityDomain],
        shutdown: &CancellationToken,
    ) -> CycleOutcome {
        let mut attempts = 0_u32;
        for (index, domain) in domains.iter().enumerate() {
            let Some(outcome) = self.attempt(domain, shutdown).await else {
                return CycleOutcome::Cancelled;
            };
            attempts = attempts.saturating_add(1);
            match outcome {
                AttemptOutcome::Success(instance) => return CycleOutcome::Launched(instance),
                AttemptOutcome::RateLimited => {
                    let seconds = self.schedule.long_wait.as_secs();
                    warn!("rate limited in {}, pausing for {seconds} seconds", domain.name);
                    if self
                        .waiter
                        .wait_with_default_progress(seconds, shutdown)
                        .await
                        .is_cancelled()
                    {
                        return CycleOutcome::Cancelled;
                    }
                    return CycleOutcome::RateLimited {
                        domain: domain.name.clone(),
                    };
                }
                AttemptOutcome::CapacityExhausted => {
                    let more_domains = index + 1 < domains.len();
                    if more_domains
                        && self
                            .waiter
                            .wait(self.schedule.domain_interval, shutdown)
                            .await
                            .is_cancelled()
                    {
                        return CycleOutcome::Cancelled;
                    }
                }
                AttemptOutcome::OtherError(_) => {}
            }
        }
        CycleOutcome::Exhausted { attempts }
    }
}
