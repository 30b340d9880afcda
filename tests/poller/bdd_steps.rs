//! BDD step definitions for poller behaviour.

use std::time::Duration;

use oci_poller::test_support::instance_in;
use oci_poller::{CycleOutcome, DomainStrategy, PollSchedule, ProviderError};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{PollerContext, split_list};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a sequential poller")]
fn sequential_poller(mut poller_context: PollerContext) -> PollerContext {
    poller_context.schedule = PollSchedule::default();
    poller_context
}

#[given("a single-pass poller with a {seconds:u64} second long wait")]
fn single_pass_poller(mut poller_context: PollerContext, seconds: u64) -> PollerContext {
    poller_context.schedule = PollSchedule {
        strategy: DomainStrategy::SinglePass,
        long_wait: Duration::from_secs(seconds),
        ..PollSchedule::default()
    };
    poller_context
}

#[given("the provider lists domains \"{names}\"")]
fn provider_lists_domains(poller_context: PollerContext, names: String) -> PollerContext {
    poller_context.provider.push_domains(&split_list(&names));
    poller_context
}

#[given("the next domain listing fails")]
fn next_listing_fails(poller_context: PollerContext) -> PollerContext {
    poller_context
        .provider
        .push_listing_failure(ProviderError::Transport {
            message: String::from("connection reset by peer"),
        });
    poller_context
}

#[given("domain \"{domain}\" is out of host capacity")]
fn domain_out_of_capacity(poller_context: PollerContext, domain: String) -> PollerContext {
    poller_context.provider.push_capacity_exhausted(domain.trim());
    poller_context
}

#[given("domain \"{domain}\" is rate limited {times:usize} times")]
fn domain_rate_limited(poller_context: PollerContext, domain: String, times: usize) -> PollerContext {
    poller_context.provider.push_rate_limited(domain.trim(), times);
    poller_context
}

#[given("domain \"{domain}\" accepts the launch")]
fn domain_accepts(poller_context: PollerContext, domain: String) -> PollerContext {
    poller_context.provider.push_success(domain.trim());
    poller_context
}

#[when("the poller runs one cycle")]
fn run_one_cycle(mut poller_context: PollerContext) -> Result<PollerContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let poller = poller_context.poller();
    let outcome = runtime
        .block_on(poller.run_cycle(&CancellationToken::new()))
        .map_err(|err| err.to_string());
    poller_context.cycle = Some(outcome);
    Ok(poller_context)
}

#[when("the poller runs until the domain list is drained")]
fn run_until_drained(mut poller_context: PollerContext) -> Result<PollerContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let shutdown = CancellationToken::new();
    let poller = poller_context.draining_poller(&shutdown);
    poller_context.summary = Some(runtime.block_on(poller.run(&shutdown)));
    Ok(poller_context)
}

#[then("domain \"{domain}\" received {count:usize} launch requests")]
fn domain_received(
    poller_context: &PollerContext,
    domain: String,
    count: usize,
) -> Result<(), StepError> {
    let actual = poller_context.provider.launch_calls_for(domain.trim());
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} launch requests to {domain}, got {actual}"
        )))
    }
}

#[then("the domain list was fetched {count:usize} times")]
fn domain_list_fetched(poller_context: &PollerContext, count: usize) -> Result<(), StepError> {
    let actual = poller_context.provider.list_calls();
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} listings, got {actual}"
        )))
    }
}

#[then("the recorded waits are \"{waits}\"")]
fn recorded_waits(poller_context: &PollerContext, waits: String) -> Result<(), StepError> {
    let expected = split_list(&waits)
        .into_iter()
        .map(|item| {
            item.parse::<u64>()
                .map_err(|err| StepError::Assertion(format!("bad wait '{item}': {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let actual = poller_context.sleeper.recorded_secs();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected waits {expected:?}, got {actual:?}"
        )))
    }
}

#[then("the cycle launched an instance in \"{domain}\"")]
fn cycle_launched(poller_context: &PollerContext, domain: String) -> Result<(), StepError> {
    let expected = CycleOutcome::Launched(instance_in(domain.trim()));
    match poller_context.cycle.as_ref() {
        Some(Ok(outcome)) if *outcome == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a launch in {domain}, got {other:?}"
        ))),
    }
}

#[then("the cycle was rate limited in \"{domain}\"")]
fn cycle_rate_limited(poller_context: &PollerContext, domain: String) -> Result<(), StepError> {
    match poller_context.cycle.as_ref() {
        Some(Ok(CycleOutcome::RateLimited { domain: limited })) if limited == domain.trim() => {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected rate limiting in {domain}, got {other:?}"
        ))),
    }
}

#[then("the loop recorded {count:u64} failed cycles")]
fn loop_failed_cycles(poller_context: &PollerContext, count: u64) -> Result<(), StepError> {
    let Some(summary) = poller_context.summary.as_ref() else {
        return Err(StepError::Assertion(String::from("missing summary")));
    };
    if summary.failed_cycles == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} failed cycles, got {summary:?}"
        )))
    }
}

#[then("the loop launched {count:usize} instances")]
fn loop_launched(poller_context: &PollerContext, count: usize) -> Result<(), StepError> {
    let Some(summary) = poller_context.summary.as_ref() else {
        return Err(StepError::Assertion(String::from("missing summary")));
    };
    if summary.launched.len() == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} launched instances, got {summary:?}"
        )))
    }
}
