//! BDD scenarios for the launch poller.

use rstest_bdd_macros::scenario;

use super::test_helpers::{PollerContext, poller_context};

#[scenario(
    path = "tests/features/poller.feature",
    name = "Capacity exhaustion skips the remaining domains"
)]
fn scenario_capacity_exhaustion(poller_context: PollerContext) {
    let _ = poller_context;
}

#[scenario(
    path = "tests/features/poller.feature",
    name = "A throttled domain is abandoned after the backoff budget"
)]
fn scenario_backoff_budget(poller_context: PollerContext) {
    let _ = poller_context;
}

#[scenario(
    path = "tests/features/poller.feature",
    name = "Single-pass strategy pauses once when throttled"
)]
fn scenario_single_pass_throttle(poller_context: PollerContext) {
    let _ = poller_context;
}

#[scenario(
    path = "tests/features/poller.feature",
    name = "A failed domain listing does not stop the loop"
)]
fn scenario_listing_failure(poller_context: PollerContext) {
    let _ = poller_context;
}
