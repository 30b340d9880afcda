//! BDD harness for the launch poller.

mod bdd_steps;
mod scenarios;
mod test_helpers;
