//! Command-line interface definitions for the `oci-poller` binary.
//!
//! The daemon is configured entirely through the environment; the parser
//! only provides `--help` and `--version`. It lives here so the build script
//! can reuse it when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `oci-poller` binary.
#[derive(Debug, Parser)]
#[command(
    name = "oci-poller",
    version,
    about = "Keep asking Oracle Cloud for a compute instance until an availability domain has capacity",
    after_help = "Configuration is read from the environment and from a .env file in the \
                  working directory. Required: OCI_IMAGE_ID, OCI_COMPARTMENT_ID, \
                  OCI_SUBNET_ID, SSH_KEY_PUB. Set RUST_LOG to change log verbosity."
)]
pub(crate) struct Cli {}
