//! Provider implementation that drives the vendor `oci` CLI.
//!
//! Authentication, request signing, and region selection stay with the CLI
//! and its `~/.oci/config` profile; this module only builds arguments and
//! interprets the JSON the CLI prints.

mod command;
mod response;

use std::ffi::OsString;

use log::debug;
use serde_json::json;
use shell_escape::unix::escape;
use thiserror::Error;

use crate::provider::{
    AvailabilityDomain, ComputeProvider, LaunchRequest, LaunchedInstance, ProviderError,
    ProviderFuture,
};

pub use command::{CommandError, CommandFuture, CommandOutput, CommandRunner, ProcessCommandRunner};

/// Default `oci` CLI binary name.
pub const DEFAULT_OCI_BIN: &str = "oci";

/// How to invoke the `oci` CLI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OciCliConfig {
    /// Path to the CLI binary.
    pub bin: String,
    /// Profile from the CLI configuration file, if not the default one.
    pub profile: Option<String>,
    /// CLI configuration file, if not `~/.oci/config`.
    pub config_file: Option<String>,
}

impl OciCliConfig {
    /// Constructs a config, trimming whitespace and dropping blank optional
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`OciCliError::InvalidConfig`] when the binary is blank.
    pub fn new(
        bin: impl Into<String>,
        profile: Option<String>,
        config_file: Option<String>,
    ) -> Result<Self, OciCliError> {
        let trimmed_bin = bin.into().trim().to_owned();
        if trimmed_bin.is_empty() {
            return Err(OciCliError::InvalidConfig {
                field: String::from("bin"),
            });
        }
        Ok(Self {
            bin: trimmed_bin,
            profile: non_blank(profile),
            config_file: non_blank(config_file),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_owned())
        .filter(|inner| !inner.is_empty())
}

/// Errors raised while configuring the CLI provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OciCliError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
}

/// [`ComputeProvider`] backed by the `oci` CLI.
#[derive(Clone, Debug)]
pub struct OciCliProvider<R: CommandRunner> {
    config: OciCliConfig,
    runner: R,
}

impl OciCliProvider<ProcessCommandRunner> {
    /// Creates a provider wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: OciCliConfig) -> Self {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> OciCliProvider<R> {
    /// Creates a provider using the given configuration and runner.
    #[must_use]
    pub const fn new(config: OciCliConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Appends profile, config file, output format and `--no-retry`. Retries
    /// belong to the poller's backoff, not the CLI's own retry strategy.
    fn push_common_args(&self, args: &mut Vec<OsString>) {
        if let Some(profile) = &self.config.profile {
            args.push(OsString::from("--profile"));
            args.push(OsString::from(profile));
        }
        if let Some(config_file) = &self.config.config_file {
            args.push(OsString::from("--config-file"));
            args.push(OsString::from(config_file));
        }
        args.push(OsString::from("--output"));
        args.push(OsString::from("json"));
        args.push(OsString::from("--no-retry"));
    }

    fn list_domains_args(&self, compartment_id: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("iam"),
            OsString::from("availability-domain"),
            OsString::from("list"),
            OsString::from("--compartment-id"),
            OsString::from(compartment_id),
        ];
        self.push_common_args(&mut args);
        args
    }

    fn launch_args(&self, request: &LaunchRequest) -> Vec<OsString> {
        let spec = &request.spec;
        let shape_config = json!({
            "ocpus": spec.ocpus,
            "memoryInGBs": spec.memory_in_gbs,
        });
        let metadata = json!({ "ssh_authorized_keys": spec.ssh_public_key });

        let mut args = vec![
            OsString::from("compute"),
            OsString::from("instance"),
            OsString::from("launch"),
            OsString::from("--availability-domain"),
            OsString::from(&request.availability_domain),
            OsString::from("--compartment-id"),
            OsString::from(&spec.compartment_id),
            OsString::from("--shape"),
            OsString::from(&spec.shape),
            OsString::from("--shape-config"),
            OsString::from(shape_config.to_string()),
            OsString::from("--display-name"),
            OsString::from(&spec.display_name),
            OsString::from("--image-id"),
            OsString::from(&spec.image_id),
            OsString::from("--subnet-id"),
            OsString::from(&spec.subnet_id),
            OsString::from("--assign-public-ip"),
            OsString::from(if spec.assign_public_ip { "true" } else { "false" }),
            OsString::from("--metadata"),
            OsString::from(metadata.to_string()),
        ];
        self.push_common_args(&mut args);
        args
    }

    /// Runs the CLI and returns stdout, converting failures into
    /// [`ProviderError`]s.
    async fn run_oci(&self, args: &[OsString]) -> Result<String, ProviderError> {
        debug!("running {}", render_command(&self.config.bin, args));
        let output = self
            .runner
            .run(&self.config.bin, args)
            .await
            .map_err(|err| ProviderError::Transport {
                message: err.to_string(),
            })?;
        if output.is_success() {
            return Ok(output.stdout);
        }
        Err(response::failure_to_error(&self.config.bin, &output))
    }
}

impl<R> ComputeProvider for OciCliProvider<R>
where
    R: CommandRunner + Sync,
{
    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ProviderFuture<'a, Vec<AvailabilityDomain>> {
        Box::pin(async move {
            let args = self.list_domains_args(compartment_id);
            let stdout = self.run_oci(&args).await?;
            response::parse_domains(&stdout)
        })
    }

    fn launch_instance<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, LaunchedInstance> {
        Box::pin(async move {
            let args = self.launch_args(request);
            let stdout = self.run_oci(&args).await?;
            response::parse_instance(&stdout)
        })
    }
}

fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        let lossy = arg.to_string_lossy();
        rendered.push_str(escape(lossy).as_ref());
    }
    rendered
}
