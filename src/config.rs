//! Configuration loading via `ortho-config`.
//!
//! Settings come from the process environment, which the binary seeds from
//! an optional `.env` file first. Launch parameters use the `OCI_` prefix;
//! the polling knobs keep their historical unprefixed names.

use std::ffi::OsString;
use std::time::Duration;

use log::{info, warn};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::backoff::BackoffPolicy;
use crate::oci::{DEFAULT_OCI_BIN, OciCliConfig};
use crate::poller::{DomainStrategy, PollSchedule};
use crate::provider::LaunchSpec;

const PROGRAM_NAME: &str = "oci-poller";
const SECONDS_PER_MINUTE: u64 = 60;

/// Settings that must be present before the poller starts.
pub const REQUIRED_KEYS: [&str; 4] = [
    "OCI_IMAGE_ID",
    "OCI_COMPARTMENT_ID",
    "OCI_SUBNET_ID",
    "SSH_KEY_PUB",
];

/// Settings that fall back to a default when unset.
pub const OPTIONAL_KEYS: [&str; 16] = [
    "AD_REQ_INTERVAL_SECONDS",
    "RETRY_WAIT_SECONDS",
    "LONG_WAIT_MINUTES",
    "INITIAL_BACKOFF_DELAY_SECONDS",
    "MAX_BACKOFF_ATTEMPTS",
    "DISPLAY_NAME",
    "OCI_SHAPE",
    "OCI_OCPUS",
    "OCI_MEMORY_IN_GBS",
    "DOMAIN_STRATEGY",
    "EXIT_ON_SUCCESS",
    "OCI_ASSIGN_PUBLIC_IP",
    "OCI_CALL_TIMEOUT_SECONDS",
    "OCI_CLI_BIN",
    "OCI_CLI_PROFILE",
    "OCI_CLI_CONFIG_FILE",
];

/// Launch parameters and CLI settings read from `OCI_*` variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OCI")]
pub struct OciConfig {
    /// Boot image OCID. Required.
    pub image_id: Option<String>,
    /// Compartment OCID used for listing domains and owning the instance.
    /// Required.
    pub compartment_id: Option<String>,
    /// Subnet OCID for the primary VNIC. Required.
    pub subnet_id: Option<String>,
    /// Instance shape. Defaults to the Ampere flex shape.
    #[ortho_config(default = "VM.Standard.A1.Flex".to_owned())]
    pub shape: String,
    /// OCPUs requested through the shape configuration.
    #[ortho_config(default = 4)]
    pub ocpus: u32,
    /// Memory in gigabytes requested through the shape configuration.
    #[ortho_config(default = 24)]
    pub memory_in_gbs: u32,
    /// Whether the primary VNIC receives a public IP. Unset means `true`.
    pub assign_public_ip: Option<String>,
    /// Upper bound on a single provider call, in seconds.
    #[ortho_config(default = 120)]
    pub call_timeout_seconds: u64,
    /// Path to the `oci` CLI.
    #[ortho_config(default = DEFAULT_OCI_BIN.to_owned())]
    pub cli_bin: String,
    /// Profile in the CLI configuration file.
    pub cli_profile: Option<String>,
    /// CLI configuration file overriding `~/.oci/config`.
    pub cli_config_file: Option<String>,
}

/// Polling behaviour and instance identity read from unprefixed variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
pub struct PollerConfig {
    /// Public key installed on the instance. Required.
    pub ssh_key_pub: Option<String>,
    /// Display name for the instance.
    #[ortho_config(default = "myOciInstance".to_owned())]
    pub display_name: String,
    /// Pause between availability domains, in seconds.
    #[ortho_config(default = 5)]
    pub ad_req_interval_seconds: u64,
    /// Pause between cycles, in seconds.
    #[ortho_config(default = 64)]
    pub retry_wait_seconds: u64,
    /// Rate-limit pause for the single-pass strategy, in minutes.
    #[ortho_config(default = 10)]
    pub long_wait_minutes: u64,
    /// First backoff delay for a throttled domain, in seconds.
    #[ortho_config(default = 15)]
    pub initial_backoff_delay_seconds: u64,
    /// Attempts per domain under the sequential strategy.
    #[ortho_config(default = 5)]
    pub max_backoff_attempts: u32,
    /// `sequential` or `single-pass`.
    #[ortho_config(default = "sequential".to_owned())]
    pub domain_strategy: String,
    /// Stop polling after the first instance is created. Unset means `false`.
    pub exit_on_success: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str) -> Self {
        Self {
            description,
            env_var,
        }
    }
}

fn require_field<'a>(
    value: Option<&'a str>,
    metadata: &FieldMetadata,
) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(present) if !present.is_empty() => Ok(present),
        _ => Err(ConfigError::MissingField(format!(
            "missing {}: set {} in the environment or in .env",
            metadata.description, metadata.env_var
        ))),
    }
}

/// Reads an optional boolean switch, falling back to `default` when unset.
fn parse_switch(
    value: Option<&str>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            message: format!("expected true or false, got '{raw}'"),
        }),
    }
}

fn require_positive(value: u64, key: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            message: String::from("must be at least 1"),
        });
    }
    Ok(())
}

/// Complete daemon configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// `OCI_*` settings.
    pub oci: OciConfig,
    /// Polling settings.
    pub poller: PollerConfig,
}

impl Settings {
    /// Loads both configuration groups without parsing CLI arguments.
    /// Callers run [`Settings::validate`] once the values have been reported.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a value cannot be merged, for
    /// example a non-numeric `OCI_OCPUS`.
    pub fn load() -> Result<Self, ConfigError> {
        let oci = OciConfig::load_from_iter([OsString::from(PROGRAM_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        let poller = PollerConfig::load_from_iter([OsString::from(PROGRAM_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        Ok(Self { oci, poller })
    }

    /// Checks required values and numeric bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the first missing
    /// required variable, or [`ConfigError::Invalid`] for out-of-range and
    /// unparseable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.required_values()?;
        for (value, key) in [
            (self.oci.shape.as_str(), "OCI_SHAPE"),
            (self.oci.cli_bin.as_str(), "OCI_CLI_BIN"),
            (self.poller.display_name.as_str(), "DISPLAY_NAME"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    message: String::from("must not be empty"),
                });
            }
        }
        require_positive(u64::from(self.oci.ocpus), "OCI_OCPUS")?;
        require_positive(u64::from(self.oci.memory_in_gbs), "OCI_MEMORY_IN_GBS")?;
        require_positive(
            u64::from(self.poller.max_backoff_attempts),
            "MAX_BACKOFF_ATTEMPTS",
        )?;
        require_positive(self.oci.call_timeout_seconds, "OCI_CALL_TIMEOUT_SECONDS")?;
        self.assign_public_ip()?;
        self.exit_on_success()?;
        self.strategy()?;
        Ok(())
    }

    fn required_values(&self) -> Result<RequiredValues<'_>, ConfigError> {
        Ok(RequiredValues {
            image_id: require_field(
                self.oci.image_id.as_deref(),
                &FieldMetadata::new("boot image OCID", "OCI_IMAGE_ID"),
            )?,
            compartment_id: require_field(
                self.oci.compartment_id.as_deref(),
                &FieldMetadata::new("compartment OCID", "OCI_COMPARTMENT_ID"),
            )?,
            subnet_id: require_field(
                self.oci.subnet_id.as_deref(),
                &FieldMetadata::new("subnet OCID", "OCI_SUBNET_ID"),
            )?,
            ssh_key_pub: require_field(
                self.poller.ssh_key_pub.as_deref(),
                &FieldMetadata::new("SSH public key", "SSH_KEY_PUB"),
            )?,
        })
    }

    fn strategy(&self) -> Result<DomainStrategy, ConfigError> {
        self.poller
            .domain_strategy
            .parse()
            .map_err(|message| ConfigError::Invalid {
                key: "DOMAIN_STRATEGY",
                message,
            })
    }

    fn assign_public_ip(&self) -> Result<bool, ConfigError> {
        parse_switch(
            self.oci.assign_public_ip.as_deref(),
            "OCI_ASSIGN_PUBLIC_IP",
            true,
        )
    }

    fn exit_on_success(&self) -> Result<bool, ConfigError> {
        parse_switch(
            self.poller.exit_on_success.as_deref(),
            "EXIT_ON_SUCCESS",
            false,
        )
    }

    /// Builds the launch template from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn launch_spec(&self) -> Result<LaunchSpec, ConfigError> {
        let required = self.required_values()?;
        LaunchSpec::builder()
            .compartment_id(required.compartment_id)
            .shape(&self.oci.shape)
            .ocpus(self.oci.ocpus)
            .memory_in_gbs(self.oci.memory_in_gbs)
            .display_name(&self.poller.display_name)
            .image_id(required.image_id)
            .subnet_id(required.subnet_id)
            .ssh_public_key(required.ssh_key_pub)
            .assign_public_ip(self.assign_public_ip()?)
            .build()
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the timing and retry schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `DOMAIN_STRATEGY` is unknown or
    /// `EXIT_ON_SUCCESS` is not a boolean.
    pub fn schedule(&self) -> Result<PollSchedule, ConfigError> {
        Ok(PollSchedule {
            strategy: self.strategy()?,
            backoff: BackoffPolicy::new(
                Duration::from_secs(self.poller.initial_backoff_delay_seconds),
                self.poller.max_backoff_attempts,
            ),
            domain_interval: Duration::from_secs(self.poller.ad_req_interval_seconds),
            retry_wait: Duration::from_secs(self.poller.retry_wait_seconds),
            long_wait: Duration::from_secs(
                self.poller
                    .long_wait_minutes
                    .saturating_mul(SECONDS_PER_MINUTE),
            ),
            call_timeout: Duration::from_secs(self.oci.call_timeout_seconds),
            exit_on_success: self.exit_on_success()?,
        })
    }

    /// Builds the `oci` CLI invocation settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `OCI_CLI_BIN` is blank.
    pub fn cli_config(&self) -> Result<OciCliConfig, ConfigError> {
        OciCliConfig::new(
            &self.oci.cli_bin,
            self.oci.cli_profile.clone(),
            self.oci.cli_config_file.clone(),
        )
        .map_err(|err| ConfigError::Invalid {
            key: "OCI_CLI_BIN",
            message: err.to_string(),
        })
    }

    /// Effective value of every recognised setting, keyed by variable name.
    #[must_use]
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let optional_text = |value: Option<&String>| value.cloned().unwrap_or_default();
        vec![
            ("OCI_IMAGE_ID", optional_text(self.oci.image_id.as_ref())),
            (
                "OCI_COMPARTMENT_ID",
                optional_text(self.oci.compartment_id.as_ref()),
            ),
            ("OCI_SUBNET_ID", optional_text(self.oci.subnet_id.as_ref())),
            ("SSH_KEY_PUB", optional_text(self.poller.ssh_key_pub.as_ref())),
            (
                "AD_REQ_INTERVAL_SECONDS",
                self.poller.ad_req_interval_seconds.to_string(),
            ),
            (
                "RETRY_WAIT_SECONDS",
                self.poller.retry_wait_seconds.to_string(),
            ),
            ("LONG_WAIT_MINUTES", self.poller.long_wait_minutes.to_string()),
            (
                "INITIAL_BACKOFF_DELAY_SECONDS",
                self.poller.initial_backoff_delay_seconds.to_string(),
            ),
            (
                "MAX_BACKOFF_ATTEMPTS",
                self.poller.max_backoff_attempts.to_string(),
            ),
            ("DISPLAY_NAME", self.poller.display_name.clone()),
            ("OCI_SHAPE", self.oci.shape.clone()),
            ("OCI_OCPUS", self.oci.ocpus.to_string()),
            ("OCI_MEMORY_IN_GBS", self.oci.memory_in_gbs.to_string()),
            ("DOMAIN_STRATEGY", self.poller.domain_strategy.clone()),
            (
                "EXIT_ON_SUCCESS",
                self.poller
                    .exit_on_success
                    .clone()
                    .unwrap_or_else(|| String::from("false")),
            ),
            (
                "OCI_ASSIGN_PUBLIC_IP",
                self.oci
                    .assign_public_ip
                    .clone()
                    .unwrap_or_else(|| String::from("true")),
            ),
            (
                "OCI_CALL_TIMEOUT_SECONDS",
                self.oci.call_timeout_seconds.to_string(),
            ),
            ("OCI_CLI_BIN", self.oci.cli_bin.clone()),
            ("OCI_CLI_PROFILE", optional_text(self.oci.cli_profile.as_ref())),
            (
                "OCI_CLI_CONFIG_FILE",
                optional_text(self.oci.cli_config_file.as_ref()),
            ),
        ]
    }

    /// Logs every recognised setting and warns about optional settings that
    /// fall back to their default. `lookup` reports whether a variable was
    /// set in the environment.
    pub fn log_startup_report(&self, lookup: impl Fn(&str) -> Option<String>) {
        info!("checking required settings...");
        for (key, value) in self.describe() {
            if REQUIRED_KEYS.contains(&key) {
                info!("{key}={value}");
            }
        }
        info!("checking optional settings...");
        for (key, value) in self.describe() {
            if !REQUIRED_KEYS.contains(&key) {
                info!("{key}={value}");
            }
        }
        for key in unset_optional_keys(lookup) {
            warn!("{key} is not set, default value will be used");
        }
        info!("done");
    }
}

/// Optional settings absent from the environment, in reporting order.
#[must_use]
pub fn unset_optional_keys(lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    OPTIONAL_KEYS
        .iter()
        .copied()
        .filter(|key| lookup(key).is_none())
        .collect()
}

struct RequiredValues<'a> {
    image_id: &'a str,
    compartment_id: &'a str,
    subnet_id: &'a str,
    ssh_key_pub: &'a str,
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but unusable.
    #[error("invalid {key}: {message}")]
    Invalid {
        /// Variable holding the bad value.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
