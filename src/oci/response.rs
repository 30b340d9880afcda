//! Parsing of `oci` CLI output.
//!
//! Successful commands print a JSON envelope (`{"data": ...}`) on stdout.
//! Service failures print `ServiceError:` followed by a JSON body on stderr.

use serde::Deserialize;

use crate::provider::{AvailabilityDomain, LaunchedInstance, ProviderError};

use super::command::CommandOutput;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct DomainRecord {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceRecord {
    id: String,
    #[serde(default)]
    display_name: String,
    availability_domain: String,
    #[serde(default)]
    lifecycle_state: String,
    #[serde(default)]
    shape: String,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    status: Option<u16>,
    code: Option<String>,
    message: Option<String>,
}

fn parse_envelope<T>(stdout: &str, what: &str) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str::<Envelope<T>>(stdout)
        .map(|envelope| envelope.data)
        .map_err(|err| ProviderError::Transport {
            message: format!("failed to parse {what} output: {err}"),
        })
}

/// Parses `oci iam availability-domain list` output. The CLI prints nothing
/// at all when the list is empty.
pub(super) fn parse_domains(stdout: &str) -> Result<Vec<AvailabilityDomain>, ProviderError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<DomainRecord> = parse_envelope(stdout, "availability domain")?;
    Ok(records
        .into_iter()
        .map(|record| AvailabilityDomain::new(record.name))
        .collect())
}

/// Parses `oci compute instance launch` output.
pub(super) fn parse_instance(stdout: &str) -> Result<LaunchedInstance, ProviderError> {
    let record: InstanceRecord = parse_envelope(stdout, "instance")?;
    Ok(LaunchedInstance {
        id: record.id,
        display_name: record.display_name,
        availability_domain: record.availability_domain,
        lifecycle_state: record.lifecycle_state,
        shape: record.shape,
    })
}

fn service_error_body(stderr: &str) -> Option<ServiceErrorBody> {
    let start = stderr.find('{')?;
    let end = stderr.rfind('}')?;
    let json = stderr.get(start..=end)?;
    serde_json::from_str(json).ok()
}

/// Converts a failed command into a [`ProviderError`].
pub(super) fn failure_to_error(program: &str, output: &CommandOutput) -> ProviderError {
    if let Some(ServiceErrorBody {
        status: Some(status),
        code,
        message,
    }) = service_error_body(&output.stderr)
    {
        return ProviderError::Service {
            status,
            code: code.unwrap_or_default(),
            message: message.unwrap_or_default(),
        };
    }

    let status_text = output
        .code
        .map_or_else(|| String::from("unknown"), |code| code.to_string());
    ProviderError::Transport {
        message: format!(
            "{program} exited with status {status_text}: {}",
            output.stderr.trim()
        ),
    }
}
