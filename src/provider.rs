//! Provider abstraction for listing availability domains and launching
//! compute instances.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Template describing the instance to launch. Built once from
/// configuration and never mutated; each attempt derives a
/// [`LaunchRequest`] through [`LaunchSpec::for_domain`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// Compartment that will own the instance.
    pub compartment_id: String,
    /// Shape name (for example `VM.Standard.A1.Flex`).
    pub shape: String,
    /// Number of OCPUs requested through the shape configuration.
    pub ocpus: u32,
    /// Memory in gigabytes requested through the shape configuration.
    pub memory_in_gbs: u32,
    /// Display name shown in the console.
    pub display_name: String,
    /// Boot image identifier.
    pub image_id: String,
    /// Subnet for the primary VNIC.
    pub subnet_id: String,
    /// Public key installed as `ssh_authorized_keys`.
    pub ssh_public_key: String,
    /// Whether the primary VNIC receives a public IP.
    pub assign_public_ip: bool,
}

impl LaunchSpec {
    /// Starts a builder for a [`LaunchSpec`].
    #[must_use]
    pub fn builder() -> LaunchSpecBuilder {
        LaunchSpecBuilder::new()
    }

    /// Validates the template, returning the first empty required field.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchSpecError::Validation`] when a string field is empty or
    /// a resource count is zero.
    pub fn validate(&self) -> Result<(), LaunchSpecError> {
        let fields = [
            ("compartment_id", self.compartment_id.as_str()),
            ("shape", self.shape.as_str()),
            ("display_name", self.display_name.as_str()),
            ("image_id", self.image_id.as_str()),
            ("subnet_id", self.subnet_id.as_str()),
            ("ssh_public_key", self.ssh_public_key.as_str()),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(LaunchSpecError::Validation((*field).to_owned()));
        }
        if self.ocpus == 0 {
            return Err(LaunchSpecError::Validation(String::from("ocpus")));
        }
        if self.memory_in_gbs == 0 {
            return Err(LaunchSpecError::Validation(String::from("memory_in_gbs")));
        }
        Ok(())
    }

    /// Derives the request for a single attempt against `domain`.
    #[must_use]
    pub fn for_domain(&self, domain: &AvailabilityDomain) -> LaunchRequest {
        LaunchRequest {
            spec: self.clone(),
            availability_domain: domain.name.clone(),
        }
    }
}

/// Builder for [`LaunchSpec`] that trims inputs and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchSpecBuilder {
    compartment_id: String,
    shape: String,
    ocpus: u32,
    memory_in_gbs: u32,
    display_name: String,
    image_id: String,
    subnet_id: String,
    ssh_public_key: String,
    assign_public_ip: bool,
}

impl LaunchSpecBuilder {
    /// Creates an empty builder. A public IP is requested unless disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            assign_public_ip: true,
            ..Self::default()
        }
    }

    /// Sets the compartment identifier.
    #[must_use]
    pub fn compartment_id(mut self, value: impl Into<String>) -> Self {
        self.compartment_id = value.into();
        self
    }

    /// Sets the shape.
    #[must_use]
    pub fn shape(mut self, value: impl Into<String>) -> Self {
        self.shape = value.into();
        self
    }

    /// Sets the OCPU count.
    #[must_use]
    pub const fn ocpus(mut self, value: u32) -> Self {
        self.ocpus = value;
        self
    }

    /// Sets the memory size in gigabytes.
    #[must_use]
    pub const fn memory_in_gbs(mut self, value: u32) -> Self {
        self.memory_in_gbs = value;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = value.into();
        self
    }

    /// Sets the image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the subnet identifier.
    #[must_use]
    pub fn subnet_id(mut self, value: impl Into<String>) -> Self {
        self.subnet_id = value.into();
        self
    }

    /// Sets the SSH public key.
    #[must_use]
    pub fn ssh_public_key(mut self, value: impl Into<String>) -> Self {
        self.ssh_public_key = value.into();
        self
    }

    /// Sets whether a public IP is assigned.
    #[must_use]
    pub const fn assign_public_ip(mut self, value: bool) -> Self {
        self.assign_public_ip = value;
        self
    }

    /// Builds and validates the [`LaunchSpec`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchSpecError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<LaunchSpec, LaunchSpecError> {
        let spec = LaunchSpec {
            compartment_id: self.compartment_id.trim().to_owned(),
            shape: self.shape.trim().to_owned(),
            ocpus: self.ocpus,
            memory_in_gbs: self.memory_in_gbs,
            display_name: self.display_name.trim().to_owned(),
            image_id: self.image_id.trim().to_owned(),
            subnet_id: self.subnet_id.trim().to_owned(),
            ssh_public_key: self.ssh_public_key.trim().to_owned(),
            assign_public_ip: self.assign_public_ip,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// A [`LaunchSpec`] bound to one availability domain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchRequest {
    /// Template copied from the cycle's spec.
    pub spec: LaunchSpec,
    /// Domain targeted by this attempt.
    pub availability_domain: String,
}

/// Availability domain as returned by the identity service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AvailabilityDomain {
    /// Fully qualified domain name (for example `Uocm:EU-FRANKFURT-1-AD-1`).
    pub name: String,
}

impl AvailabilityDomain {
    /// Creates a domain from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Instance reference returned after a successful launch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchedInstance {
    /// Provider identifier of the instance.
    pub id: String,
    /// Display name echoed back by the provider.
    pub display_name: String,
    /// Domain the instance landed in.
    pub availability_domain: String,
    /// Lifecycle state at creation time (usually `PROVISIONING`).
    pub lifecycle_state: String,
    /// Shape of the created instance.
    pub shape: String,
}

/// Errors raised while building a [`LaunchSpec`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LaunchSpecError {
    /// Raised when a required field is missing.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Errors surfaced by a [`ComputeProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The service answered with an error body.
    #[error("service error {status} ({code}): {message}")]
    Service {
        /// HTTP status reported by the service.
        status: u16,
        /// Provider service code (for example `TooManyRequests`).
        code: String,
        /// Human readable message.
        message: String,
    },
    /// The call could not be made or its result could not be understood.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// The call did not finish within the configured timeout.
    #[error("call timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed.
        seconds: u64,
    },
}

impl ProviderError {
    /// HTTP status, when the service returned one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Service code, when the service returned one.
    #[must_use]
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code.as_str()),
            Self::Transport { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Message carried by a service or transport error.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Service { message, .. } | Self::Transport { message } => Some(message.as_str()),
            Self::Timeout { .. } => None,
        }
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Remote compute and identity operations consumed by the poller.
pub trait ComputeProvider {
    /// Lists the availability domains visible to `compartment_id`, in the
    /// order the provider returns them.
    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ProviderFuture<'a, Vec<AvailabilityDomain>>;

    /// Launches an instance described by `request`.
    fn launch_instance<'a>(&'a self, request: &'a LaunchRequest)
    -> ProviderFuture<'a, LaunchedInstance>;
}
