use ipnet::Ipv4Net;

use crate::types::Region;

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Failure reported by a cloud collaborator call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed in {region}: {message}")]
pub struct ProviderError {
    pub operation: String,
    /// Region the call was made against, or `global`
    pub region: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        operation: impl Into<String>,
        region: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            region: region.into(),
            message: message.into(),
        }
    }
}

/// Errors that abort a provisioning run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProvisionError {
    #[error("Pool of unused IP addresses depleted in subnet: {cidr}")]
    PoolDepleted { cidr: Ipv4Net },

    #[error("Conflicting options: {0}")]
    ConfigurationConflict(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to resolve {what} in {region}")]
    ResolutionFailure { what: String, region: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Provisioning cancelled")]
    Cancelled,
}

impl ProvisionError {
    pub fn resolution(what: impl Into<String>, region: &Region) -> Self {
        Self::ResolutionFailure {
            what: what.into(),
            region: region.to_string(),
        }
    }
}
