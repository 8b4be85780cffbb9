//! CLI error types.

use jira_config::ConfigError;
use jira_oauth::provision::ProvisioningError;
use jira_oauth::{OAuthError, RsaKeyError, StoreError, TransportError, ValidationError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    OAuth(#[from] OAuthError),

    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("{0}")]
    Key(#[from] RsaKeyError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Validation(String),
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}
