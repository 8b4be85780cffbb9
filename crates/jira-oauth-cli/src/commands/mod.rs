//! CLI command implementations.

pub(crate) mod cert;
pub(crate) mod request;
pub(crate) mod token;

pub(crate) use cert::CertCommand;
pub(crate) use request::RequestArgs;
pub(crate) use token::TokenCommand;

use jira_config::{CliSettings, Config};

use crate::error::CliError;

/// Load configuration, applying command-line overrides.
fn load_config(
    config: Option<&std::path::Path>,
    settings: &CliSettings,
) -> Result<Config, CliError> {
    Ok(Config::load(config, Some(settings))?)
}

/// Resolve the consumer key from the flag, then `[provider]`.
fn resolve_consumer_key(flag: Option<String>, config: &Config) -> Result<String, CliError> {
    flag.or_else(|| config.provider.as_ref()?.consumer_key.clone())
        .ok_or_else(|| {
            CliError::Validation("consumer_key required (via --consumer-key or config)".to_owned())
        })
}
