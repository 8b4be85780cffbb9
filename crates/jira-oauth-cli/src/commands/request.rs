//! `jira-oauth request` command implementation.

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use jira_config::CliSettings;
use jira_oauth::{
    CredentialSigner, JsonFileTokenStore, Method, ProviderGateway, RequestBody, TokenRecord,
    TokenState, TokenStore,
};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the request command.
#[derive(Args)]
pub(crate) struct RequestArgs {
    /// HTTP method (GET, POST, PUT or DELETE).
    method: Method,

    /// Path relative to the Jira base URL (e.g. `rest/api/2/myself`).
    path: String,

    /// Query parameter as `key=value` (repeatable).
    #[arg(short, long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// JSON request body.
    #[arg(long)]
    json: Option<String>,

    /// OAuth consumer key of the stored token (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CONSUMER_KEY")]
    consumer_key: Option<String>,

    /// Directory holding private.key (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CERT_DIR")]
    cert_dir: Option<PathBuf>,

    /// HTTP timeout in seconds (default: from config).
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to configuration file (default: auto-discover jira-oauth.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl RequestArgs {
    /// Execute the request command.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable token is stored, the request cannot be
    /// sent or Jira answers with a non-2xx status.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let settings = CliSettings {
            cert_dir: self.cert_dir,
            timeout: self.timeout,
            ..CliSettings::default()
        };
        let config = super::load_config(self.config.as_deref(), &settings)?;
        let consumer_key = super::resolve_consumer_key(self.consumer_key, &config)?;

        let Some(store) = &config.store_resolved else {
            return Err(CliError::Validation(
                "[store] required in config to load tokens".to_owned(),
            ));
        };
        let record = load_record(&JsonFileTokenStore::new(&store.path), &consumer_key)?;
        if record.is_expired(Utc::now()) {
            output.warning("Stored access token has expired; run `jira-oauth token authorize`");
        }

        let body = self.json.as_deref().map(parse_json).transpose()?;

        let oauth = &config.oauth_resolved;
        let signer = CredentialSigner::from_cert_dir(&oauth.cert_dir, oauth.timeout)?;
        let gateway = ProviderGateway::new(signer);
        tracing::debug!(method = %self.method, path = %self.path, "Sending signed request");
        let response = gateway.send(
            &record,
            self.method,
            &self.path,
            &self.query,
            body.as_ref(),
        )?;

        let status = format!("HTTP {}", response.status);
        if response.is_success() {
            output.success(&status);
        } else {
            output.error(&status);
        }
        writeln!(io::stdout(), "{}", response.body)?;

        if !response.is_success() {
            return Err(CliError::Validation(format!(
                "request failed with HTTP {}",
                response.status
            )));
        }
        Ok(())
    }
}

/// Load the stored record for `consumer_key` and check it carries a token.
fn load_record(store: &impl TokenStore, consumer_key: &str) -> Result<TokenRecord, CliError> {
    let record = store.find_by_consumer_key(consumer_key)?.ok_or_else(|| {
        CliError::Validation(format!("no token stored for consumer key {consumer_key}"))
    })?;
    if record.state() != TokenState::Active {
        return Err(CliError::Validation(format!(
            "token for consumer key {consumer_key} is not authorized yet"
        )));
    }
    Ok(record)
}

fn parse_json(raw: &str) -> Result<RequestBody, CliError> {
    serde_json::from_str(raw)
        .map(RequestBody::Json)
        .map_err(|e| CliError::Validation(format!("invalid JSON body: {e}")))
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got {raw}"))
}
