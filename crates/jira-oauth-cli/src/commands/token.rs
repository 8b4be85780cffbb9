//! `jira-oauth token authorize` command implementation.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Subcommand};
use jira_config::{CliSettings, Config};
use jira_oauth::{
    Authorizer, CallbackParams, CredentialSigner, JsonFileTokenStore, ProviderGateway,
    TokenRecord, TokenStore, TracingListener,
};
use url::Url;

use crate::error::CliError;
use crate::output::Output;

/// Access token subcommands.
#[derive(Subcommand)]
pub(crate) enum TokenCommand {
    /// Run the OAuth handshake for a Jira instance.
    Authorize(AuthorizeArgs),
}

impl TokenCommand {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Authorize(args) => args.execute(),
        }
    }
}

/// Arguments for the token authorize command.
#[derive(Args)]
pub(crate) struct AuthorizeArgs {
    /// OAuth consumer key (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CONSUMER_KEY")]
    consumer_key: Option<String>,

    /// Jira base URL (default: from config).
    #[arg(short = 'u', long, env = "JIRA_OAUTH_BASE_URL")]
    base_url: Option<String>,

    /// Directory holding private.key (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CERT_DIR")]
    cert_dir: Option<PathBuf>,

    /// URL Jira redirects to after authorization (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CALLBACK_URL")]
    callback_url: Option<String>,

    /// HTTP timeout in seconds (default: from config).
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to configuration file (default: auto-discover jira-oauth.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl AuthorizeArgs {
    /// Execute the token authorize command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is incomplete, the key cannot be
    /// loaded or any step of the handshake fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let settings = CliSettings {
            cert_dir: self.cert_dir,
            timeout: self.timeout,
            callback_url: self.callback_url,
        };
        let config = super::load_config(self.config.as_deref(), &settings)?;

        let consumer_key = super::resolve_consumer_key(self.consumer_key, &config)?;
        let base_url = resolve_base_url(self.base_url, &config)?;
        let callback_url = config.require_callback_url()?;

        let oauth = &config.oauth_resolved;
        output.info(&format!(
            "Reading private key from {}...",
            oauth.cert_dir.display()
        ));
        let signer = CredentialSigner::from_cert_dir(&oauth.cert_dir, oauth.timeout)?;
        let authorizer = Authorizer::new(ProviderGateway::new(signer), callback_url)?
            .with_listener(TracingListener);
        let record = TokenRecord::new(consumer_key, base_url)?;

        let stdin = io::stdin();
        let record = if let Some(store) = &config.store_resolved {
            let authorizer = authorizer.with_store(JsonFileTokenStore::new(&store.path));
            let record = authorize(&authorizer, &record, &output, stdin.lock())?;
            output.info(&format!("\nToken saved to {}", store.path.display()));
            record
        } else {
            authorize(&authorizer, &record, &output, stdin.lock())?
        };

        print_credentials(&output, &record);
        Ok(())
    }
}

fn resolve_base_url(flag: Option<String>, config: &Config) -> Result<String, CliError> {
    flag.or_else(|| config.provider.as_ref()?.base_url.clone())
        .ok_or_else(|| CliError::Validation("base_url required (via --base-url or config)".to_owned()))
}

/// Run the three steps, reading the redirect target from `input`.
fn authorize<S: TokenStore>(
    authorizer: &Authorizer<S>,
    record: &TokenRecord,
    output: &Output,
    mut input: impl BufRead,
) -> Result<TokenRecord, CliError> {
    output.info("\nStep 1: Requesting temporary credentials...");
    let authorize_url = authorizer.begin_authorization(record)?;
    output.success("Temporary token received");

    output.separator();
    output.highlight("Step 2: Authorization Required");
    output.separator();
    output.info("\nPlease open this URL in your browser:");
    output.highlight(&format!("\n{authorize_url}\n"));

    write!(io::stdout(), "Paste the URL you were redirected to: ")?;
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let params = callback_params(&line, record);

    output.info("\nStep 3: Exchanging for access token...");
    let mut record = params.into_record(authorizer.store())?;
    authorizer.complete_authorization(&mut record)?;
    Ok(record)
}

/// Parse a pasted callback URL or bare query string.
///
/// `consumer_key` and `base_url` fall back to the record being authorized.
fn callback_params(pasted: &str, record: &TokenRecord) -> CallbackParams {
    let pasted = pasted.trim();
    let query = match Url::parse(pasted) {
        Ok(url) => url.query().unwrap_or_default().to_owned(),
        Err(_) => pasted.to_owned(),
    };

    let mut params = CallbackParams::from_query(&query);
    if params.consumer_key.is_empty() {
        record.consumer_key().clone_into(&mut params.consumer_key);
    }
    if params.base_url.is_empty() {
        record.base_url().clone_into(&mut params.base_url);
    }
    params
}

fn print_credentials(output: &Output, record: &TokenRecord) {
    output.separator();
    output.success("OAuth Authorization Successful!");
    output.separator();
    output.info("");
    for (name, value) in credentials(record) {
        output.credential(name, &value);
    }
}

/// Populated record fields in display order.
fn credentials(record: &TokenRecord) -> Vec<(&'static str, String)> {
    let fields = [
        ("consumer_key", Some(record.consumer_key().to_owned())),
        ("base_url", Some(record.base_url().to_owned())),
        ("id", record.id().map(ToString::to_string)),
        ("access_token", record.token().map(str::to_owned)),
        ("token_secret", record.token_secret().map(str::to_owned)),
        ("session_handle", record.session_handle().map(str::to_owned)),
        ("expires_at", record.expires_at().map(|at| at.to_rfc3339())),
        (
            "auth_expires_at",
            record.auth_expires_at().map(|at| at.to_rfc3339()),
        ),
    ];
    fields
        .into_iter()
        .filter_map(|(name, value)| Some((name, value?)))
        .collect()
}
