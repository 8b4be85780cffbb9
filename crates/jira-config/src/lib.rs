//! Configuration management for jira-oauth.
//!
//! Parses `jira-oauth.toml` files with serde and provides auto-discovery of
//! the config file in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `oauth.callback_url`
//! - `oauth.redirect_url`
//! - `provider.base_url`
//! - `provider.consumer_key`
//! - `store.path`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override key material directory.
    pub cert_dir: Option<PathBuf>,
    /// Override HTTP timeout in seconds.
    pub timeout: Option<u64>,
    /// Override OAuth callback URL.
    pub callback_url: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "jira-oauth.toml";

/// Default key material directory, relative to the config file.
const DEFAULT_CERT_DIR: &str = "var/certs";

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Upper bound for the HTTP timeout in seconds.
const MAX_TIMEOUT: u64 = 600;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth settings as written in TOML (paths are relative strings).
    oauth: OAuthConfigRaw,
    /// Provider defaults used by the CLI (optional section).
    pub provider: Option<ProviderConfig>,
    /// Token store section (optional; absent means no persistence).
    store: Option<StoreConfigRaw>,

    /// Resolved OAuth configuration (set after loading).
    #[serde(skip)]
    pub oauth_resolved: OAuthConfig,
    /// Resolved token store configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: Option<StoreConfig>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw `[oauth]` section as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OAuthConfigRaw {
    callback_url: Option<String>,
    redirect_url: Option<String>,
    cert_dir: Option<String>,
    timeout: Option<u64>,
}

/// Resolved OAuth configuration with absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Absolute URL of the host's callback endpoint.
    pub callback_url: Option<String>,
    /// Where the callback endpoint sends the user once the handshake ends.
    pub redirect_url: Option<String>,
    /// Directory holding `private.key`, `public.key` and `cert.pem`.
    pub cert_dir: PathBuf,
    /// Timeout applied to every provider request.
    pub timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_url: None,
            redirect_url: None,
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }
}

/// `[provider]` section: defaults for the CLI commands.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Jira base URL (e.g. `https://example.atlassian.net`).
    pub base_url: Option<String>,
    /// OAuth consumer key registered in Jira's application link.
    pub consumer_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreConfigRaw {
    path: String,
}

/// Resolved token store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// JSON file holding persisted token records.
    pub path: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`oauth.callback_url`").
        field: String,
        /// Error message (e.g., "${`JIRA_HOST`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise, searches
    /// for `jira-oauth.toml` in the current directory and its parents, falling
    /// back to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(cert_dir) = &settings.cert_dir {
            self.oauth_resolved.cert_dir.clone_from(cert_dir);
        }
        if let Some(timeout) = settings.timeout {
            self.oauth_resolved.timeout = Duration::from_secs(timeout);
        }
        if let Some(callback_url) = &settings.callback_url {
            self.oauth_resolved.callback_url = Some(callback_url.clone());
        }
    }

    /// Get the callback URL required to start a handshake.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if `oauth.callback_url` is not set.
    pub fn require_callback_url(&self) -> Result<&str, ConfigError> {
        self.oauth_resolved.callback_url.as_deref().ok_or_else(|| {
            ConfigError::Validation("oauth.callback_url required in config".to_owned())
        })
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_oauth()?;
        self.validate_provider()?;
        Ok(())
    }

    fn validate_oauth(&self) -> Result<(), ConfigError> {
        let oauth = &self.oauth_resolved;
        if let Some(ref url) = oauth.callback_url {
            require_non_empty(url, "oauth.callback_url")?;
            require_http_url(url, "oauth.callback_url")?;
        }
        if let Some(ref url) = oauth.redirect_url {
            require_non_empty(url, "oauth.redirect_url")?;
            require_http_url(url, "oauth.redirect_url")?;
        }

        let timeout = oauth.timeout.as_secs();
        if timeout == 0 {
            return Err(ConfigError::Validation(
                "oauth.timeout must be greater than 0".to_owned(),
            ));
        }
        if timeout > MAX_TIMEOUT {
            return Err(ConfigError::Validation(format!(
                "oauth.timeout cannot exceed {MAX_TIMEOUT}"
            )));
        }

        Ok(())
    }

    fn validate_provider(&self) -> Result<(), ConfigError> {
        let Some(ref provider) = self.provider else {
            return Ok(());
        };
        if let Some(ref url) = provider.base_url {
            require_non_empty(url, "provider.base_url")?;
            require_http_url(url, "provider.base_url")?;
        }
        if let Some(ref key) = provider.consumer_key {
            require_non_empty(key, "provider.consumer_key")?;
        }
        Ok(())
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            oauth: OAuthConfigRaw::default(),
            provider: None,
            store: None,
            oauth_resolved: OAuthConfig {
                cert_dir: base.join(DEFAULT_CERT_DIR),
                ..OAuthConfig::default()
            },
            store_resolved: None,
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_env_opt(&mut self.oauth.callback_url, "oauth.callback_url")?;
        expand::expand_env_opt(&mut self.oauth.redirect_url, "oauth.redirect_url")?;

        if let Some(ref mut provider) = self.provider {
            expand::expand_env_opt(&mut provider.base_url, "provider.base_url")?;
            expand::expand_env_opt(&mut provider.consumer_key, "provider.consumer_key")?;
        }

        if let Some(ref mut store) = self.store {
            store.path = expand::expand_env(&store.path, "store.path")?;
        }

        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve(&mut self, config_dir: &Path) {
        self.oauth_resolved = OAuthConfig {
            callback_url: self.oauth.callback_url.clone(),
            redirect_url: self.oauth.redirect_url.clone(),
            cert_dir: config_dir.join(self.oauth.cert_dir.as_deref().unwrap_or(DEFAULT_CERT_DIR)),
            timeout: Duration::from_secs(self.oauth.timeout.unwrap_or(DEFAULT_TIMEOUT)),
        };

        self.store_resolved = self.store.as_ref().map(|store| StoreConfig {
            path: config_dir.join(&store.path),
        });
    }
}
