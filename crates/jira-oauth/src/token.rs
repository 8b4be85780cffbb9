//! OAuth credential record.
//!
//! A [`TokenRecord`] is bound to one (consumer key, base URL) pair. Both are
//! validated at construction and never change afterwards; every other field
//! goes through a validating setter that leaves the record untouched on error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ValidationError;

/// Maximum consumer key length in characters.
const MAX_CONSUMER_KEY_LEN: usize = 255;

/// Store-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenId {
    /// Numeric identifier (must be greater than zero).
    Int(u64),
    /// Opaque string identifier (must not be empty).
    Str(String),
}

impl TokenId {
    /// Parse an identifier received as text (e.g. from a callback query).
    ///
    /// All-digit input becomes [`TokenId::Int`], anything else [`TokenId::Str`].
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let id = match raw.parse::<u64>() {
            Ok(n) if raw.bytes().all(|b| b.is_ascii_digit()) => Self::Int(n),
            _ => Self::Str(raw.to_owned()),
        };
        id.validate()?;
        Ok(id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Int(0) => Err(ValidationError::InvalidId),
            Self::Str(s) if s.is_empty() => Err(ValidationError::InvalidId),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Lifecycle state derived from which fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No handshake progress recorded on the record.
    Unauthorized,
    /// Verifier received, access token exchange still pending.
    AwaitingExchange,
    /// Token, secret and expiry are set.
    Active,
}

/// One OAuth credential set for a Jira instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord")]
pub struct TokenRecord {
    id: Option<TokenId>,
    consumer_key: String,
    base_url: String,
    verifier: Option<String>,
    token: Option<String>,
    token_secret: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    auth_expires_at: Option<DateTime<Utc>>,
    session_handle: Option<String>,
}

impl TokenRecord {
    /// Create a record for a consumer key and Jira base URL
    /// (e.g. `https://example.atlassian.net`).
    pub fn new(
        consumer_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let consumer_key = consumer_key.into();
        let base_url = base_url.into();
        validate_consumer_key(&consumer_key)?;
        validate_base_url(&base_url)?;

        Ok(Self {
            id: None,
            consumer_key,
            base_url,
            verifier: None,
            token: None,
            token_secret: None,
            expires_at: None,
            auth_expires_at: None,
            session_handle: None,
        })
    }

    /// Start a builder that validates every field before yielding a record.
    pub fn builder(
        consumer_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> TokenRecordBuilder {
        TokenRecordBuilder {
            consumer_key: consumer_key.into(),
            base_url: base_url.into(),
            ..TokenRecordBuilder::default()
        }
    }

    pub fn id(&self) -> Option<&TokenId> {
        self.id.as_ref()
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn token_secret(&self) -> Option<&str> {
        self.token_secret.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn auth_expires_at(&self) -> Option<DateTime<Utc>> {
        self.auth_expires_at
    }

    pub fn session_handle(&self) -> Option<&str> {
        self.session_handle.as_deref()
    }

    /// Set the store-assigned identifier.
    pub fn set_id(&mut self, id: TokenId) -> Result<(), ValidationError> {
        id.validate()?;
        self.id = Some(id);
        Ok(())
    }

    pub fn set_verifier(&mut self, verifier: impl Into<String>) -> Result<(), ValidationError> {
        self.verifier = Some(non_empty(verifier.into(), "verifier")?);
        Ok(())
    }

    pub fn set_token(&mut self, token: impl Into<String>) -> Result<(), ValidationError> {
        self.token = Some(non_empty(token.into(), "token")?);
        Ok(())
    }

    pub fn set_token_secret(&mut self, secret: impl Into<String>) -> Result<(), ValidationError> {
        self.token_secret = Some(non_empty(secret.into(), "token secret")?);
        Ok(())
    }

    pub fn set_expires_at(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.expires_at = Some(in_future(at, "expire date")?);
        Ok(())
    }

    pub fn set_auth_expires_at(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.auth_expires_at = Some(in_future(at, "authorization expire date")?);
        Ok(())
    }

    pub fn set_session_handle(
        &mut self,
        session_handle: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.session_handle = Some(non_empty(session_handle.into(), "session handle")?);
        Ok(())
    }

    /// Derive the lifecycle state from populated fields.
    pub fn state(&self) -> TokenState {
        if self.token.is_some() && self.token_secret.is_some() && self.expires_at.is_some() {
            TokenState::Active
        } else if self.verifier.is_some() {
            TokenState::AwaitingExchange
        } else {
            TokenState::Unauthorized
        }
    }

    /// Whether the access token has expired at `now`.
    ///
    /// Records without an expiry are reported as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at <= now)
    }
}

/// Builder for [`TokenRecord`].
///
/// Nothing is validated until [`build`](Self::build), which checks every
/// field and returns the first violation.
#[derive(Debug, Default)]
pub struct TokenRecordBuilder {
    consumer_key: String,
    base_url: String,
    id: Option<TokenId>,
    verifier: Option<String>,
    token: Option<String>,
    token_secret: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    auth_expires_at: Option<DateTime<Utc>>,
    session_handle: Option<String>,
}

impl TokenRecordBuilder {
    #[must_use]
    pub fn id(mut self, id: TokenId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn auth_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.auth_expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn session_handle(mut self, session_handle: impl Into<String>) -> Self {
        self.session_handle = Some(session_handle.into());
        self
    }

    /// Validate all fields and produce the record.
    pub fn build(self) -> Result<TokenRecord, ValidationError> {
        let mut record = TokenRecord::new(self.consumer_key, self.base_url)?;
        if let Some(id) = self.id {
            record.set_id(id)?;
        }
        if let Some(verifier) = self.verifier {
            record.set_verifier(verifier)?;
        }
        if let Some(token) = self.token {
            record.set_token(token)?;
        }
        if let Some(secret) = self.token_secret {
            record.set_token_secret(secret)?;
        }
        if let Some(at) = self.expires_at {
            record.set_expires_at(at)?;
        }
        if let Some(at) = self.auth_expires_at {
            record.set_auth_expires_at(at)?;
        }
        if let Some(handle) = self.session_handle {
            record.set_session_handle(handle)?;
        }
        Ok(record)
    }
}

/// Serialized form of a record.
///
/// Stored timestamps may lie in the past, so only the immutable pair and
/// the non-empty string rules are re-checked on load.
#[derive(Deserialize)]
struct StoredRecord {
    id: Option<TokenId>,
    consumer_key: String,
    base_url: String,
    verifier: Option<String>,
    token: Option<String>,
    token_secret: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    auth_expires_at: Option<DateTime<Utc>>,
    session_handle: Option<String>,
}

impl TryFrom<StoredRecord> for TokenRecord {
    type Error = ValidationError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let mut record = Self::new(stored.consumer_key, stored.base_url)?;
        if let Some(id) = stored.id {
            record.set_id(id)?;
        }
        if let Some(verifier) = stored.verifier {
            record.set_verifier(verifier)?;
        }
        if let Some(token) = stored.token {
            record.set_token(token)?;
        }
        if let Some(secret) = stored.token_secret {
            record.set_token_secret(secret)?;
        }
        if let Some(handle) = stored.session_handle {
            record.set_session_handle(handle)?;
        }
        record.expires_at = stored.expires_at;
        record.auth_expires_at = stored.auth_expires_at;
        Ok(record)
    }
}

fn validate_consumer_key(consumer_key: &str) -> Result<(), ValidationError> {
    let len = consumer_key.chars().count();
    if len == 0 || len > MAX_CONSUMER_KEY_LEN {
        return Err(ValidationError::ConsumerKeyLength(len));
    }
    Ok(())
}

fn validate_base_url(base_url: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::BaseUrl(base_url.to_owned());
    let url = Url::parse(base_url).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}

fn non_empty(value: String, field: &'static str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(value)
}

fn in_future(at: DateTime<Utc>, field: &'static str) -> Result<DateTime<Utc>, ValidationError> {
    if at <= Utc::now() {
        return Err(ValidationError::NotInFuture(field));
    }
    Ok(at)
}
