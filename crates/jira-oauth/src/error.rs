//! Error types for the OAuth handshake and signed requests.

use std::path::PathBuf;
use std::str::Utf8Error;

/// Error from [`Authorizer`](crate::Authorizer) operations.
///
/// Each variant is a distinct failure class; nothing here is retried
/// internally. Callers decide whether to restart the handshake.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// A token record field was rejected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The provider answered without the expected OAuth fields.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Network failure, timeout or non-2xx provider response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The installation's private key could not be loaded.
    #[error("RSA key error")]
    Key(#[from] RsaKeyError),

    /// The token store failed to load or save a record.
    #[error("token store error")]
    Persistence(#[from] StoreError),
}

impl OAuthError {
    /// Whether the provider rejected the request with HTTP 401.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Unauthorized { .. }))
    }
}

/// Invalid token record input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Consumer key is empty or longer than 255 characters.
    #[error("consumer key length must be between 1 and 255 characters (got {0})")]
    ConsumerKeyLength(usize),

    /// Base URL is not an absolute http(s) URL.
    #[error("base URL is invalid: {0}")]
    BaseUrl(String),

    /// Callback URL is not an absolute http(s) URL.
    #[error("callback URL is invalid: {0}")]
    CallbackUrl(String),

    /// A string field was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A timestamp was not strictly in the future.
    #[error("{0} must be in the future")]
    NotInFuture(&'static str),

    /// Record identifier is zero or an empty string.
    #[error("token id must be a positive integer or a non-empty string")]
    InvalidId,
}

/// Provider response missing or carrying invalid OAuth fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// Access token exchange attempted without a verifier.
    #[error("verifier missing from the token record")]
    VerifierMissing,

    /// Request token response had no `oauth_token`.
    #[error("request authorization oauth_token key missing")]
    RequestTokenMissing,

    /// Access token response field missing, empty or malformed.
    #[error("invalid {0} key")]
    InvalidKey(&'static str),
}

/// Failure to reach the provider or a non-2xx answer from it.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Target URL.
        url: String,
    },

    /// Connection, TLS or protocol failure.
    #[error("request to {url} failed")]
    Request {
        /// Target URL.
        url: String,
        /// Underlying HTTP client error.
        #[source]
        source: ureq::Error,
    },

    /// Request path or query produced an invalid URL.
    #[error("invalid request URL {url}")]
    InvalidUrl {
        /// Rejected URL.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },

    /// Provider rejected the credentials (HTTP 401).
    #[error("provider rejected credentials (401): {body}")]
    Unauthorized {
        /// Response body (may contain `oauth_problem`).
        body: String,
    },

    /// Provider answered with another non-2xx status.
    #[error("HTTP error: {status} - {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response body could not be read.
    #[error("failed to read response body from {url}")]
    Body {
        /// Target URL.
        url: String,
        /// Underlying HTTP client error.
        #[source]
        source: ureq::Error,
    },
}

/// RSA key loading/parsing error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsaKeyError {
    /// Key file could not be read.
    #[error("failed to read key file {}", path.display())]
    Read {
        /// Key file path.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid UTF-8 in key file.
    #[error("invalid UTF-8 in key")]
    InvalidUtf8(#[from] Utf8Error),

    /// PKCS#1 key parsing error (returned when both formats fail).
    #[error("PKCS#1 key error")]
    Pkcs1(#[from] rsa::pkcs1::Error),
}

/// Token store failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("token store error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_messages_name_field() {
        assert_eq!(
            AuthorizationError::InvalidKey("oauth_expires_in").to_string(),
            "invalid oauth_expires_in key"
        );
        assert!(
            AuthorizationError::VerifierMissing
                .to_string()
                .starts_with("verifier missing")
        );
        assert!(
            AuthorizationError::RequestTokenMissing
                .to_string()
                .ends_with("oauth_token key missing")
        );
    }

    #[test]
    fn test_is_unauthorized() {
        let err = OAuthError::from(TransportError::Unauthorized {
            body: "oauth_problem=token_rejected".to_owned(),
        });
        assert!(err.is_unauthorized());

        let err = OAuthError::from(TransportError::Status {
            status: 500,
            body: String::new(),
        });
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_validation_is_transparent() {
        let err = OAuthError::from(ValidationError::Empty("verifier"));
        assert_eq!(err.to_string(), "verifier must not be empty");
    }
}
