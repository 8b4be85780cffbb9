//! Framework-agnostic connect and callback endpoints.
//!
//! A host wires [`CallbackHandler::connect`] and [`CallbackHandler::callback`]
//! to two HTTP routes and turns the returned [`Redirect`] into a 302,
//! showing [`Redirect::error`] to the user if present.

use std::collections::HashMap;

use url::form_urlencoded;

use crate::authorizer::Authorizer;
use crate::error::OAuthError;
use crate::store::{NullTokenStore, TokenStore};
use crate::token::{TokenId, TokenRecord};

/// Query parameters Jira sends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub consumer_key: String,
    pub base_url: String,
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub token_id: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Missing `consumer_key` or `base_url` become empty strings and fail
    /// validation in [`into_record`](Self::into_record).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params: HashMap<String, String> = form_urlencoded::parse(
            query.trim_start_matches('?').as_bytes(),
        )
        .into_owned()
        .collect();

        Self {
            consumer_key: params.remove("consumer_key").unwrap_or_default(),
            base_url: params.remove("base_url").unwrap_or_default(),
            oauth_token: params.remove("oauth_token"),
            oauth_verifier: params.remove("oauth_verifier"),
            token_id: params.remove("token_id"),
        }
    }

    /// Load the stored record for the consumer key, or start a new one, and
    /// apply the request token, verifier and id from the callback.
    ///
    /// A stored record is only reused when its base URL matches.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Validation`] for invalid parameters and
    /// [`OAuthError::Persistence`] if the store lookup fails.
    pub fn into_record<S: TokenStore>(self, store: Option<&S>) -> Result<TokenRecord, OAuthError> {
        let stored = match store {
            Some(store) => store
                .find_by_consumer_key(&self.consumer_key)?
                .filter(|r| r.base_url() == self.base_url),
            None => None,
        };
        let mut record = match stored {
            Some(record) => record,
            None => TokenRecord::new(self.consumer_key, self.base_url)?,
        };

        if let Some(token) = self.oauth_token {
            record.set_token(token)?;
        }
        if let Some(verifier) = self.oauth_verifier {
            record.set_verifier(verifier)?;
        }
        if record.id().is_none()
            && let Some(id) = self.token_id
        {
            record.set_id(TokenId::parse(&id)?)?;
        }
        Ok(record)
    }
}

/// User-facing failure attached to a [`Redirect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallbackFailure {
    /// Consumer key, base URL or callback parameters were rejected.
    #[error("invalid Jira connection parameters")]
    InvalidParameters,
    /// Jira did not recognise the consumer (401 on request token).
    #[error("Jira rejected the consumer key")]
    Unauthorized,
    /// The user denied access (401 on access token).
    #[error("access to Jira was denied")]
    Denied,
    /// Anything else, including persistence failures.
    #[error("could not connect to Jira")]
    General,
}

/// Where to send the user next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub error: Option<CallbackFailure>,
}

/// Connect and callback logic on top of an [`Authorizer`].
#[derive(Debug)]
pub struct CallbackHandler<S: TokenStore = NullTokenStore> {
    authorizer: Authorizer<S>,
    redirect_url: String,
}

impl<S: TokenStore> CallbackHandler<S> {
    /// `redirect_url` is where users land after the callback, and after a
    /// failed connect when no referer is known.
    pub fn new(authorizer: Authorizer<S>, redirect_url: impl Into<String>) -> Self {
        Self {
            authorizer,
            redirect_url: redirect_url.into(),
        }
    }

    #[must_use]
    pub fn authorizer(&self) -> &Authorizer<S> {
        &self.authorizer
    }

    /// Start the handshake and redirect to Jira's authorization page.
    ///
    /// On failure the user goes back to `referer` (or the redirect URL).
    pub fn connect(
        &self,
        consumer_key: &str,
        base_url: &str,
        token_id: Option<&str>,
        referer: Option<&str>,
    ) -> Redirect {
        let result = new_record(consumer_key, base_url, token_id)
            .and_then(|record| self.authorizer.begin_authorization(&record));

        match result {
            Ok(location) => Redirect {
                location,
                error: None,
            },
            Err(e) => {
                tracing::warn!(consumer_key, base_url, error = %e, "OAuth connect failed");
                let failure = if e.is_unauthorized() {
                    CallbackFailure::Unauthorized
                } else {
                    classify(&e)
                };
                Redirect {
                    location: referer.unwrap_or(&self.redirect_url).to_owned(),
                    error: Some(failure),
                }
            }
        }
    }

    /// Finish the handshake from the callback query string.
    ///
    /// Always redirects to the configured redirect URL.
    pub fn callback(&self, query: &str) -> Redirect {
        let params = CallbackParams::from_query(query);
        let consumer_key = params.consumer_key.clone();
        let result = params
            .into_record(self.authorizer.store())
            .and_then(|mut record| self.authorizer.complete_authorization(&mut record));

        let error = match result {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(consumer_key = %consumer_key, error = %e, "OAuth callback failed");
                Some(if e.is_unauthorized() {
                    CallbackFailure::Denied
                } else {
                    classify(&e)
                })
            }
        };

        Redirect {
            location: self.redirect_url.clone(),
            error,
        }
    }
}

fn new_record(
    consumer_key: &str,
    base_url: &str,
    token_id: Option<&str>,
) -> Result<TokenRecord, OAuthError> {
    let mut record = TokenRecord::new(consumer_key, base_url)?;
    if let Some(id) = token_id {
        record.set_id(TokenId::parse(id)?)?;
    }
    Ok(record)
}

fn classify(error: &OAuthError) -> CallbackFailure {
    match error {
        OAuthError::Validation(_) => CallbackFailure::InvalidParameters,
        _ => CallbackFailure::General,
    }
}
