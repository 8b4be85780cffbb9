//! Three-legged OAuth 1.0a handshake against Jira.
//!
//! The flow for one [`TokenRecord`]:
//! 1. [`Authorizer::begin_authorization`] obtains a request token and returns
//!    the URL where the user approves access.
//! 2. Jira redirects the user to the callback URL with `oauth_token` and
//!    `oauth_verifier`; the host sets both on the record.
//! 3. [`Authorizer::complete_authorization`] exchanges the verifier for an
//!    access token, notifies listeners and persists the record.
//!
//! The request token is tracked by Jira only; it travels through the
//! authorize URL and comes back on the callback.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;
use url::form_urlencoded;

use crate::client::{Method, RequestBody};
use crate::error::{AuthorizationError, OAuthError, ValidationError};
use crate::events::{TokenGenerated, TokenListener};
use crate::gateway::ProviderGateway;
use crate::store::{NullTokenStore, TokenStore};
use crate::token::TokenRecord;

/// Request token endpoint, relative to the Jira base URL.
pub const REQUEST_TOKEN_PATH: &str = "/plugins/servlet/oauth/request-token";
/// User authorization page, relative to the Jira base URL.
pub const AUTHORIZE_PATH: &str = "/plugins/servlet/oauth/authorize";
/// Access token endpoint, relative to the Jira base URL.
pub const ACCESS_TOKEN_PATH: &str = "/plugins/servlet/oauth/access-token";

const NO_QUERY: &[(&str, &str)] = &[];

/// Drives the OAuth handshake for token records.
///
/// The store is optional; without one the caller owns the resulting
/// credentials. Listeners are fixed once the authorizer is built.
pub struct Authorizer<S: TokenStore = NullTokenStore> {
    gateway: ProviderGateway,
    callback_url: Url,
    store: Option<S>,
    listeners: Vec<Box<dyn TokenListener>>,
}

impl Authorizer<NullTokenStore> {
    /// Create an authorizer without persistence.
    ///
    /// `callback_url` is the absolute URL of the host's callback endpoint.
    pub fn new(gateway: ProviderGateway, callback_url: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::CallbackUrl(callback_url.to_owned());
        let parsed = Url::parse(callback_url).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }

        Ok(Self {
            gateway,
            callback_url: parsed,
            store: None,
            listeners: Vec::new(),
        })
    }
}

impl<S: TokenStore> Authorizer<S> {
    /// Persist records through `store` after each successful exchange.
    #[must_use]
    pub fn with_store<T: TokenStore>(self, store: T) -> Authorizer<T> {
        Authorizer {
            gateway: self.gateway,
            callback_url: self.callback_url,
            store: Some(store),
            listeners: self.listeners,
        }
    }

    /// Register a listener for [`TokenGenerated`] events.
    #[must_use]
    pub fn with_listener(mut self, listener: impl TokenListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    #[must_use]
    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    #[must_use]
    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// Callback URL for a record: the configured URL plus `consumer_key`,
    /// `base_url` and, when the record has one, `token_id`.
    #[must_use]
    pub fn callback_url(&self, record: &TokenRecord) -> Url {
        let mut url = self.callback_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("consumer_key", record.consumer_key())
                .append_pair("base_url", record.base_url());
            if let Some(id) = record.id() {
                query.append_pair("token_id", &id.to_string());
            }
        }
        url
    }

    /// Obtain a request token and return the URL where the user authorizes it.
    ///
    /// The record is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::RequestTokenMissing`] if Jira answers
    /// without `oauth_token`, or [`OAuthError::Transport`] on network
    /// failure and non-2xx responses.
    pub fn begin_authorization(&self, record: &TokenRecord) -> Result<String, OAuthError> {
        let callback = self.callback_url(record);
        // A request token call never carries a token, even when re-authorizing
        let client = self
            .gateway
            .signer()
            .signed_client(record.consumer_key(), record.base_url(), None);

        tracing::debug!(
            consumer_key = record.consumer_key(),
            callback = %callback,
            "Requesting OAuth request token"
        );
        let body = RequestBody::form(&[("oauth_callback", callback.as_str())]);
        let response = client
            .send(Method::Post, REQUEST_TOKEN_PATH, NO_QUERY, Some(&body))?
            .error_for_status()?;

        let params = parse_form(&response.body);
        let oauth_token = params
            .get("oauth_token")
            .filter(|t| !t.is_empty())
            .ok_or(AuthorizationError::RequestTokenMissing)?;

        let authorize_url = client.url(AUTHORIZE_PATH, &[("oauth_token", oauth_token)])?;
        tracing::info!(
            consumer_key = record.consumer_key(),
            base_url = record.base_url(),
            "Request token obtained, awaiting user authorization"
        );
        Ok(authorize_url.into())
    }

    /// Exchange the record's verifier for access credentials.
    ///
    /// On success the record holds token, secret, both expiry timestamps and
    /// the session handle. Listeners run first, then the store (if any)
    /// saves the record once.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::VerifierMissing`] before any network call
    /// - [`AuthorizationError::InvalidKey`] naming the first missing or
    ///   malformed response field; the record is left unmodified
    /// - [`OAuthError::Transport`] on network failure and non-2xx responses
    /// - [`OAuthError::Persistence`] if the store rejects the record; the
    ///   record stays populated
    pub fn complete_authorization(&self, record: &mut TokenRecord) -> Result<(), OAuthError> {
        let verifier = record
            .verifier()
            .ok_or(AuthorizationError::VerifierMissing)?;

        let client = self.gateway.signer().build_signed_client(record);
        tracing::debug!(
            consumer_key = record.consumer_key(),
            "Exchanging verifier for access token"
        );
        let body = RequestBody::form(&[("oauth_verifier", verifier)]);
        let response = client
            .send(Method::Post, ACCESS_TOKEN_PATH, NO_QUERY, Some(&body))?
            .error_for_status()?;

        let params = parse_form(&response.body);
        let now = Utc::now();
        let token = required_str(&params, "oauth_token")?;
        let token_secret = required_str(&params, "oauth_token_secret")?;
        let expires_at = required_expiry(&params, "oauth_expires_in", now)?;
        let auth_expires_at = required_expiry(&params, "oauth_authorization_expires_in", now)?;
        let session_handle = required_str(&params, "oauth_session_handle")?;

        let mut updated = record.clone();
        updated.set_token(token).map_err(invalid_key("oauth_token"))?;
        updated
            .set_token_secret(token_secret)
            .map_err(invalid_key("oauth_token_secret"))?;
        updated
            .set_expires_at(expires_at)
            .map_err(invalid_key("oauth_expires_in"))?;
        updated
            .set_auth_expires_at(auth_expires_at)
            .map_err(invalid_key("oauth_authorization_expires_in"))?;
        updated
            .set_session_handle(session_handle)
            .map_err(invalid_key("oauth_session_handle"))?;
        *record = updated;

        tracing::debug!(consumer_key = record.consumer_key(), "Access token obtained");

        let event = TokenGenerated {
            record: record.clone(),
        };
        for listener in &self.listeners {
            listener.on_token_generated(&event);
        }

        if let Some(store) = &self.store
            && let Err(e) = store.save(record)
        {
            tracing::warn!(
                consumer_key = record.consumer_key(),
                error = %e,
                "Failed to persist OAuth token"
            );
            return Err(OAuthError::Persistence(e));
        }

        Ok(())
    }
}

impl<S: TokenStore> std::fmt::Debug for Authorizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("callback_url", &self.callback_url.as_str())
            .field("store", &self.store.is_some())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Parse a form-encoded provider response.
fn parse_form(body: &str) -> HashMap<String, String> {
    form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect()
}

fn invalid_key(field: &'static str) -> impl Fn(ValidationError) -> AuthorizationError {
    move |_| AuthorizationError::InvalidKey(field)
}

fn required_str<'a>(
    params: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, AuthorizationError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(AuthorizationError::InvalidKey(key))
}

/// Read a positive number of seconds and add it to `now`.
///
/// Only plain ASCII digits are accepted; signs, decimals and values beyond
/// the clock range are rejected.
fn required_expiry(
    params: &HashMap<String, String>,
    key: &'static str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AuthorizationError> {
    let invalid = AuthorizationError::InvalidKey(key);
    let raw = required_str(params, key)?;
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid);
    }
    let seconds: i64 = raw.parse().map_err(|_| invalid.clone())?;
    if seconds <= 0 {
        return Err(invalid);
    }
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(invalid)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::client::{CredentialSigner, Transport};
    use crate::error::{StoreError, TransportError};
    use crate::events::TokenEvents;
    use crate::mock::MockTransport;
    use crate::oauth::key::tests::test_key;
    use crate::store::MemoryTokenStore;
    use crate::token::{TokenId, TokenState};
    use pretty_assertions::assert_eq;

    const BASE_URL: &str = "https://example.atlassian.net";
    const CALLBACK: &str = "https://app.example.com/jira/callback";
    const ACCESS_RESPONSE: &str = "oauth_token=T&oauth_token_secret=S&oauth_expires_in=3600\
                                   &oauth_authorization_expires_in=7200&oauth_session_handle=H";

    fn authorizer(transport: &Arc<MockTransport>) -> Authorizer {
        let signer = CredentialSigner::with_transport(
            test_key(),
            Arc::clone(transport) as Arc<dyn Transport>,
        );
        Authorizer::new(ProviderGateway::new(signer), CALLBACK).unwrap()
    }

    fn verified_record() -> TokenRecord {
        TokenRecord::builder("consumer", BASE_URL)
            .token("request-token")
            .verifier("v3r1f13r")
            .build()
            .unwrap()
    }

    fn auth_param<'a>(header: &'a str, name: &str) -> Option<&'a str> {
        header
            .trim_start_matches("OAuth ")
            .split(", ")
            .find_map(|part| part.strip_prefix(&format!("{name}=\"")))
            .map(|v| v.trim_end_matches('"'))
    }

    fn form_value(request: &crate::client::HttpRequest, key: &str) -> Option<String> {
        request
            .form_params()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn test_new_rejects_invalid_callback() {
        let transport = Arc::new(MockTransport::new());
        let signer = || {
            ProviderGateway::new(CredentialSigner::with_transport(
                test_key(),
                Arc::clone(&transport) as Arc<dyn Transport>,
            ))
        };
        assert_eq!(
            Authorizer::new(signer(), "/relative/callback").unwrap_err(),
            ValidationError::CallbackUrl("/relative/callback".to_owned())
        );
        assert!(Authorizer::new(signer(), "ftp://example.com/cb").is_err());
    }

    #[test]
    fn test_begin_returns_authorize_url() {
        let transport = Arc::new(MockTransport::new().with_response(200, "oauth_token=abc123"));
        let record = TokenRecord::new("consumer", BASE_URL).unwrap();

        let url = authorizer(&transport).begin_authorization(&record).unwrap();

        assert_eq!(
            url,
            "https://example.atlassian.net/plugins/servlet/oauth/authorize?oauth_token=abc123"
        );
    }

    #[test]
    fn test_begin_sends_signed_callback() {
        let transport = Arc::new(MockTransport::new().with_response(
            200,
            "oauth_token=abc123&oauth_token_secret=s&oauth_callback_confirmed=true",
        ));
        let record = TokenRecord::builder("consumer", BASE_URL)
            .id(TokenId::Int(7))
            .token("old-access-token")
            .build()
            .unwrap();

        authorizer(&transport).begin_authorization(&record).unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.url.as_str(),
            "https://example.atlassian.net/plugins/servlet/oauth/request-token"
        );

        let callback = Url::parse(&form_value(request, "oauth_callback").unwrap()).unwrap();
        let query: HashMap<String, String> = callback.query_pairs().into_owned().collect();
        assert_eq!(query["consumer_key"], "consumer");
        assert_eq!(query["base_url"], BASE_URL);
        assert_eq!(query["token_id"], "7");
        assert_eq!(callback.path(), "/jira/callback");

        let header = request.header("Authorization").unwrap();
        assert!(auth_param(header, "oauth_token").is_none());
        assert_eq!(auth_param(header, "oauth_consumer_key"), Some("consumer"));
    }

    #[test]
    fn test_callback_url_without_id() {
        let transport = Arc::new(MockTransport::new());
        let record = TokenRecord::new("consumer", BASE_URL).unwrap();
        let url = authorizer(&transport).callback_url(&record);
        assert_eq!(
            url.as_str(),
            "https://app.example.com/jira/callback?consumer_key=consumer\
             &base_url=https%3A%2F%2Fexample.atlassian.net"
        );
    }

    #[test]
    fn test_begin_keeps_base_path() {
        let transport = Arc::new(MockTransport::new().with_response(200, "oauth_token=abc"));
        let record = TokenRecord::new("consumer", "https://example.com/jira").unwrap();
        let url = authorizer(&transport).begin_authorization(&record).unwrap();
        assert_eq!(
            url,
            "https://example.com/jira/plugins/servlet/oauth/authorize?oauth_token=abc"
        );
    }

    #[test]
    fn test_begin_missing_oauth_token() {
        for body in ["oauth_token_secret=s", "", "oauth_token="] {
            let transport = Arc::new(MockTransport::new().with_response(200, body));
            let record = TokenRecord::new("consumer", BASE_URL).unwrap();

            let err = authorizer(&transport)
                .begin_authorization(&record)
                .unwrap_err();

            assert!(matches!(
                err,
                OAuthError::Authorization(AuthorizationError::RequestTokenMissing)
            ));
            assert!(err.to_string().ends_with("oauth_token key missing"));
        }
    }

    #[test]
    fn test_begin_unauthorized() {
        let transport = Arc::new(
            MockTransport::new().with_response(401, "oauth_problem=consumer_key_unknown"),
        );
        let record = TokenRecord::new("consumer", BASE_URL).unwrap();
        let err = authorizer(&transport)
            .begin_authorization(&record)
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_begin_timeout_is_transport_error() {
        let transport = Arc::new(MockTransport::new().with_error(TransportError::Timeout {
            url: BASE_URL.to_owned(),
        }));
        let record = TokenRecord::new("consumer", BASE_URL).unwrap();
        let err = authorizer(&transport)
            .begin_authorization(&record)
            .unwrap_err();
        assert!(matches!(
            err,
            OAuthError::Transport(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_complete_without_verifier_makes_no_request() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let mut record = TokenRecord::new("consumer", BASE_URL).unwrap();

        let err = authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap_err();

        assert!(matches!(
            err,
            OAuthError::Authorization(AuthorizationError::VerifierMissing)
        ));
        assert!(err.to_string().starts_with("verifier missing"));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_complete_populates_record() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let mut record = verified_record();

        authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap();

        let now = Utc::now();
        assert_eq!(record.token(), Some("T"));
        assert_eq!(record.token_secret(), Some("S"));
        assert_eq!(record.session_handle(), Some("H"));
        let expires_in = record.expires_at().unwrap() - now;
        assert!((expires_in - TimeDelta::seconds(3600)).num_seconds().abs() <= 5);
        let auth_expires_in = record.auth_expires_at().unwrap() - now;
        assert!((auth_expires_in - TimeDelta::seconds(7200)).num_seconds().abs() <= 5);
        assert_eq!(record.state(), TokenState::Active);
    }

    #[test]
    fn test_complete_sends_verifier_and_request_token() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let mut record = verified_record();

        authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(
            request.url.as_str(),
            "https://example.atlassian.net/plugins/servlet/oauth/access-token"
        );
        assert_eq!(form_value(request, "oauth_verifier").as_deref(), Some("v3r1f13r"));
        let header = request.header("Authorization").unwrap();
        assert_eq!(auth_param(header, "oauth_token"), Some("request-token"));
    }

    #[test]
    fn test_complete_missing_field_names_it_and_leaves_record() {
        let fields = [
            "oauth_token",
            "oauth_token_secret",
            "oauth_expires_in",
            "oauth_authorization_expires_in",
            "oauth_session_handle",
        ];
        for missing in fields {
            let body: Vec<&str> = ACCESS_RESPONSE
                .split('&')
                .filter(|pair| !pair.starts_with(&format!("{missing}=")))
                .collect();
            let transport = Arc::new(MockTransport::new().with_response(200, body.join("&")));
            let mut record = verified_record();
            let original = record.clone();

            let err = authorizer(&transport)
                .complete_authorization(&mut record)
                .unwrap_err();

            assert!(
                matches!(
                    err,
                    OAuthError::Authorization(AuthorizationError::InvalidKey(field)) if field == missing
                ),
                "unexpected error for {missing}: {err}"
            );
            assert_eq!(err.to_string(), format!("invalid {missing} key"));
            assert_eq!(record, original);
        }
    }

    #[test]
    fn test_complete_reports_first_violation() {
        let transport = Arc::new(
            MockTransport::new().with_response(200, "oauth_expires_in=abc&oauth_session_handle="),
        );
        let mut record = verified_record();
        let err = authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid oauth_token key");
    }

    #[test]
    fn test_complete_rejects_malformed_numbers() {
        for value in ["-5", "1.5", "0", "abc", "+3", " 60", "99999999999999999999"] {
            let body = ACCESS_RESPONSE.replace(
                "oauth_expires_in=3600",
                &format!(
                    "oauth_expires_in={}",
                    form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
                ),
            );
            let transport = Arc::new(MockTransport::new().with_response(200, body));
            let mut record = verified_record();
            let original = record.clone();

            let err = authorizer(&transport)
                .complete_authorization(&mut record)
                .unwrap_err();

            assert_eq!(
                err.to_string(),
                "invalid oauth_expires_in key",
                "value {value:?} accepted"
            );
            assert_eq!(record, original);
        }
    }

    #[test]
    fn test_complete_out_of_range_expiry() {
        // Fits in i64 but not in the clock range
        let body = ACCESS_RESPONSE.replace(
            "oauth_authorization_expires_in=7200",
            "oauth_authorization_expires_in=9223372036854775807",
        );
        let transport = Arc::new(MockTransport::new().with_response(200, body));
        let mut record = verified_record();
        let err = authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid oauth_authorization_expires_in key");
    }

    #[test]
    fn test_complete_access_denied() {
        let transport =
            Arc::new(MockTransport::new().with_response(401, "oauth_problem=permission_denied"));
        let mut record = verified_record();
        let original = record.clone();
        let err = authorizer(&transport)
            .complete_authorization(&mut record)
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(record, original);
    }

    #[test]
    fn test_complete_notifies_and_persists() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let store = Arc::new(MemoryTokenStore::new());
        let (listener, events) = TokenEvents::channel();
        let authorizer = authorizer(&transport)
            .with_store(Arc::clone(&store))
            .with_listener(listener);
        let mut record = verified_record();

        authorizer.complete_authorization(&mut record).unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.record.token(), Some("T"));
        assert!(events.try_recv().is_none());

        assert_eq!(record.id(), Some(&TokenId::Int(1)));
        let stored = store.find_by_consumer_key("consumer").unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn test_complete_updates_existing_store_entry() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let store = Arc::new(MemoryTokenStore::new());
        let mut existing = TokenRecord::builder("consumer", BASE_URL)
            .token("stale")
            .build()
            .unwrap();
        store.save(&mut existing).unwrap();
        let mut other = TokenRecord::new("other", BASE_URL).unwrap();
        store.save(&mut other).unwrap();

        let authorizer = authorizer(&transport).with_store(Arc::clone(&store));
        let mut record = verified_record();
        authorizer.complete_authorization(&mut record).unwrap();

        assert_eq!(record.id(), Some(&TokenId::Int(1)));
        assert_eq!(store.records().unwrap().len(), 2);
    }

    struct FailingStore;

    impl TokenStore for FailingStore {
        fn find_by_consumer_key(&self, _: &str) -> Result<Option<TokenRecord>, StoreError> {
            Ok(None)
        }

        fn save(&self, _: &mut TokenRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_owned()))
        }
    }

    #[test]
    fn test_complete_persistence_failure_is_distinct() {
        let transport = Arc::new(MockTransport::new().with_response(200, ACCESS_RESPONSE));
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let authorizer = authorizer(&transport)
            .with_store(FailingStore)
            .with_listener(move |_: &TokenGenerated| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let mut record = verified_record();

        let err = authorizer.complete_authorization(&mut record).unwrap_err();

        assert!(matches!(err, OAuthError::Persistence(StoreError::Backend(_))));
        assert_eq!(record.token(), Some("T"));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_required_expiry() {
        let now = Utc::now();
        let params: HashMap<String, String> =
            [("n".to_owned(), "60".to_owned())].into_iter().collect();
        assert_eq!(
            required_expiry(&params, "n", now).unwrap(),
            now + TimeDelta::seconds(60)
        );
        assert_eq!(
            required_expiry(&params, "missing", now).unwrap_err(),
            AuthorizationError::InvalidKey("missing")
        );
    }
}
