//! Signed HTTP client for Jira.
//!
//! [`CredentialSigner`] owns the installation's RSA key and a [`Transport`];
//! [`SignedClient`] binds them to one token record and signs every request
//! it sends.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rsa::RsaPrivateKey;
use ureq::Agent;
use url::Url;
use url::form_urlencoded;

use crate::error::{RsaKeyError, TransportError};
use crate::oauth::OAuth1Signer;
use crate::oauth::key::load_private_key_from_file;
use crate::provision::PRIVATE_KEY_FILE;
use crate::token::TokenRecord;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT: u64 = 30;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Uppercase method name as used on the wire and in signatures.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document, sent as `application/json`.
    Json(serde_json::Value),
    /// Form parameters, sent as `application/x-www-form-urlencoded` and signed.
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Build a form body from borrowed pairs.
    #[must_use]
    pub fn form<K: AsRef<str>, V: AsRef<str>>(params: &[(K, V)]) -> Self {
        Self::Form(
            params
                .iter()
                .map(|(k, v)| (k.as_ref().to_owned(), v.as_ref().to_owned()))
                .collect(),
        )
    }

    fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => JSON_CONTENT_TYPE,
            Self::Form(_) => FORM_CONTENT_TYPE,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Form(params) => form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish()
                .into_bytes(),
        }
    }

    fn signed_params(&self) -> &[(String, String)] {
        match self {
            Self::Json(_) => &[],
            Self::Form(params) => params,
        }
    }
}

/// Fully prepared request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded form body parameters; empty unless the body is form-encoded.
    #[must_use]
    pub fn form_params(&self) -> Vec<(String, String)> {
        match (&self.body, self.header("Content-Type")) {
            (Some(body), Some(FORM_CONTENT_TYPE)) => form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Raw provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn non-2xx responses into errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unauthorized`] for 401 and
    /// [`TransportError::Status`] for any other non-2xx status.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        if self.status == 401 {
            return Err(TransportError::Unauthorized { body: self.body });
        }
        Err(TransportError::Status {
            status: self.status,
            body: self.body,
        })
    }
}

/// Sends prepared requests. Status codes are returned, not raised.
pub trait Transport: Send + Sync {
    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on network failure or timeout.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Create transport with a global per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT))
    }
}

fn request_error(url: &Url, source: ureq::Error) -> TransportError {
    match source {
        ureq::Error::Timeout(_) => TransportError::Timeout {
            url: url.to_string(),
        },
        ureq::Error::Io(ref e) if e.kind() == ErrorKind::TimedOut => TransportError::Timeout {
            url: url.to_string(),
        },
        source => TransportError::Request {
            url: url.to_string(),
            source,
        },
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let body = body.unwrap_or_default();

        let result = match method {
            Method::Get | Method::Delete => {
                let mut builder = if method == Method::Get {
                    self.agent.get(url.as_str())
                } else {
                    self.agent.delete(url.as_str())
                };
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            Method::Post | Method::Put => {
                let mut builder = if method == Method::Post {
                    self.agent.post(url.as_str())
                } else {
                    self.agent.put(url.as_str())
                };
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(body.as_slice())
            }
        };
        let response = result.map_err(|e| request_error(&url, e))?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();
        let body = body_reader
            .read_to_string()
            .map_err(|source| TransportError::Body {
                url: url.to_string(),
                source,
            })?;

        Ok(HttpResponse { status, body })
    }
}

/// Loads the installation key and hands out [`SignedClient`]s.
pub struct CredentialSigner {
    private_key: RsaPrivateKey,
    transport: Arc<dyn Transport>,
}

impl CredentialSigner {
    /// Load `private.key` from the key material directory and use the default
    /// `ureq` transport.
    ///
    /// # Errors
    ///
    /// Returns [`RsaKeyError`] if the key file is missing or cannot be parsed.
    pub fn from_cert_dir(cert_dir: &Path, timeout: Duration) -> Result<Self, RsaKeyError> {
        let private_key = load_private_key_from_file(&cert_dir.join(PRIVATE_KEY_FILE))?;
        Ok(Self::with_transport(
            private_key,
            Arc::new(UreqTransport::new(timeout)),
        ))
    }

    /// Use an already loaded key and a custom transport.
    #[must_use]
    pub fn with_transport(private_key: RsaPrivateKey, transport: Arc<dyn Transport>) -> Self {
        Self {
            private_key,
            transport,
        }
    }

    /// Build a client signing with the record's consumer key and token.
    ///
    /// `oauth_token` is only sent when the record carries a token.
    #[must_use]
    pub fn build_signed_client(&self, record: &TokenRecord) -> SignedClient {
        self.signed_client(
            record.consumer_key(),
            record.base_url(),
            record.token().map(ToOwned::to_owned),
        )
    }

    pub(crate) fn signed_client(
        &self,
        consumer_key: &str,
        base_url: &str,
        token: Option<String>,
    ) -> SignedClient {
        SignedClient {
            transport: Arc::clone(&self.transport),
            signer: OAuth1Signer::new(consumer_key, token, self.private_key.clone()),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner").finish_non_exhaustive()
    }
}

/// HTTP client scoped to one record's base URL and credentials.
///
/// Each [`send`](Self::send) computes a fresh nonce, timestamp and
/// signature. Nothing is cached between requests.
#[derive(Clone)]
pub struct SignedClient {
    transport: Arc<dyn Transport>,
    signer: OAuth1Signer,
    base_url: String,
}

impl SignedClient {
    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path relative to the base URL and append query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if the result is not a valid URL.
    pub fn url<K: AsRef<str>, V: AsRef<str>>(
        &self,
        path: &str,
        query: &[(K, V)],
    ) -> Result<Url, TransportError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|source| TransportError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
        }
        Ok(url)
    }

    /// Sign and send one request. The response status is not interpreted.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the URL is invalid or the request fails.
    pub fn send<K: AsRef<str>, V: AsRef<str>>(
        &self,
        method: Method,
        path: &str,
        query: &[(K, V)],
        body: Option<&RequestBody>,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.url(path, query)?;
        let form_params = body.map(RequestBody::signed_params).unwrap_or_default();
        let authorization = self.signer.sign(method.as_str(), &url, form_params);

        let mut headers = vec![("Authorization".to_owned(), authorization)];
        if let Some(body) = body {
            headers.push(("Content-Type".to_owned(), body.content_type().to_owned()));
        }

        tracing::debug!(%method, %url, "Sending signed request");
        self.transport.send(HttpRequest {
            method,
            url,
            headers,
            body: body.map(RequestBody::encode),
        })
    }
}

impl std::fmt::Debug for SignedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedClient")
            .field("base_url", &self.base_url)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}
