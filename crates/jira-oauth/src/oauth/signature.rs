//! OAuth 1.0 signature generation (RFC 5849).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use rand::RngExt;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::Sha1;
use url::Url;

/// OAuth unreserved characters: A-Z a-z 0-9 - . _ ~
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode string per RFC 3986.
fn oauth_encode(input: &str) -> String {
    percent_encode(input.as_bytes(), OAUTH_ENCODE_SET).to_string()
}

/// Generate cryptographically random nonce (32 hex characters).
fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Current Unix time in seconds.
fn generate_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Sign data with RSA-SHA1 and return base64-encoded signature.
fn sign_rsa_sha1(signing_key: &SigningKey<Sha1>, data: &str) -> String {
    let signature = signing_key.sign(data.as_bytes());
    BASE64_STANDARD.encode(signature.to_bytes())
}

/// Base string URI per RFC 5849 Section 3.4.1.2.
///
/// Scheme and host are lowercase, default ports are dropped and the query
/// is excluded.
pub(crate) fn normalize_base_url(url: &Url) -> String {
    let mut normalized = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    // `Url::port` is None when the port is the scheme default
    if let Some(port) = url.port() {
        let _ = write!(normalized, ":{port}");
    }
    normalized.push_str(url.path());
    normalized
}

/// Build OAuth signature base string per RFC 5849 Section 3.4.1.
///
/// Format: `HTTP_METHOD&encoded_base_url&encoded_parameters`. Parameters are
/// encoded first, then sorted by name and value; repeated names are kept.
fn build_signature_base_string(method: &str, base_url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (oauth_encode(k), oauth_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        oauth_encode(base_url),
        oauth_encode(&param_string)
    )
}

/// Build OAuth Authorization header from OAuth params.
fn build_authorization_header(oauth_params: &BTreeMap<&'static str, String>) -> String {
    let header_parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", oauth_encode(v)))
        .collect();
    format!("OAuth {}", header_parts.join(", "))
}

/// Create OAuth Authorization header value with a fresh nonce and timestamp.
///
/// # Arguments
/// * `method` - HTTP method (GET, POST, etc.)
/// * `url` - Full request URL; its query parameters are signed
/// * `form_params` - Form-encoded body parameters, signed alongside the query
/// * `consumer_key` - OAuth consumer key
/// * `token` - Request or access token (`None` when requesting a request token)
/// * `signing_key` - RSA-SHA1 signing key
pub(crate) fn create_authorization_header(
    method: &str,
    url: &Url,
    form_params: &[(String, String)],
    consumer_key: &str,
    token: Option<&str>,
    signing_key: &SigningKey<Sha1>,
) -> String {
    authorization_header_with(
        method,
        url,
        form_params,
        consumer_key,
        token,
        signing_key,
        generate_nonce(),
        generate_timestamp(),
    )
}

#[allow(clippy::too_many_arguments)]
fn authorization_header_with(
    method: &str,
    url: &Url,
    form_params: &[(String, String)],
    consumer_key: &str,
    token: Option<&str>,
    signing_key: &SigningKey<Sha1>,
    nonce: String,
    timestamp: String,
) -> String {
    let mut oauth_params = BTreeMap::new();
    oauth_params.insert("oauth_consumer_key", consumer_key.to_owned());
    oauth_params.insert("oauth_nonce", nonce);
    oauth_params.insert("oauth_signature_method", "RSA-SHA1".to_owned());
    oauth_params.insert("oauth_timestamp", timestamp);
    oauth_params.insert("oauth_version", "1.0".to_owned());
    if let Some(token) = token {
        oauth_params.insert("oauth_token", token.to_owned());
    }

    // Signature covers OAuth params, query params and form body (RFC 5849 Section 3.4.1.3)
    let mut signature_params: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect();
    signature_params.extend(
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned())),
    );
    signature_params.extend(form_params.iter().cloned());

    let base_string =
        build_signature_base_string(method, &normalize_base_url(url), &signature_params);
    tracing::trace!(%base_string, "OAuth signature base string");

    let signature = sign_rsa_sha1(signing_key, &base_string);
    oauth_params.insert("oauth_signature", signature);

    build_authorization_header(&oauth_params)
}
