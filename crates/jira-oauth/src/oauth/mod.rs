//! OAuth 1.0 RSA-SHA1 request signing.
//!
//! Jira Server/Data Center application links only accept RSA-SHA1, so the
//! token secret never takes part in the signature.

pub(crate) mod key;
mod signature;

use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use sha1::Sha1;
use url::Url;

use signature::create_authorization_header;

/// Signs requests for one consumer key and optional token.
#[derive(Clone)]
pub(crate) struct OAuth1Signer {
    consumer_key: String,
    token: Option<String>,
    signing_key: SigningKey<Sha1>,
}

impl OAuth1Signer {
    pub(crate) fn new(
        consumer_key: impl Into<String>,
        token: Option<String>,
        private_key: RsaPrivateKey,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            token,
            signing_key: SigningKey::<Sha1>::new(private_key),
        }
    }

    /// Compute the `Authorization` header value for one request.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, etc.)
    /// * `url` - Full request URL (including query string)
    /// * `form_params` - Decoded form body parameters, empty for other bodies
    pub(crate) fn sign(&self, method: &str, url: &Url, form_params: &[(String, String)]) -> String {
        create_authorization_header(
            method,
            url,
            form_params,
            &self.consumer_key,
            self.token.as_deref(),
            &self.signing_key,
        )
    }
}

impl std::fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
