//! Signed REST calls against a Jira instance.

use crate::client::{CredentialSigner, HttpResponse, Method, RequestBody};
use crate::error::TransportError;
use crate::token::TokenRecord;

/// Thin request surface over [`CredentialSigner`].
///
/// Every call builds a fresh [`SignedClient`](crate::SignedClient) for the
/// given record. Status codes are returned as-is; there are no retries.
#[derive(Debug)]
pub struct ProviderGateway {
    signer: CredentialSigner,
}

impl ProviderGateway {
    #[must_use]
    pub fn new(signer: CredentialSigner) -> Self {
        Self { signer }
    }

    /// Underlying signer.
    #[must_use]
    pub fn signer(&self) -> &CredentialSigner {
        &self.signer
    }

    /// Signed GET.
    pub fn get<K: AsRef<str>, V: AsRef<str>>(
        &self,
        token: &TokenRecord,
        path: &str,
        query: &[(K, V)],
    ) -> Result<HttpResponse, TransportError> {
        self.send(token, Method::Get, path, query, None)
    }

    /// Signed POST.
    pub fn post<K: AsRef<str>, V: AsRef<str>>(
        &self,
        token: &TokenRecord,
        path: &str,
        query: &[(K, V)],
        body: Option<&RequestBody>,
    ) -> Result<HttpResponse, TransportError> {
        self.send(token, Method::Post, path, query, body)
    }

    /// Signed PUT.
    pub fn put<K: AsRef<str>, V: AsRef<str>>(
        &self,
        token: &TokenRecord,
        path: &str,
        query: &[(K, V)],
        body: Option<&RequestBody>,
    ) -> Result<HttpResponse, TransportError> {
        self.send(token, Method::Put, path, query, body)
    }

    /// Signed DELETE.
    pub fn delete<K: AsRef<str>, V: AsRef<str>>(
        &self,
        token: &TokenRecord,
        path: &str,
        query: &[(K, V)],
    ) -> Result<HttpResponse, TransportError> {
        self.send(token, Method::Delete, path, query, None)
    }

    /// Signed request with an explicit method.
    pub fn send<K: AsRef<str>, V: AsRef<str>>(
        &self,
        token: &TokenRecord,
        method: Method,
        path: &str,
        query: &[(K, V)],
        body: Option<&RequestBody>,
    ) -> Result<HttpResponse, TransportError> {
        self.signer
            .build_signed_client(token)
            .send(method, path, query, body)
    }
}
