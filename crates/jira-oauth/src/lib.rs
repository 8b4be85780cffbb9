//! OAuth 1.0a (RSA-SHA1) authorization and signed requests for Jira.
//!
//! This crate provides:
//! - [`TokenRecord`]: validated credential record for one Jira instance
//! - [`Authorizer`]: three-legged handshake (request token, user
//!   authorization, access token exchange)
//! - [`CredentialSigner`] and [`SignedClient`]: per-request RSA-SHA1 signing
//! - [`ProviderGateway`]: signed GET/POST/PUT/DELETE against the REST API
//! - [`TokenStore`] implementations and [`TokenListener`] notifications
//! - [`CallbackHandler`]: connect/callback endpoint logic for web hosts
//! - [`provision`]: RSA key and self-signed certificate generation
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use std::time::Duration;
//! use jira_oauth::{Authorizer, CredentialSigner, ProviderGateway, TokenRecord};
//!
//! let signer = CredentialSigner::from_cert_dir(Path::new("var/certs"), Duration::from_secs(30))?;
//! let authorizer = Authorizer::new(
//!     ProviderGateway::new(signer),
//!     "https://app.example.com/jira/callback",
//! )?;
//!
//! let record = TokenRecord::new("my-consumer", "https://example.atlassian.net")?;
//! let authorize_url = authorizer.begin_authorization(&record)?;
//! ```

mod authorizer;
mod callback;
mod client;
mod error;
mod events;
mod gateway;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod oauth;
pub mod provision;
mod store;
mod token;

pub use authorizer::{ACCESS_TOKEN_PATH, AUTHORIZE_PATH, Authorizer, REQUEST_TOKEN_PATH};
pub use callback::{CallbackFailure, CallbackHandler, CallbackParams, Redirect};
pub use client::{
    CredentialSigner, DEFAULT_TIMEOUT, HttpRequest, HttpResponse, Method, RequestBody,
    SignedClient, Transport, UreqTransport,
};
pub use error::{
    AuthorizationError, OAuthError, RsaKeyError, StoreError, TransportError, ValidationError,
};
pub use events::{
    ChannelListener, TokenEventReceiver, TokenEvents, TokenGenerated, TokenListener,
    TracingListener,
};
pub use gateway::ProviderGateway;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use oauth::key::{load_private_key, load_private_key_from_file};
pub use store::{JsonFileTokenStore, MemoryTokenStore, NullTokenStore, TokenStore};
pub use token::{TokenId, TokenRecord, TokenRecordBuilder, TokenState};
