use std::path::PathBuf;

/// Key material generation or subject validation failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProvisioningError {
    /// Target directory is missing and could not be created.
    #[error("could not create certs directory ({})", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an artifact failed.
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// RSA key generation failed.
    #[error("RSA key generation failed")]
    KeyGeneration(#[from] rsa::Error),

    /// DER/PEM encoding of a key, request or certificate failed.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Building or signing the request or certificate failed.
    #[error("certificate generation failed")]
    Certificate(#[from] x509_cert::builder::Error),

    /// Not an ISO 3166-1 alpha-2 code.
    #[error("Invalid country code")]
    InvalidCountry(String),

    /// Not a valid email address.
    #[error("Invalid email")]
    InvalidEmail(String),

    /// A required subject field was empty.
    #[error("This value cannot be empty")]
    Empty,

    /// Validity is not a whole number of days in `1..=MAX_VALIDITY_DAYS`.
    #[error("Invalid value, enter an integer between 1 and 36500")]
    InvalidValidity(String),
}

impl From<x509_cert::der::Error> for ProvisioningError {
    fn from(e: x509_cert::der::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<rsa::pkcs8::Error> for ProvisioningError {
    fn from(e: rsa::pkcs8::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<rsa::pkcs8::spki::Error> for ProvisioningError {
    fn from(e: rsa::pkcs8::spki::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}
