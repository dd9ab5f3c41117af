//! # Error Types
//!
//! Error taxonomy for the Vault issuer using `thiserror`. Each variant maps to one
//! failure point on the path from issuer configuration to a signed certificate chain,
//! so callers can tell configuration problems apart from transient backend trouble.

use reqwest::StatusCode;

/// Custom result type for issuer operations
pub type Result<T> = std::result::Result<T, IssuerError>;

/// Main error type for the Vault issuer
#[derive(thiserror::Error, Debug)]
pub enum IssuerError {
    /// Malformed or incomplete issuer configuration. Not retryable.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Credential material is missing from the secret store.
    #[error("Secret lookup failed for {reference}: {message}")]
    SecretLookup { reference: String, message: String },

    /// The login request failed in transport or was rejected by Vault.
    #[error("Error logging in to Vault server: {message}")]
    AuthRequest { status: Option<StatusCode>, message: String },

    /// The login response body was not valid JSON.
    #[error("Unable to decode Vault login response: {source}")]
    AuthDecode {
        #[source]
        source: serde_json::Error,
    },

    /// Vault accepted the login but returned no client token.
    #[error("No token returned by Vault login")]
    EmptyToken,

    /// The caller supplied a CSR that could not be decoded.
    #[error("Failed to decode CSR for signing: {message}")]
    CsrDecode { message: String },

    /// The signing request failed in transport or was rejected by Vault.
    #[error("Failed to sign certificate by Vault: {message}")]
    SignRequest { status: Option<StatusCode>, message: String },

    /// The signing response body was not valid JSON.
    #[error("Failed to decode response returned by Vault: {source}")]
    ResponseDecode {
        #[source]
        source: serde_json::Error,
    },

    /// The signing response did not contain a usable certificate bundle.
    #[error("Unable to parse certificate bundle returned by Vault: {message}")]
    BundleParse { message: String },

    /// The sys/health request failed.
    #[error("Vault status request failed: {message}")]
    StatusRequest { status: Option<StatusCode>, message: String },
}

impl IssuerError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a secret lookup error for the given reference
    pub fn secret_lookup(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SecretLookup { reference: reference.into(), message: message.into() }
    }

    /// Create a login error
    pub fn auth_request(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self::AuthRequest { status, message: message.into() }
    }

    /// Create a CSR decoding error
    pub fn csr_decode<S: Into<String>>(message: S) -> Self {
        Self::CsrDecode { message: message.into() }
    }

    /// Create a signing request error
    pub fn sign_request(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self::SignRequest { status, message: message.into() }
    }

    /// Create a bundle parsing error
    pub fn bundle_parse<S: Into<String>>(message: S) -> Self {
        Self::BundleParse { message: message.into() }
    }

    /// Create a status request error
    pub fn status_request(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self::StatusRequest { status, message: message.into() }
    }

    /// HTTP status returned by Vault, for the variants that carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AuthRequest { status, .. }
            | Self::SignRequest { status, .. }
            | Self::StatusRequest { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether re-invoking the operation later may succeed without operator action.
    ///
    /// Secret lookups are treated as transient since the referenced secret is usually
    /// created shortly after the issuer. Requests that never got a response, rate
    /// limiting and server errors are transient. A sign rejected with 403 is transient
    /// as well: the session is refreshed on the next call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SecretLookup { .. } => true,
            Self::AuthRequest { status, .. } | Self::StatusRequest { status, .. } => {
                is_transient_status(*status)
            }
            Self::SignRequest { status, .. } => {
                *status == Some(StatusCode::FORBIDDEN) || is_transient_status(*status)
            }
            _ => false,
        }
    }

    /// Whether the error stems from the issuer configuration rather than the backend.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

fn is_transient_status(status: Option<StatusCode>) -> bool {
    match status {
        None => true,
        Some(code) => code == StatusCode::TOO_MANY_REQUESTS || code.is_server_error(),
    }
}
