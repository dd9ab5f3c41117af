//! # vault-issuer
//!
//! A certificate issuer that delegates signing to a HashiCorp Vault PKI backend.
//! Given a PEM encoded CSR and a validity period it returns the signed certificate
//! chain and the issuing CA. It never signs anything itself.
//!
//! ## Architecture
//!
//! ```text
//! IssuerSpec → IssuerConfig → TransportConfig → VaultTransport
//!                    ↓                               ↓
//!              AuthStrategy → Authenticator → Session (X-Vault-Token)
//!                                                    ↓
//!        CSR → SigningRequest → POST /v1/{mount} → CertificateBundle
//! ```
//!
//! ## Core Components
//!
//! - **Configuration** ([`config`]): raw issuer spec, its validated form, and the
//!   trust configuration for the HTTP client
//! - **Secrets** ([`secrets`]): lookup of tokens and AppRole secret ids
//! - **Vault** ([`vault`]): authentication, request shaping, response decoding and the
//!   [`VaultIssuer`] facade
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_issuer::{
//!     config::{AuthSpec, IssuerSpec, SecretKeySelector},
//!     secrets::InMemorySecretStore,
//!     CertificateSigner, Result, VaultIssuer, DEFAULT_CERTIFICATE_DURATION,
//! };
//!
//! async fn issue(csr_pem: &[u8]) -> Result<Vec<u8>> {
//!     let spec = IssuerSpec {
//!         server: "https://vault.example.com:8200".to_string(),
//!         path: "pki_int/sign/example-dot-com".to_string(),
//!         auth: AuthSpec {
//!             token_secret_ref: Some(SecretKeySelector { name: "vault-token".to_string(), key: None }),
//!             app_role: None,
//!         },
//!         ..Default::default()
//!     };
//!     let store = InMemorySecretStore::new().with_secret("default", "vault-token", "token", "s.abc");
//!
//!     let issuer = VaultIssuer::from_spec("default", &spec, Arc::new(store)).await?;
//!     let signed = issuer.sign(csr_pem, DEFAULT_CERTIFICATE_DURATION).await?;
//!     Ok(signed.chain_pem)
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod utils;
pub mod vault;

// Re-export commonly used types and traits
pub use config::{AuthStrategy, IssuerConfig, IssuerSpec};
pub use errors::{IssuerError, Result};
pub use secrets::{SecretRef, SecretStore};
pub use vault::{
    CertificateSigner, HealthStatus, SignedCertificate, SystemStatus, VaultIssuer,
    DEFAULT_CERTIFICATE_DURATION,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
