use std::time::Duration;

use rustls::pki_types::CertificateDer;
use url::Url;

use super::IssuerConfig;
use crate::errors::{IssuerError, Result};
use crate::utils::parse_certificate_bundle;

/// Connection settings for the Vault transport, derived from an [`IssuerConfig`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub address: Url,
    /// Replaces the platform roots when set
    pub root_certificates: Option<Vec<CertificateDer<'static>>>,
    pub namespace: Option<String>,
    pub timeout: Option<Duration>,
}

impl TransportConfig {
    /// Build the transport settings.
    ///
    /// A configured CA bundle must contain at least one parsable certificate,
    /// otherwise the whole issuer is rejected before any request is made.
    pub fn build(config: &IssuerConfig) -> Result<Self> {
        let root_certificates = match config.ca_bundle.as_deref() {
            Some(bundle) => {
                let certificates = parse_certificate_bundle(bundle);
                if certificates.is_empty() {
                    return Err(IssuerError::config("error loading Vault CA bundle"));
                }
                Some(certificates)
            }
            None => None,
        };

        Ok(Self {
            address: config.server.clone(),
            root_certificates,
            namespace: config.vault_namespace.clone(),
            timeout: config.timeout,
        })
    }

    pub fn uses_custom_roots(&self) -> bool {
        self.root_certificates.is_some()
    }
}
