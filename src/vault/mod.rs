//! # Vault Issuer
//!
//! Signs certificate signing requests through a HashiCorp Vault PKI mount.
//!
//! [`VaultIssuer`] is built once per issuer configuration. Construction resolves the
//! trust configuration, builds the HTTP transport and establishes a session; it either
//! succeeds completely or fails, there is no partially usable instance. After that every
//! [`CertificateSigner::sign`] call is a single `POST /v1/{mount_path}`.
//!
//! ## Session lifetime
//!
//! The session token is shared by all concurrent callers. When Vault rejects a sign
//! request with `403 Forbidden`, the call fails as usual and the session is marked
//! stale; the next call authenticates again before sending its request. Nothing is
//! retried within a call.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vault_issuer::secrets::DirectorySecretStore;
//! use vault_issuer::vault::{CertificateSigner, VaultIssuer, DEFAULT_CERTIFICATE_DURATION};
//!
//! let store = Arc::new(DirectorySecretStore::new("/var/run/issuer-secrets"));
//! let issuer = VaultIssuer::from_spec("cert-manager", &spec, store).await?;
//! let signed = issuer.sign(csr_pem, DEFAULT_CERTIFICATE_DURATION).await?;
//! ```

pub mod auth;
pub mod request;
pub mod response;
pub mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::{IssuerConfig, IssuerSpec, TransportConfig};
use crate::errors::{IssuerError, Result};
use crate::secrets::{SecretStore, SecretString};
use crate::utils::format_go_duration;

pub use auth::{Authenticator, Session};
pub use request::{decode_csr, DecodedCsr, SignParameters, SigningRequest};
pub use response::{decode_sign_response, CertificateBundle, SignedCertificate};
pub use transport::VaultTransport;

use transport::describe_error_response;

/// Validity period used when the caller does not request one (90 days).
pub const DEFAULT_CERTIFICATE_DURATION: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const HEALTH_PATH: &str = "/v1/sys/health";

/// Non-2xx codes `sys/health` uses to report node state. They still carry a status body.
const HEALTH_STATE_CODES: [u16; 5] = [429, 472, 473, 501, 503];

/// Signs CSRs. Implemented by [`VaultIssuer`]; mock it to test controllers.
#[async_trait]
pub trait CertificateSigner: Send + Sync {
    /// Sign `csr_pem` for `duration`, returning the PEM chain and the issuing CA.
    async fn sign(&self, csr_pem: &[u8], duration: Duration) -> Result<SignedCertificate>;
}

/// Backend status checks, without exposing the transport.
#[async_trait]
pub trait SystemStatus: Send + Sync {
    async fn health(&self) -> Result<HealthStatus>;
}

/// Decoded `GET /v1/sys/health` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub performance_standby: bool,
    #[serde(default)]
    pub replication_performance_mode: Option<String>,
    #[serde(default)]
    pub replication_dr_mode: Option<String>,
    #[serde(default)]
    pub server_time_utc: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
}

impl HealthStatus {
    /// Initialized and unsealed.
    pub fn is_ready(&self) -> bool {
        self.initialized && !self.sealed
    }
}

/// Vault-backed certificate issuer.
#[derive(Debug)]
pub struct VaultIssuer {
    transport: VaultTransport,
    authenticator: Authenticator,
    sign_path: String,
    session: RwLock<Session>,
    stale: AtomicBool,
}

impl VaultIssuer {
    /// Build the transport and authenticate.
    ///
    /// An unusable CA bundle fails before any credential is read.
    #[instrument(
        skip(config, store),
        fields(server = %config.server, method = config.auth.method())
    )]
    pub async fn connect(config: IssuerConfig, store: Arc<dyn SecretStore>) -> Result<Self> {
        let transport_config = TransportConfig::build(&config)?;
        let transport = VaultTransport::new(&transport_config)?;

        let authenticator = Authenticator::new(config.auth, store);
        let session = authenticator.authenticate(&transport).await?;

        info!(
            mount_path = %config.mount_path,
            custom_roots = transport_config.uses_custom_roots(),
            namespace = config.vault_namespace.as_deref().unwrap_or(""),
            "Vault issuer ready"
        );

        Ok(Self {
            transport,
            authenticator,
            sign_path: request::sign_path(&config.mount_path),
            session: RwLock::new(session),
            stale: AtomicBool::new(false),
        })
    }

    /// Validate `spec` for `namespace` and connect.
    pub async fn from_spec(
        namespace: &str,
        spec: &IssuerSpec,
        store: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let config = IssuerConfig::from_spec(namespace, spec)?;
        Self::connect(config, store).await
    }

    pub fn address(&self) -> &Url {
        self.transport.address()
    }

    /// API path sign requests are posted to
    pub fn sign_path(&self) -> &str {
        &self.sign_path
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Token for the next request, authenticating again first if the session went stale.
    async fn current_token(&self) -> Result<SecretString> {
        if !self.stale.load(Ordering::Acquire) {
            return Ok(self.session.read().await.token().clone());
        }

        let mut session = self.session.write().await;

        // Another caller may have refreshed while this one waited for the lock
        if self.stale.load(Ordering::Acquire) {
            *session = self.authenticator.authenticate(&self.transport).await?;
            self.stale.store(false, Ordering::Release);
            info!(method = self.authenticator.strategy().method(), "Re-authenticated to Vault");
        }

        Ok(session.token().clone())
    }
}

#[async_trait]
impl CertificateSigner for VaultIssuer {
    #[instrument(
        skip(self, csr_pem),
        fields(
            request_id = %Uuid::new_v4(),
            path = %self.sign_path,
            ttl = %format_go_duration(duration)
        )
    )]
    async fn sign(&self, csr_pem: &[u8], duration: Duration) -> Result<SignedCertificate> {
        let request = SigningRequest::new(csr_pem, duration)?;
        let token = self.current_token().await?;

        let response = self
            .transport
            .post(&self.sign_path, Some(&token))
            .json(&request.parameters())
            .send()
            .await
            .map_err(|e| IssuerError::sign_request(e.status(), e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| IssuerError::sign_request(Some(status), e.to_string()))?;

        if !status.is_success() {
            if status == StatusCode::FORBIDDEN {
                self.stale.store(true, Ordering::Release);
                debug!("Vault rejected the session token, will re-authenticate");
            }
            return Err(IssuerError::sign_request(
                Some(status),
                describe_error_response(status, &body),
            ));
        }

        let bundle = decode_sign_response(&body)?;

        info!(
            common_name = %request.csr().common_name,
            serial_number = bundle.serial_number.as_deref().unwrap_or(""),
            chain_length = bundle.ca_chain.len(),
            "Certificate signed by Vault"
        );

        Ok(SignedCertificate::from(&bundle))
    }
}

#[async_trait]
impl SystemStatus for VaultIssuer {
    #[instrument(skip(self))]
    async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .transport
            .get(HEALTH_PATH, None)
            .send()
            .await
            .map_err(|e| IssuerError::status_request(e.status(), e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| IssuerError::status_request(Some(status), e.to_string()))?;

        if !status.is_success() && !HEALTH_STATE_CODES.contains(&status.as_u16()) {
            return Err(IssuerError::status_request(
                Some(status),
                describe_error_response(status, &body),
            ));
        }

        let health: HealthStatus = serde_json::from_slice(&body).map_err(|e| {
            IssuerError::status_request(Some(status), format!("invalid health response: {}", e))
        })?;

        debug!(
            http_status = status.as_u16(),
            sealed = health.sealed,
            standby = health.standby,
            "Vault health"
        );

        Ok(health)
    }
}
