//! # Issuer Configuration
//!
//! Two layers:
//!
//! - [`IssuerSpec`]: the raw, deserializable issuer description as an operator writes
//!   it (YAML/TOML file, environment overrides).
//! - [`IssuerConfig`]: the validated form. The authentication method is resolved once
//!   into an explicit [`AuthStrategy`]; empty or ambiguous auth blocks are rejected here,
//!   before any transport exists.

pub mod settings;
pub mod tls;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::errors::{IssuerError, Result};
use crate::secrets::{SecretRef, DEFAULT_TOKEN_KEY};
use crate::utils::parse_go_duration;

pub use settings::load_issuer_spec;
pub use tls::TransportConfig;

/// Auth mount used for AppRole logins when `path` is left unset.
pub const DEFAULT_APPROLE_PATH: &str = "approle";

/// Raw issuer description.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct IssuerSpec {
    /// Vault server address, e.g. `https://vault.example.com:8200`
    #[validate(url(message = "server must be a valid URL"))]
    pub server: String,

    /// Signing endpoint below `/v1`, e.g. `pki_int/sign/example-dot-com`
    #[validate(length(min = 1, message = "path cannot be empty"))]
    pub path: String,

    /// PEM bundle replacing the system roots when talking to Vault
    #[serde(default)]
    pub ca_bundle: Option<String>,

    /// Vault Enterprise namespace
    #[serde(default)]
    pub vault_namespace: Option<String>,

    /// Per-request timeout in Go duration syntax, e.g. `30s`
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub auth: AuthSpec,
}

/// Authentication block. Exactly one of the fields must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSpec {
    #[serde(default)]
    pub token_secret_ref: Option<SecretKeySelector>,

    #[serde(default)]
    pub app_role: Option<AppRoleSpec>,
}

/// Selects one key of a secret in the issuer's namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,

    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppRoleSpec {
    /// Auth mount path, `approle` when unset
    #[serde(default)]
    pub path: Option<String>,

    pub role_id: String,

    pub secret_ref: SecretKeySelector,
}

/// Resolved authentication method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Pre-issued Vault token read from the secret store
    Token { secret_ref: SecretRef },

    /// Role id / secret id exchanged for a token at `/v1/auth/{auth_path}/login`
    AppRole { role_id: String, secret_ref: SecretRef, auth_path: String },
}

impl AuthStrategy {
    /// Short name used in logs
    pub fn method(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::AppRole { .. } => "approle",
        }
    }

    fn from_spec(namespace: &str, auth: &AuthSpec) -> Result<Self> {
        match (&auth.token_secret_ref, &auth.app_role) {
            (Some(_), Some(_)) => Err(IssuerError::config(
                "ambiguous authentication: both token_secret_ref and app_role are set",
            )),
            (None, None) => Err(IssuerError::config("no authentication method configured")),
            (Some(token), None) => {
                let name = token.name.trim();
                if name.is_empty() {
                    return Err(IssuerError::config("token_secret_ref.name cannot be empty"));
                }

                let key = token
                    .key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .unwrap_or(DEFAULT_TOKEN_KEY);

                Ok(Self::Token { secret_ref: SecretRef::new(namespace, name, key) })
            }
            (None, Some(app_role)) => {
                let role_id = app_role.role_id.trim();
                if role_id.is_empty() {
                    return Err(IssuerError::config("app_role.role_id cannot be empty"));
                }

                let name = app_role.secret_ref.name.trim();
                if name.is_empty() {
                    return Err(IssuerError::config("app_role.secret_ref.name cannot be empty"));
                }

                let key = app_role
                    .secret_ref
                    .key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| IssuerError::config("app_role.secret_ref.key cannot be empty"))?;

                let auth_path = app_role
                    .path
                    .as_deref()
                    .map(|path| path.trim().trim_matches('/'))
                    .filter(|path| !path.is_empty())
                    .unwrap_or(DEFAULT_APPROLE_PATH)
                    .to_string();

                Ok(Self::AppRole {
                    role_id: role_id.to_string(),
                    secret_ref: SecretRef::new(namespace, name, key),
                    auth_path,
                })
            }
        }
    }
}

/// Validated issuer configuration. Read-only once built.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub server: Url,
    pub mount_path: String,
    pub ca_bundle: Option<Vec<u8>>,
    pub vault_namespace: Option<String>,
    pub timeout: Option<Duration>,
    pub auth: AuthStrategy,
}

impl IssuerConfig {
    /// Validate a raw spec. `namespace` is the namespace secret references resolve in.
    pub fn from_spec(namespace: &str, spec: &IssuerSpec) -> Result<Self> {
        spec.validate().map_err(|e| IssuerError::config(e.to_string()))?;

        if namespace.trim().is_empty() {
            return Err(IssuerError::config("issuer namespace cannot be empty"));
        }

        let server = Url::parse(spec.server.trim())
            .map_err(|e| IssuerError::config(format!("invalid Vault server address: {}", e)))?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(IssuerError::config(format!(
                "Vault server address must use http or https, got {:?}",
                server.scheme()
            )));
        }

        let mount_path = spec.path.trim().trim_matches('/').to_string();
        if mount_path.is_empty() {
            return Err(IssuerError::config("path cannot be empty"));
        }

        let timeout = spec.timeout.as_deref().map(parse_go_duration).transpose()?;

        let auth = AuthStrategy::from_spec(namespace.trim(), &spec.auth)?;

        Ok(Self {
            server,
            mount_path,
            ca_bundle: spec
                .ca_bundle
                .as_ref()
                .filter(|bundle| !bundle.trim().is_empty())
                .map(|bundle| bundle.as_bytes().to_vec()),
            vault_namespace: spec
                .vault_namespace
                .as_deref()
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            timeout,
            auth,
        })
    }
}
