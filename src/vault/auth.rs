//! Session establishment for the two supported authentication strategies.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::transport::{check_token_header, describe_error_response, join_paths, VaultTransport};
use crate::config::AuthStrategy;
use crate::errors::{IssuerError, Result};
use crate::secrets::{SecretRef, SecretStore, SecretString};

/// An authenticated Vault session.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    lease_duration: Option<Duration>,
}

impl Session {
    pub fn new(token: SecretString, lease_duration: Option<Duration>) -> Self {
        Self { token, lease_duration }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Token TTL reported by the login response. `None` for pre-issued tokens.
    pub fn lease_duration(&self) -> Option<Duration> {
        self.lease_duration
    }
}

#[derive(Serialize)]
struct AppRoleLoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    auth: Option<LoginAuth>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginAuth {
    #[serde(default)]
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

impl LoginResponse {
    /// `auth.client_token`, falling back to `data.id` for token-creation style responses.
    fn token_id(&self) -> Option<&str> {
        if let Some(auth) = &self.auth {
            if !auth.client_token.is_empty() {
                return Some(&auth.client_token);
            }
        }

        self.data.as_ref()?.get("id")?.as_str().filter(|id| !id.is_empty())
    }

    fn lease_duration(&self) -> Option<Duration> {
        self.auth
            .as_ref()
            .map(|auth| auth.lease_duration)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Resolves credentials through the secret store and turns them into a [`Session`].
#[derive(Debug)]
pub struct Authenticator {
    strategy: AuthStrategy,
    store: Arc<dyn SecretStore>,
}

impl Authenticator {
    pub fn new(strategy: AuthStrategy, store: Arc<dyn SecretStore>) -> Self {
        Self { strategy, store }
    }

    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    /// Establish a session using the configured strategy.
    ///
    /// The token strategy makes no network call. AppRole performs one login request.
    #[instrument(skip(self, transport), fields(method = self.strategy.method()))]
    pub async fn authenticate(&self, transport: &VaultTransport) -> Result<Session> {
        match &self.strategy {
            AuthStrategy::Token { secret_ref } => {
                let token = self.read_trimmed(secret_ref).await?;
                if token.is_empty() {
                    return Err(IssuerError::EmptyToken);
                }
                check_token_header(&token)?;

                debug!(secret = %secret_ref, "Using Vault token from secret store");
                Ok(Session::new(token, None))
            }
            AuthStrategy::AppRole { role_id, secret_ref, auth_path } => {
                let secret_id = self.read_trimmed(secret_ref).await?;
                self.app_role_login(transport, role_id, &secret_id, auth_path).await
            }
        }
    }

    async fn read_trimmed(&self, reference: &SecretRef) -> Result<SecretString> {
        let raw = self.store.get(reference).await?;

        SecretString::from_bytes_trimmed(&raw).ok_or_else(|| {
            IssuerError::secret_lookup(reference.to_string(), "secret value is not valid UTF-8")
        })
    }

    async fn app_role_login(
        &self,
        transport: &VaultTransport,
        role_id: &str,
        secret_id: &SecretString,
        auth_path: &str,
    ) -> Result<Session> {
        let path = join_paths(&["/v1/auth", auth_path, "login"]);
        let body = AppRoleLoginRequest { role_id, secret_id: secret_id.expose_secret() };

        let response = transport
            .post(&path, None)
            .json(&body)
            .send()
            .await
            .map_err(|e| IssuerError::auth_request(e.status(), e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IssuerError::auth_request(Some(status), e.to_string()))?;

        if !status.is_success() {
            return Err(IssuerError::auth_request(
                Some(status),
                describe_error_response(status, &bytes),
            ));
        }

        let login: LoginResponse = serde_json::from_slice(&bytes)
            .map_err(|source| IssuerError::AuthDecode { source })?;

        let token = SecretString::new(login.token_id().ok_or(IssuerError::EmptyToken)?);
        check_token_header(&token)?;
        let session = Session::new(token, login.lease_duration());

        info!(
            auth_path = %auth_path,
            lease_seconds = session.lease_duration().map(|d| d.as_secs()).unwrap_or(0),
            "Logged in to Vault with AppRole"
        );

        Ok(session)
    }
}
