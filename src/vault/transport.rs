//! HTTP plumbing shared by login, signing and status calls.
//!
//! Built once from a [`TransportConfig`] and never mutated afterwards.

use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::TransportConfig;
use crate::errors::{IssuerError, Result};
use crate::secrets::SecretString;

/// Header carrying the session token
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Header carrying the Vault Enterprise namespace
pub const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Largest slice of a non-JSON error body quoted in error messages
const MAX_RAW_ERROR_LEN: usize = 512;

/// Immutable HTTP client bound to one Vault server.
#[derive(Debug, Clone)]
pub struct VaultTransport {
    client: Client,
    address: Url,
    namespace: Option<HeaderValue>,
}

impl VaultTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("vault-issuer/", env!("CARGO_PKG_VERSION")));

        if let Some(roots) = &config.root_certificates {
            builder = builder.tls_built_in_root_certs(false);
            for der in roots {
                let certificate = reqwest::Certificate::from_der(der.as_ref()).map_err(|e| {
                    IssuerError::config(format!("error loading Vault CA bundle: {}", e))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| IssuerError::config(format!("failed to build Vault HTTP client: {}", e)))?;

        let namespace = config
            .namespace
            .as_deref()
            .map(|namespace| {
                HeaderValue::from_str(namespace).map_err(|_| {
                    IssuerError::config(format!(
                        "Vault namespace {:?} is not a valid {} header value",
                        namespace, NAMESPACE_HEADER
                    ))
                })
            })
            .transpose()?;

        Ok(Self { client, address: config.address.clone(), namespace })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Resolve an API path against the server address.
    ///
    /// The address path and `path` are joined and cleaned like a POSIX path, so
    /// `https://vault/prefix` + `/v1/pki/../pki/sign/web` becomes
    /// `https://vault/prefix/v1/pki/sign/web`.
    pub fn url(&self, path: &str) -> Url {
        let mut url = self.address.clone();
        url.set_path(&join_paths(&[self.address.path(), path]));
        url
    }

    /// Build a GET request, authenticated when a token is given.
    pub fn get(&self, path: &str, token: Option<&SecretString>) -> RequestBuilder {
        let url = self.url(path);
        debug!(url = %url, "GET");
        self.decorate(self.client.get(url), token)
    }

    /// Build a POST request, authenticated when a token is given.
    pub fn post(&self, path: &str, token: Option<&SecretString>) -> RequestBuilder {
        let url = self.url(path);
        debug!(url = %url, "POST");
        self.decorate(self.client.post(url), token)
    }

    fn decorate(&self, request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
        let request = match &self.namespace {
            Some(namespace) => request.header(NAMESPACE_HEADER, namespace.clone()),
            None => request,
        };

        match token {
            Some(token) => request.header(TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }
}

/// Check that a token can be sent in the token header.
///
/// The value itself never appears in the error.
pub fn check_token_header(token: &SecretString) -> Result<()> {
    HeaderValue::from_str(token.expose_secret()).map(|_| ()).map_err(|_| {
        IssuerError::config(format!(
            "Vault token contains characters not allowed in the {} header",
            TOKEN_HEADER
        ))
    })
}

/// Join path segments with `/` and clean the result: empty and `.` elements are
/// dropped, `..` removes the previous element and never climbs above the root.
/// The result is always rooted and has no trailing slash.
pub fn join_paths(segments: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for element in segments.iter().flat_map(|segment| segment.split('/')) {
        match element {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("/{}", parts.join("/"))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<String>,
}

/// Human readable description of a failed Vault response.
///
/// Vault reports failures as `{"errors": [...]}`; those messages are quoted
/// verbatim. Other bodies are quoted raw, truncated.
pub fn describe_error_response(status: StatusCode, body: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        if !envelope.errors.is_empty() {
            return format!("Code: {}. Errors: {}", status.as_u16(), envelope.errors.join("; "));
        }
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if raw.is_empty() {
        return format!("Code: {}", status.as_u16());
    }

    let quoted: String = raw.chars().take(MAX_RAW_ERROR_LEN).collect();
    format!("Code: {}. Raw Message: {}", status.as_u16(), quoted)
}
