//! Decoding of the Vault PKI sign response into a certificate chain.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::{IssuerError, Result};
use crate::utils::validate_certificate_pem;

/// Vault secret envelope. Only the fields the issuer reads are modelled.
#[derive(Debug, Default, Deserialize)]
struct SecretEnvelope {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    data: Option<PkiData>,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PkiData {
    #[serde(default)]
    certificate: Option<String>,
    #[serde(default)]
    issuing_ca: Option<String>,
    #[serde(default)]
    ca_chain: Option<Vec<String>>,
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    expiration: Option<Value>,
}

/// Leaf certificate plus its issuing chain, as returned by Vault.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// PEM encoded leaf certificate
    pub certificate: String,
    /// PEM encoded issuers, immediate issuer first
    pub ca_chain: Vec<String>,
    pub serial_number: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("certificate", &format!("[{} bytes PEM]", self.certificate.len()))
            .field("ca_chain", &format!("[{} certificates]", self.ca_chain.len()))
            .field("serial_number", &self.serial_number)
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl CertificateBundle {
    /// Leaf followed by every chain entry, newline separated.
    pub fn to_pem_chain(&self) -> String {
        std::iter::once(self.certificate.as_str())
            .chain(self.ca_chain.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The immediate issuer, if Vault returned one.
    pub fn issuing_ca(&self) -> Option<&str> {
        self.ca_chain.first().map(String::as_str)
    }
}

/// Output of a successful sign call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    /// Leaf followed by the CA chain, PEM encoded
    pub chain_pem: Vec<u8>,
    /// First CA chain entry. `None` when Vault returned no chain
    pub ca_pem: Option<Vec<u8>>,
}

impl From<&CertificateBundle> for SignedCertificate {
    fn from(bundle: &CertificateBundle) -> Self {
        Self {
            chain_pem: bundle.to_pem_chain().into_bytes(),
            ca_pem: bundle.issuing_ca().map(|ca| ca.as_bytes().to_vec()),
        }
    }
}

/// Decode a sign response body.
///
/// `ca_chain` takes precedence over `issuing_ca`; when both are absent the chain
/// is empty, which is not an error.
pub fn decode_sign_response(body: &[u8]) -> Result<CertificateBundle> {
    let envelope: SecretEnvelope =
        serde_json::from_slice(body).map_err(|source| IssuerError::ResponseDecode { source })?;

    for warning in envelope.warnings.iter().flatten() {
        warn!(request_id = %envelope.request_id, warning = %warning, "Vault returned a warning");
    }

    let data = envelope
        .data
        .ok_or_else(|| IssuerError::bundle_parse("response contains no data"))?;

    let certificate = data
        .certificate
        .as_deref()
        .map(str::trim)
        .filter(|pem| !pem.is_empty())
        .ok_or_else(|| IssuerError::bundle_parse("response contains no certificate"))?;
    validate_certificate_pem(certificate)
        .map_err(|e| IssuerError::bundle_parse(format!("certificate: {}", e)))?;

    let chain_entries: Vec<String> = match data.ca_chain.filter(|chain| !chain.is_empty()) {
        Some(chain) => chain,
        None => data.issuing_ca.into_iter().collect(),
    };

    let mut ca_chain = Vec::with_capacity(chain_entries.len());
    for (index, entry) in chain_entries.iter().enumerate() {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        validate_certificate_pem(entry)
            .map_err(|e| IssuerError::bundle_parse(format!("CA chain entry {}: {}", index, e)))?;
        ca_chain.push(entry.to_string());
    }

    let expiration = data
        .expiration
        .as_ref()
        .and_then(expiration_seconds)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(CertificateBundle {
        certificate: certificate.to_string(),
        ca_chain,
        serial_number: data.serial_number.filter(|serial| !serial.is_empty()),
        expiration,
    })
}

/// Vault reports `expiration` as Unix seconds, usually a number.
fn expiration_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
