//! PEM and X.509 helpers shared by the trust configuration and the response decoder.

use rustls::pki_types::{pem::PemObject, CertificateDer};
use x509_parser::prelude::*;

/// Extract every parsable X.509 certificate from a PEM bundle.
///
/// Non-certificate PEM sections are ignored. Certificate blocks whose DER does not
/// parse as X.509 are skipped. Reading stops at the first malformed PEM section,
/// keeping whatever was collected before it.
pub fn parse_certificate_bundle(pem: &[u8]) -> Vec<CertificateDer<'static>> {
    CertificateDer::pem_slice_iter(pem)
        .map_while(|result| result.ok())
        .filter(|der| X509Certificate::from_der(der.as_ref()).is_ok())
        .collect()
}

/// Check that the first PEM block of `pem` is a certificate that parses as X.509.
///
/// Trailing blocks are not inspected. Returns a human readable reason on failure.
pub fn validate_certificate_pem(pem: &str) -> Result<(), String> {
    let der = match CertificateDer::pem_slice_iter(pem.as_bytes()).next() {
        Some(Ok(der)) => der,
        Some(Err(e)) => return Err(format!("invalid PEM: {}", e)),
        None => return Err("no PEM certificate block found".to_string()),
    };

    X509Certificate::from_der(der.as_ref())
        .map(|_| ())
        .map_err(|e| format!("invalid X.509 certificate: {}", e))
}
