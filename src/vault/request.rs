//! Translation of a CSR plus validity period into Vault PKI sign parameters.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use serde::Serialize;
use x509_parser::der_parser::asn1_rs::{Any, Tag};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use super::transport::join_paths;
use crate::errors::{IssuerError, Result};
use crate::utils::format_go_duration;

const CSR_PEM_LABELS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// The parts of a CSR Vault needs to see as explicit parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCsr {
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    /// DER encoded SubjectPublicKeyInfo
    pub public_key: Vec<u8>,
}

/// Decode a PEM encoded PKCS#10 request.
pub fn decode_csr(pem: &[u8]) -> Result<DecodedCsr> {
    let (_, block) =
        parse_x509_pem(pem).map_err(|e| IssuerError::csr_decode(format!("invalid PEM: {}", e)))?;

    if !CSR_PEM_LABELS.contains(&block.label.as_str()) {
        return Err(IssuerError::csr_decode(format!(
            "unexpected PEM block type {:?}",
            block.label
        )));
    }

    let (_, csr) = X509CertificationRequest::from_der(&block.contents)
        .map_err(|e| IssuerError::csr_decode(format!("invalid certificate request: {}", e)))?;

    let info = &csr.certification_request_info;

    let common_name = subject_common_name(&info.subject)?;

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();

    for extension in csr.requested_extensions().into_iter().flatten() {
        if let ParsedExtension::SubjectAlternativeName(san) = extension {
            for name in &san.general_names {
                match name {
                    GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        let ip = ip_from_bytes(bytes).ok_or_else(|| {
                            IssuerError::csr_decode(format!(
                                "invalid IP address SAN of {} bytes",
                                bytes.len()
                            ))
                        })?;
                        ip_addresses.push(ip);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(DecodedCsr {
        common_name,
        dns_names,
        ip_addresses,
        public_key: info.subject_pki.raw.to_vec(),
    })
}

/// Subject common name. When several CN attributes are present the last one wins.
fn subject_common_name(subject: &X509Name<'_>) -> Result<String> {
    match subject.iter_common_name().last() {
        Some(attribute) => directory_string(attribute.attr_value()).ok_or_else(|| {
            IssuerError::csr_decode(format!(
                "invalid common name of type {:?}",
                attribute.attr_value().tag()
            ))
        }),
        None => Ok(String::new()),
    }
}

/// Text of a DirectoryString style value, including the UTF-16 and UTF-32 encodings.
fn directory_string(value: &Any<'_>) -> Option<String> {
    let data = value.data;

    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::NumericString
        | Tag::VisibleString
        | Tag::TeletexString => std::str::from_utf8(data).ok().map(str::to_owned),
        Tag::BmpString => {
            if data.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> =
                data.chunks_exact(2).map(|unit| u16::from_be_bytes([unit[0], unit[1]])).collect();
            String::from_utf16(&units).ok()
        }
        Tag::UniversalString => {
            if data.len() % 4 != 0 {
                return None;
            }
            data.chunks_exact(4)
                .map(|c| char::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect()
        }
        _ => None,
    }
}

/// IPv4-mapped IPv6 addresses are reported in dotted form.
fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }

    let v6 = Ipv6Addr::from(<[u8; 16]>::try_from(bytes).ok()?);
    Some(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}

/// JSON body of `POST /v1/{mount_path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignParameters {
    pub common_name: String,
    pub alt_names: String,
    pub ip_sans: String,
    pub ttl: String,
    pub csr: String,
    pub exclude_cn_from_sans: String,
}

/// A decoded CSR together with the requested validity period.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    csr: DecodedCsr,
    csr_pem: String,
    duration: Duration,
}

impl SigningRequest {
    pub fn new(csr_pem: &[u8], duration: Duration) -> Result<Self> {
        let csr = decode_csr(csr_pem)?;
        let csr_pem = String::from_utf8(csr_pem.to_vec())
            .map_err(|_| IssuerError::csr_decode("CSR PEM is not valid UTF-8"))?;

        Ok(Self { csr, csr_pem, duration })
    }

    pub fn csr(&self) -> &DecodedCsr {
        &self.csr
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn parameters(&self) -> SignParameters {
        let ip_sans: Vec<String> = self.csr.ip_addresses.iter().map(IpAddr::to_string).collect();

        SignParameters {
            common_name: self.csr.common_name.clone(),
            alt_names: self.csr.dns_names.join(","),
            ip_sans: ip_sans.join(","),
            ttl: format_go_duration(self.duration),
            csr: self.csr_pem.clone(),
            exclude_cn_from_sans: "true".to_string(),
        }
    }
}

/// API path of the signing endpoint for a mount path such as `pki/sign/web`.
pub fn sign_path(mount_path: &str) -> String {
    join_paths(&["/v1", mount_path])
}
