//! Shared fixtures: an rcgen certificate authority, a wiremock Vault that signs the
//! CSRs it receives with that CA, and a secret store that counts lookups.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde_json::{json, Value};
use vault_issuer::config::{AppRoleSpec, AuthSpec, IssuerSpec, SecretKeySelector};
use vault_issuer::secrets::{InMemorySecretStore, SecretRef, SecretStore};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use zeroize::Zeroizing;

pub const NAMESPACE: &str = "cert-manager";
pub const MOUNT_PATH: &str = "pki_int/sign/example-dot-com";
pub const SIGN_PATH: &str = "/v1/pki_int/sign/example-dot-com";
pub const LOGIN_PATH: &str = "/v1/auth/approle/login";
pub const TOKEN: &str = "s.test-token";
pub const ROLE_ID: &str = "role-123";
pub const SECRET_ID: &str = "secret-456";

/// Self-signed CA that plays Vault's issuing CA.
pub struct TestCertificateAuthority {
    key: KeyPair,
    cert: rcgen::Certificate,
    pub pem: String,
}

impl TestCertificateAuthority {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().expect("generate CA key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let cert = params.self_signed(&key).expect("self-sign CA");
        let pem = cert.pem();

        Self { key, cert, pem }
    }

    /// Issue a leaf certificate for a PEM encoded CSR.
    pub fn sign_csr(&self, csr_pem: &str) -> String {
        let csr = CertificateSigningRequestParams::from_pem(csr_pem).expect("parse CSR");
        csr.signed_by(&self.cert, &self.key).expect("sign CSR").pem()
    }

    /// Server certificate for `localhost` and 127.0.0.1 with its PKCS#8 key.
    pub fn issue_server_certificate(
        &self,
    ) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        let key = KeyPair::generate().expect("generate server key");
        let mut params =
            CertificateParams::new(vec!["localhost".to_string()]).expect("server params");
        params.distinguished_name.push(DnType::CommonName, "vault.test");
        params.subject_alt_names.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));

        let cert = params.signed_by(&key, &self.cert, &self.key).expect("sign server certificate");
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));

        (vec![cert.der().clone()], key_der)
    }
}

/// Generate a CSR with the given subject and SANs.
pub fn generate_csr(common_name: &str, dns_names: &[&str], ips: &[IpAddr]) -> String {
    let key = KeyPair::generate().expect("generate key");
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);

    for name in dns_names {
        params.subject_alt_names.push(SanType::DnsName((*name).try_into().expect("DNS name")));
    }
    for ip in ips {
        params.subject_alt_names.push(SanType::IpAddress(*ip));
    }

    params.serialize_request(&key).expect("serialize CSR").pem().expect("CSR PEM")
}

/// Which CA fields the mock puts in the sign response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// `issuing_ca` and `ca_chain`
    Full,
    /// `issuing_ca` only
    IssuingCaOnly,
    /// Neither
    Empty,
}

/// wiremock Vault with a signing endpoint backed by a [`TestCertificateAuthority`].
pub struct MockVault {
    pub server: MockServer,
    pub ca: Arc<TestCertificateAuthority>,
}

impl MockVault {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            ca: Arc::new(TestCertificateAuthority::new("Vault Test Intermediate CA")),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Sign endpoint that only accepts [`TOKEN`].
    pub async fn mount_sign(&self, mode: ChainMode) {
        let ca = Arc::clone(&self.ca);

        Mock::given(method("POST"))
            .and(path(SIGN_PATH))
            .and(header("X-Vault-Token", TOKEN))
            .respond_with(move |req: &Request| {
                let params: Value = match serde_json::from_slice(&req.body) {
                    Ok(params) => params,
                    Err(_) => return vault_error(400, "failed to parse JSON input"),
                };
                let Some(csr) = params["csr"].as_str() else {
                    return vault_error(400, "missing csr");
                };

                let leaf = ca.sign_csr(csr);
                let mut data = json!({
                    "certificate": leaf,
                    "serial_number": "7f:00:00:01",
                    "expiration": chrono::Utc::now().timestamp() + 3600,
                });
                match mode {
                    ChainMode::Full => {
                        data["issuing_ca"] = json!(ca.pem);
                        data["ca_chain"] = json!([ca.pem]);
                    }
                    ChainMode::IssuingCaOnly => data["issuing_ca"] = json!(ca.pem),
                    ChainMode::Empty => {}
                }

                ResponseTemplate::new(200).set_body_json(json!({
                    "request_id": "8a6f3c1e",
                    "lease_id": "",
                    "renewable": false,
                    "data": data,
                    "warnings": null
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// AppRole login endpoint for [`ROLE_ID`]/[`SECRET_ID`] returning `token`.
    pub async fn mount_login(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(wiremock::matchers::body_json(json!({
                "role_id": ROLE_ID,
                "secret_id": SECRET_ID
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {
                    "client_token": token,
                    "lease_duration": 3600,
                    "renewable": true
                }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn requests_to(&self, request_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| req.url.path() == request_path)
            .collect()
    }

    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.unwrap_or_default().len()
    }
}

/// Vault style `{"errors": [...]}` response.
pub fn vault_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] }))
}

pub fn token_spec(server: &str) -> IssuerSpec {
    IssuerSpec {
        server: server.to_string(),
        path: MOUNT_PATH.to_string(),
        auth: AuthSpec {
            token_secret_ref: Some(SecretKeySelector {
                name: "vault-token".to_string(),
                key: None,
            }),
            app_role: None,
        },
        ..Default::default()
    }
}

pub fn app_role_spec(server: &str) -> IssuerSpec {
    IssuerSpec {
        auth: AuthSpec {
            token_secret_ref: None,
            app_role: Some(AppRoleSpec {
                path: None,
                role_id: ROLE_ID.to_string(),
                secret_ref: SecretKeySelector {
                    name: "vault-approle".to_string(),
                    key: Some("secretId".to_string()),
                },
            }),
        },
        ..token_spec(server)
    }
}

/// Store holding both the token secret and the AppRole secret id.
pub fn secret_store() -> CountingSecretStore {
    CountingSecretStore::new(
        InMemorySecretStore::new()
            .with_secret(NAMESPACE, "vault-token", "token", TOKEN)
            .with_secret(NAMESPACE, "vault-approle", "secretId", SECRET_ID),
    )
}

/// Secret store wrapper that records how often it was queried.
#[derive(Debug)]
pub struct CountingSecretStore {
    inner: InMemorySecretStore,
    lookups: AtomicUsize,
}

impl CountingSecretStore {
    pub fn new(inner: InMemorySecretStore) -> Self {
        Self { inner, lookups: AtomicUsize::new(0) }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for CountingSecretStore {
    async fn get(&self, reference: &SecretRef) -> vault_issuer::Result<Zeroizing<Vec<u8>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(reference).await
    }
}

/// DER SubjectPublicKeyInfo of every certificate in a PEM chain, leaf first.
pub fn chain_public_keys(chain_pem: &[u8]) -> Vec<Vec<u8>> {
    x509_parser::pem::Pem::iter_from_buffer(chain_pem)
        .map(|pem| {
            let pem = pem.expect("PEM block");
            let cert = pem.parse_x509().expect("X.509 certificate");
            cert.public_key().raw.to_vec()
        })
        .collect()
}
