use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use vault_issuer::config::IssuerSpec;
use vault_issuer::{CertificateSigner, IssuerError, VaultIssuer, DEFAULT_CERTIFICATE_DURATION};

use super::support::*;

/// Vault served over HTTPS with a certificate issued by its own test CA.
struct TlsVault {
    address: String,
    ca: Arc<TestCertificateAuthority>,
    task: JoinHandle<()>,
}

impl TlsVault {
    async fn start() -> Self {
        let ca = Arc::new(TestCertificateAuthority::new("Vault TLS Test CA"));
        let (chain, key) = ca.issue_server_certificate();

        let provider = rustls::crypto::ring::default_provider();
        let server_config = rustls::ServerConfig::builder_with_provider(provider.into())
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .expect("server certificate");
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind listener");
        let address = format!("https://{}", listener.local_addr().expect("local address"));

        let signer = Arc::clone(&ca);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let signer = Arc::clone(&signer);

                tokio::spawn(async move {
                    // Clients that do not trust the CA abort the handshake
                    let Ok(tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let service = service_fn(move |req| respond(req, Arc::clone(&signer)));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(tls), service)
                        .await;
                });
            }
        });

        Self { address, ca, task }
    }
}

impl Drop for TlsVault {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(
    req: Request<Incoming>,
    ca: Arc<TestCertificateAuthority>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let authorized = req.headers().get("x-vault-token").is_some_and(|value| value == TOKEN);
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    let (status, payload) = match path.as_str() {
        LOGIN_PATH => {
            (StatusCode::OK, json!({ "auth": { "client_token": TOKEN, "lease_duration": 3600 } }))
        }
        SIGN_PATH if authorized => {
            let params: Value = serde_json::from_slice(&body).unwrap_or_default();
            match params["csr"].as_str() {
                Some(csr) => (
                    StatusCode::OK,
                    json!({ "data": {
                        "certificate": ca.sign_csr(csr),
                        "issuing_ca": ca.pem,
                        "ca_chain": [ca.pem],
                    } }),
                ),
                None => (StatusCode::BAD_REQUEST, json!({ "errors": ["missing csr"] })),
            }
        }
        SIGN_PATH => (StatusCode::FORBIDDEN, json!({ "errors": ["permission denied"] })),
        _ => (StatusCode::NOT_FOUND, json!({ "errors": [] })),
    };

    let response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(payload.to_string())))
        .expect("response");
    Ok(response)
}

fn with_bundle(spec: IssuerSpec, bundle: Option<&str>) -> IssuerSpec {
    IssuerSpec { ca_bundle: bundle.map(str::to_string), ..spec }
}

#[tokio::test]
async fn ca_bundle_trusts_vault_certificate() {
    let vault = TlsVault::start().await;
    let spec = with_bundle(app_role_spec(&vault.address), Some(vault.ca.pem.as_str()));

    let issuer = VaultIssuer::from_spec(NAMESPACE, &spec, Arc::new(secret_store())).await.unwrap();

    let csr = generate_csr("tls.example.com", &["tls.example.com"], &[]);
    let signed = issuer.sign(csr.as_bytes(), DEFAULT_CERTIFICATE_DURATION).await.unwrap();

    assert_eq!(chain_public_keys(&signed.chain_pem).len(), 2);
    assert_eq!(signed.ca_pem.as_deref(), Some(vault.ca.pem.trim().as_bytes()));
}

#[tokio::test]
async fn untrusted_certificate_fails_app_role_login() {
    let vault = TlsVault::start().await;

    let err =
        VaultIssuer::from_spec(NAMESPACE, &app_role_spec(&vault.address), Arc::new(secret_store()))
            .await
            .unwrap_err();

    assert!(matches!(err, IssuerError::AuthRequest { status: None, .. }), "{:?}", err);
}

#[tokio::test]
async fn untrusted_certificate_fails_sign_with_token() {
    let vault = TlsVault::start().await;

    // Token strategy makes no request until the first sign
    let issuer =
        VaultIssuer::from_spec(NAMESPACE, &token_spec(&vault.address), Arc::new(secret_store()))
            .await
            .unwrap();

    let csr = generate_csr("tls.example.com", &[], &[]);
    let err = issuer.sign(csr.as_bytes(), DEFAULT_CERTIFICATE_DURATION).await.unwrap_err();

    assert!(matches!(err, IssuerError::SignRequest { status: None, .. }), "{:?}", err);
}

#[tokio::test]
async fn ca_bundle_replaces_built_in_roots() {
    let vault = TlsVault::start().await;
    let unrelated = TestCertificateAuthority::new("Unrelated CA");
    let spec = with_bundle(app_role_spec(&vault.address), Some(unrelated.pem.as_str()));

    let err = VaultIssuer::from_spec(NAMESPACE, &spec, Arc::new(secret_store())).await.unwrap_err();

    assert!(matches!(err, IssuerError::AuthRequest { status: None, .. }), "{:?}", err);
}
