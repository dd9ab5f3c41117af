use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use vault_issuer::{IssuerError, SystemStatus, VaultIssuer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use super::support::*;

const HEALTH_PATH: &str = "/v1/sys/health";

async fn mount_health(vault: &MockVault, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&vault.server)
        .await;
}

async fn issuer(vault: &MockVault) -> VaultIssuer {
    VaultIssuer::from_spec(NAMESPACE, &token_spec(&vault.uri()), Arc::new(secret_store()))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_active_node() {
    let vault = MockVault::start().await;
    mount_health(
        &vault,
        200,
        json!({
            "initialized": true,
            "sealed": false,
            "standby": false,
            "performance_standby": false,
            "replication_performance_mode": "disabled",
            "replication_dr_mode": "disabled",
            "server_time_utc": 1_700_000_000,
            "version": "1.15.2",
            "cluster_name": "vault-cluster-a1b2c3",
            "cluster_id": "5f6b0d0c-1a2b-3c4d-5e6f-7a8b9c0d1e2f"
        }),
    )
    .await;

    let health = issuer(&vault).await.health().await.unwrap();

    assert!(health.is_ready());
    assert_eq!(health.version.as_deref(), Some("1.15.2"));
    assert_eq!(health.cluster_name.as_deref(), Some("vault-cluster-a1b2c3"));
}

#[tokio::test]
async fn health_decodes_sealed_status() {
    let vault = MockVault::start().await;
    mount_health(
        &vault,
        503,
        json!({ "initialized": true, "sealed": true, "standby": true, "version": "1.15.2" }),
    )
    .await;

    let health = issuer(&vault).await.health().await.unwrap();

    assert!(health.sealed);
    assert!(!health.is_ready());
}

#[tokio::test]
async fn health_decodes_standby_status() {
    let vault = MockVault::start().await;
    mount_health(&vault, 429, json!({ "initialized": true, "sealed": false, "standby": true }))
        .await;

    let health = issuer(&vault).await.health().await.unwrap();

    assert!(health.standby);
    assert!(health.is_ready());
}

#[tokio::test]
async fn health_server_error_is_status_error() {
    let vault = MockVault::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(vault_error(500, "internal error"))
        .mount(&vault.server)
        .await;

    let err = issuer(&vault).await.health().await.unwrap_err();

    assert!(matches!(err, IssuerError::StatusRequest { .. }), "{:?}", err);
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(err.is_transient());
}

#[tokio::test]
async fn health_through_capability_trait() {
    let vault = MockVault::start().await;
    mount_health(&vault, 200, json!({ "initialized": true, "sealed": false })).await;

    let status: Arc<dyn SystemStatus> = Arc::new(issuer(&vault).await);
    assert!(status.health().await.unwrap().is_ready());
}
