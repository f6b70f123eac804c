//! Gateway client: credential injection, failure taxonomy, expiry signalling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use reqwest::Method;
use verifier_gateway::{
    CredentialVault, ErrorKind, ExpiryListener, GatewayClient, GatewayConfig,
    MemoryCredentialStore, Reachability,
};
use verifier_types::Credential;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{base_url, closed_port_url};

#[derive(Default)]
struct CountingListener(AtomicUsize);

impl ExpiryListener for CountingListener {
    fn session_expired(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn build_client(
    url: url::Url,
) -> (
    GatewayClient,
    Arc<CredentialVault>,
    Arc<MemoryCredentialStore>,
    Arc<CountingListener>,
) {
    let store = Arc::new(MemoryCredentialStore::new());
    let vault = Arc::new(CredentialVault::new(store.clone()));
    let listener = Arc::new(CountingListener::default());
    let client = GatewayClient::new(GatewayConfig::new(url), vault.clone(), listener.clone())
        .expect("client builds");
    (client, vault, store, listener)
}

#[tokio::test]
async fn many_concurrent_401s_expire_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_delay(std::time::Duration::from_millis(30)))
        .expect(10)
        .mount(&server)
        .await;

    let (client, vault, store, listener) = build_client(base_url(&server));
    vault.install(Credential::new("T1").unwrap());
    assert!(store.peek().is_some());

    let results = join_all((0..10).map(|i| {
        let path = format!("api/verify/jobs/j{i}");
        let client = &client;
        async move { client.request(Method::GET, &path, None).await }
    }))
    .await;

    assert!(
        results
            .iter()
            .all(|r| r.as_ref().unwrap_err().kind() == ErrorKind::Unauthorized)
    );
    assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    assert!(vault.current().is_none());
    assert!(store.peek().is_none());
}

#[tokio::test]
async fn every_failure_has_exactly_one_kind() {
    let server = MockServer::start().await;
    Mock::given(path("/validation"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": [{"loc": ["body", "file"], "msg": "field required"}]
        })))
        .mount(&server)
        .await;
    Mock::given(path("/fault"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(path("/teapot"))
        .respond_with(ResponseTemplate::new(418).set_body_string("short and stout"))
        .mount(&server)
        .await;

    let (client, _, _, _) = build_client(base_url(&server));

    let err = client.request(Method::GET, "validation", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.backend_message(), Some("field required"));

    let err = client.request(Method::GET, "fault", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerFault);

    let err = client.request(Method::GET, "teapot", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerFault);

    let (offline, _, _, _) = build_client(closed_port_url());
    let err = offline.request(Method::GET, "health", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    assert!(err.is_network_unreachable());
}

#[tokio::test]
async fn health_probe_distinguishes_closed_port_from_5xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (live, _, _, _) = build_client(base_url(&server));
    assert_eq!(live.health().await, Reachability::Reachable);

    let (offline, _, _, _) = build_client(closed_port_url());
    assert_eq!(offline.health().await, Reachability::Unreachable);
}
