//! Session manager: two-step login, rollback, restore, logout.

use std::sync::Arc;

use serde_json::json;
use std::time::Duration;

use verifier_core::{ErrorKind, JobRegistry, LoginError, NoticeKind, SessionState};
use verifier_gateway::{CredentialStore, MemoryCredentialStore};
use verifier_types::Credential;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    base_url, csv, mount_login, mount_profile, mount_upload, session_at, session_for,
};

#[tokio::test]
async fn profile_401_after_login_leaves_no_trace() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let (session, store) = session_for(&server);

    let err = session.login("admin", "pw").await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(session.profile().is_none());
    assert!(store.peek().is_none());
    assert!(session.gateway().vault().current().is_none());
}

#[tokio::test]
async fn persisted_credential_round_trips_across_restart() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    mount_profile(&server, "T1", "admin", "Pro").await;

    let store = Arc::new(MemoryCredentialStore::new());
    let first = session_at(base_url(&server), store.clone());
    let profile = first.login("admin", "pw").await.unwrap();
    drop(first);

    // Fresh process, same storage. No login request this time.
    let second = session_at(base_url(&server), store.clone());
    let restored = second.restore().await.unwrap().unwrap();

    assert_eq!(restored, profile);
    assert_eq!(second.state(), SessionState::Authenticated);
    let logins = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/auth/login/")
        .count();
    assert_eq!(logins, 1);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    mount_profile(&server, "T1", "admin", "Pro").await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("access_token");

    let build = || {
        verifier_core::SessionManager::new(
            verifier_gateway::GatewayConfig::new(base_url(&server)),
            Arc::new(verifier_gateway::FileCredentialStore::new(token_path.clone())),
            std::time::Duration::ZERO,
        )
        .unwrap()
    };

    build().login("admin", "pw").await.unwrap();
    assert_eq!(std::fs::read_to_string(&token_path).unwrap(), "T1");

    let restarted = build();
    assert!(restarted.restore().await.unwrap().is_some());

    restarted.logout();
    assert!(!token_path.exists());
}

#[tokio::test]
async fn stale_persisted_credential_is_discarded_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryCredentialStore::with_credential(
        Credential::new("OLD").unwrap(),
    ));
    let session = session_at(base_url(&server), store.clone());

    assert!(session.restore().await.is_err());
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn logout_twice_equals_logout_once() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    mount_profile(&server, "T1", "admin", "Pro").await;
    let (session, store) = session_for(&server);
    session.login("admin", "pw").await.unwrap();

    session.logout();
    let once = session.snapshot();
    session.logout();

    assert_eq!(session.snapshot(), once);
    assert_eq!(once.state, SessionState::Anonymous);
    assert!(store.peek().is_none());
}

#[tokio::test]
async fn newer_login_supersedes_older_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(wiremock::matchers::body_json(json!({"username": "slow", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "SLOW"}))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_login(&server, "fast", "pw", "FAST").await;
    mount_profile(&server, "SLOW", "slow", "Free").await;
    mount_profile(&server, "FAST", "fast", "Pro").await;
    let (session, store) = session_for(&server);

    let (slow, fast) = tokio::join!(session.login("slow", "pw"), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        session.login("fast", "pw").await
    });

    assert_eq!(slow.unwrap_err(), LoginError::Superseded);
    assert_eq!(fast.unwrap().username, "fast");
    assert_eq!(session.profile().unwrap().username, "fast");
    assert_eq!(store.peek(), Some(Credential::new("FAST").unwrap()));
}

#[tokio::test]
async fn expiry_during_authenticated_session_sets_notice() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    mount_profile(&server, "T1", "admin", "Pro").await;
    Mock::given(method("POST"))
        .and(path("/api/verify/upload"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let (session, store) = session_for(&server);
    session.login("admin", "pw").await.unwrap();

    let err = session
        .gateway()
        .upload(&crate::common::csv("a.csv"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(store.peek().is_none());
    assert_eq!(session.last_notice().unwrap().kind, NoticeKind::SessionExpired);
}

#[tokio::test]
async fn concurrent_401s_expire_the_session_once() {
    let server = MockServer::start().await;
    mount_login(&server, "admin", "pw", "T1").await;
    mount_profile(&server, "T1", "admin", "Pro").await;
    for (name, id) in [("a.csv", "j1"), ("b.csv", "j2"), ("c.csv", "j3")] {
        mount_upload(&server, name, id, Duration::ZERO).await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/verify/jobs/j\d$"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Token expired"}))
                .set_delay(Duration::from_millis(30)),
        )
        .expect(3)
        .mount(&server)
        .await;
    let (session, store) = session_for(&server);
    session.login("admin", "pw").await.unwrap();
    let jobs = JobRegistry::new(session.clone());
    let mut ids = Vec::new();
    for name in ["a.csv", "b.csv", "c.csv"] {
        ids.push(jobs.submit(csv(name)).await.unwrap().id);
    }
    assert_eq!(jobs.len(), 3);

    let (a, b, c) = tokio::join!(
        jobs.refresh(&ids[0]),
        jobs.refresh(&ids[1]),
        jobs.refresh(&ids[2]),
    );

    for result in [a, b, c] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(session.last_notice().unwrap().kind, NoticeKind::SessionExpired);
    assert!(store.peek().is_none());
    assert!(jobs.is_empty());
}
