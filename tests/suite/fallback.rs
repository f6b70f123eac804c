//! Demo fallback: simulated sessions never reach the backend.

use std::time::{Duration, Instant};

use verifier_core::{JobStatus, Mode, Reachability, SessionState};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{TEST_LATENCY, closed_port_url, csv, registry_for, session_at};

async fn silent_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn simulated_session_makes_no_network_calls() {
    let server = silent_backend().await;
    let (session, jobs) = registry_for(&server);

    session.fallback().enter_simulated();
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(session.profile().unwrap().plan, "Demo");

    let record = jobs.submit(csv("leads.csv")).await.unwrap();
    assert!(record.id.as_str().starts_with("job-"));
    assert_eq!(record.status, JobStatus::Queued);
    let refreshed = jobs.refresh(&record.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, JobStatus::Processing);

    assert_eq!(session.fallback().probe().await, Reachability::Reachable);
    session.login("someone", "pw").await.unwrap();
    session.register("someone", "pw", None).await.unwrap();
}

#[tokio::test]
async fn simulated_submission_waits_for_latency() {
    let server = silent_backend().await;
    let (session, jobs) = registry_for(&server);
    session.fallback().enter_simulated();

    let started = Instant::now();
    jobs.submit(csv("a.csv")).await.unwrap();
    assert!(started.elapsed() >= TEST_LATENCY);
}

#[tokio::test]
async fn unreachable_login_then_demo_mode() {
    let session = session_at(
        closed_port_url(),
        std::sync::Arc::new(verifier_gateway::MemoryCredentialStore::new()),
    );

    let err = session.login("admin", "pw").await.unwrap_err();
    assert!(err.offers_simulated_mode());
    assert!(session.last_notice().is_some());

    session.fallback().enter_simulated();
    assert_eq!(session.mode(), Mode::Simulated);
    assert!(session.last_notice().is_none());

    session.fallback().exit_simulated();
    assert_eq!(session.mode(), Mode::Live);
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn leaving_demo_mode_mid_submission_drops_the_record() {
    let server = silent_backend().await;
    let (session, jobs) = registry_for(&server);
    session.fallback().enter_simulated();

    let (result, ()) = tokio::join!(jobs.submit(csv("a.csv")), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        session.fallback().exit_simulated();
    });

    assert!(result.is_ok());
    assert!(jobs.is_empty());
}
