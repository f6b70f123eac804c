//! Job registry: ordering, failure isolation, session scoping.

use std::time::Duration;

use serde_json::json;
use verifier_core::{ErrorKind, JobId, JobStatus, upload_failure_message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{closed_port_url, csv, mount_upload, registry_for, session_at};

#[tokio::test]
async fn concurrent_submissions_land_in_completion_order() {
    let server = MockServer::start().await;
    // a.csv is submitted first but completes last.
    mount_upload(&server, "a.csv", "j2", Duration::from_millis(250)).await;
    mount_upload(&server, "b.csv", "j1", Duration::from_millis(20)).await;
    let (_, jobs) = registry_for(&server);

    let (a, b) = tokio::join!(jobs.submit(csv("a.csv")), jobs.submit(csv("b.csv")));
    a.unwrap();
    b.unwrap();

    let ids: Vec<JobId> = jobs.list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![JobId::new("j2"), JobId::new("j1")]);
}

#[tokio::test]
async fn in_flight_submission_is_not_listed() {
    let server = MockServer::start().await;
    mount_upload(&server, "slow.csv", "j9", Duration::from_millis(200)).await;
    let (_, jobs) = registry_for(&server);

    let (result, seen) = tokio::join!(jobs.submit(csv("slow.csv")), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        jobs.list()
    });

    assert!(seen.is_empty());
    assert_eq!(result.unwrap().id, JobId::new("j9"));
    assert_eq!(jobs.len(), 1);
}

#[tokio::test]
async fn validation_failure_leaves_list_identical() {
    let server = MockServer::start().await;
    mount_upload(&server, "ok.csv", "j1", Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path("/api/verify/upload"))
        .and(wiremock::matchers::body_string_contains("notes.txt"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Only CSV files are accepted"})),
        )
        .mount(&server)
        .await;
    let (_, jobs) = registry_for(&server);
    jobs.submit(csv("ok.csv")).await.unwrap();
    let before = jobs.list();

    let err = jobs.submit(csv("notes.txt")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(upload_failure_message(&err), "Only CSV files are accepted");
    assert_eq!(jobs.list(), before);
}

#[tokio::test]
async fn unreachable_upload_reports_distinct_message() {
    let session = session_at(
        closed_port_url(),
        std::sync::Arc::new(verifier_gateway::MemoryCredentialStore::new()),
    );
    let jobs = verifier_core::JobRegistry::new(session);

    let err = jobs.submit(csv("a.csv")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    assert_eq!(upload_failure_message(&err), "Upload failed: Backend unreachable.");
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn refresh_updates_status_from_backend() {
    let server = MockServer::start().await;
    mount_upload(&server, "a.csv", "abc", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/api/verify/jobs/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "abc",
            "status": "COMPLETED",
            "progress": "100%"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (_, jobs) = registry_for(&server);
    let record = jobs.submit(csv("a.csv")).await.unwrap();

    let updated = jobs.refresh(&record.id).await.unwrap().unwrap();

    assert_eq!(updated.status, JobStatus::Completed);
    assert_eq!(updated.progress, "100%");
    assert_eq!(updated.submitted_at, record.submitted_at);
    assert_eq!(jobs.list(), vec![updated]);
}

#[tokio::test]
async fn logout_empties_registry() {
    let server = MockServer::start().await;
    mount_upload(&server, "a.csv", "j1", Duration::ZERO).await;
    let (session, jobs) = registry_for(&server);
    jobs.submit(csv("a.csv")).await.unwrap();
    assert_eq!(jobs.len(), 1);

    session.logout();

    assert!(jobs.list().is_empty());
}
