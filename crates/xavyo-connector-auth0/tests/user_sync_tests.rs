//! User listing tests: paged listing and the bulk export job flow.

mod common;

use common::*;
use xavyo_connector_auth0::{ResourceId, SyncError, TraitData, USER};

#[tokio::test]
async fn test_paged_user_listing() {
    let server = MockAuth0Server::new().await;
    server
        .mock_paged_endpoint("/api/v2/users", "users", generate_test_users(250), 100)
        .await;

    let connector = server.connector(server.config_builder());
    let users = connector.syncer("user").unwrap();

    let mut token = String::new();
    let mut pages = Vec::new();
    loop {
        let page = users.list(None, &token, Some(100)).await.unwrap();
        pages.push(page.records.len());
        if page.done() {
            break;
        }
        token = page.next_token;
    }

    assert_eq!(pages, vec![100, 100, 50]);
}

#[tokio::test]
async fn test_user_resource_mapping() {
    let server = MockAuth0Server::new().await;
    server
        .mock_paged_endpoint(
            "/api/v2/users",
            "users",
            vec![create_test_user("auth0|ada", "ada")],
            100,
        )
        .await;

    let connector = server.connector(server.config_builder());
    let page = connector
        .syncer("user")
        .unwrap()
        .list(None, "", None)
        .await
        .unwrap();

    assert!(page.done());
    let user = &page.records[0];
    assert_eq!(user.id, ResourceId::new(&USER, "auth0|ada"));
    assert_eq!(user.display_name, "ada");
    assert_eq!(user.profile["email"], "ada@example.com");
    assert_eq!(user.profile["first_name"], "Test");
    match &user.trait_data {
        Some(TraitData::User { login, created_at, .. }) => {
            assert_eq!(login.as_deref(), Some("ada@example.com"));
            assert!(created_at.is_some());
        }
        other => panic!("unexpected trait data: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_user_listing() {
    let server = MockAuth0Server::new().await;
    server
        .mock_paged_endpoint("/api/v2/users", "users", Vec::new(), 100)
        .await;

    let connector = server.connector(server.config_builder());
    let page = connector
        .syncer("user")
        .unwrap()
        .list(None, "", None)
        .await
        .unwrap();

    assert!(page.records.is_empty());
    assert!(page.done());
}

#[tokio::test]
async fn test_users_export_job_flow() {
    let server = MockAuth0Server::new().await;
    let rows = vec![
        serde_json::json!({"user_id": "auth0|1", "email": "ada@example.com", "name": "Ada Lovelace", "nickname": "ada"}),
        serde_json::json!({"user_id": "auth0|2", "email": "alan@example.com", "name": "Alan Turing", "nickname": "alan"}),
    ];
    server.mock_users_export_job("job_abc123", 2, &rows).await;

    let connector = server.connector(
        server
            .config_builder()
            .sync_users_by_job(true)
            .sync_users_by_job_limit(500)
            .job_poll_interval_secs(5),
    );
    let users = connector.syncer("user").unwrap();

    // Submission returns control immediately with the job in the token.
    let submitted = users.list(None, "", None).await.unwrap();
    assert!(submitted.records.is_empty());
    assert!(!submitted.done());

    let mut token = submitted.next_token;
    for expected_attempt in 1..=2 {
        match users.list(None, &token, None).await {
            Err(SyncError::JobNotReady {
                job_id,
                attempt,
                retry_after,
                next_token,
                ..
            }) => {
                assert_eq!(job_id, "job_abc123");
                assert_eq!(attempt, expected_attempt);
                assert_eq!(retry_after.as_secs(), 5);
                token = next_token;
            }
            other => panic!("expected JobNotReady, got {other:?}"),
        }
    }

    let done = users.list(None, &token, None).await.unwrap();
    assert!(done.done());
    let ids: Vec<_> = done.records.iter().map(|r| r.id.resource.as_str()).collect();
    assert_eq!(ids, vec!["auth0|1", "auth0|2"]);
    assert_eq!(done.records[1].display_name, "alan");

    let submissions: Vec<_> = server
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/v2/jobs/users-exports")
        .collect();
    assert_eq!(submissions.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&submissions[0].body).unwrap();
    assert_eq!(body["format"], "json");
    assert_eq!(body["limit"], 500);
    assert_eq!(body["fields"][0]["name"], "user_id");
    assert_eq!(body["fields"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_export_job_failed() {
    let server = MockAuth0Server::new().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/api/v2/jobs/users-exports"))
        .respond_with(
            wiremock::ResponseTemplate::new(201)
                .set_body_json(create_job("job_failed", "pending", None)),
        )
        .mount(&server.server)
        .await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/api/v2/jobs/job_failed"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(create_job("job_failed", "failed", None)),
        )
        .mount(&server.server)
        .await;

    let connector = server.connector(server.config_builder().sync_users_by_job(true));
    let users = connector.syncer("user").unwrap();

    let token = users.list(None, "", None).await.unwrap().next_token;
    let err = users.list(None, &token, None).await.unwrap_err();
    assert!(matches!(err, SyncError::JobFailed { ref job_id } if job_id == "job_failed"));
}
