//! Common test utilities for xavyo-connector-auth0 integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_connector_auth0::{Auth0Config, Auth0ConfigBuilder, Auth0Connector};

pub const API_TOKEN: &str = "test-management-token";

/// Test data factory for creating Auth0 users.
pub fn create_test_user(id: &str, email_prefix: &str) -> Value {
    json!({
        "user_id": id,
        "email": format!("{}@example.com", email_prefix),
        "email_verified": true,
        "name": format!("Test User {}", email_prefix),
        "nickname": email_prefix,
        "created_at": "2024-01-15T10:00:00.000Z",
        "updated_at": "2024-02-01T08:30:00.000Z",
        "identities": [{
            "connection": "Username-Password-Authentication",
            "provider": "auth0",
            "user_id": id.trim_start_matches("auth0|"),
            "isSocial": false
        }]
    })
}

/// Generate a sequence of test users.
pub fn generate_test_users(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| create_test_user(&format!("auth0|user-{}", i), &format!("user{}", i)))
        .collect()
}

pub fn create_test_role(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "description": format!("{} role", name) })
}

pub fn create_test_organization(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "display_name": format!("{} Inc.", name) })
}

pub fn create_role_permission(server_identifier: &str, permission: &str) -> Value {
    json!({
        "permission_name": permission,
        "description": format!("Allows {}", permission),
        "resource_server_name": "Billing API",
        "resource_server_identifier": server_identifier
    })
}

pub fn create_resource_server(id: &str, name: &str, identifier: &str, scopes: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "identifier": identifier,
        "scopes": scopes
            .iter()
            .map(|value| json!({ "value": value, "description": format!("{} scope", value) }))
            .collect::<Vec<_>>()
    })
}

/// Wraps items in a Management API list response with totals.
pub fn create_list_response(field: &str, items: Vec<Value>, start: usize, total: usize) -> Value {
    json!({
        "start": start,
        "limit": items.len(),
        "length": items.len(),
        "total": total,
        field: items
    })
}

pub fn create_job(id: &str, status: &str, location: Option<&str>) -> Value {
    let mut job = json!({
        "id": id,
        "type": "users_export",
        "status": status,
        "format": "json",
        "created_at": "2024-01-15T10:00:00.000Z"
    });
    if let Some(location) = location {
        job["location"] = json!(location);
    }
    job
}

/// NDJSON body compressed the way export results are served.
pub fn gzip_ndjson(rows: &[Value]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for row in rows {
        writeln!(encoder, "{}", row).unwrap();
    }
    encoder.finish().unwrap()
}

/// Mock server wrapper with common setup helpers.
pub struct MockAuth0Server {
    pub server: MockServer,
}

impl MockAuth0Server {
    /// Creates a new mock Auth0 tenant.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Returns the mock server's base URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Config builder pointed at this server.
    pub fn config_builder(&self) -> Auth0ConfigBuilder {
        Auth0Config::builder()
            .base_url(self.url())
            .api_token(API_TOKEN)
    }

    pub fn connector(&self, builder: Auth0ConfigBuilder) -> Auth0Connector {
        Auth0Connector::new(builder.build().unwrap()).unwrap()
    }

    /// Serves `items` under `field` from `api_path`, `page_size` per page.
    pub async fn mock_paged_endpoint(
        &self,
        api_path: &str,
        field: &str,
        items: Vec<Value>,
        page_size: usize,
    ) {
        let total = items.len();
        let pages: Vec<Vec<Value>> = if items.is_empty() {
            vec![Vec::new()]
        } else {
            items.chunks(page_size).map(<[Value]>::to_vec).collect()
        };

        for (i, page) in pages.into_iter().enumerate() {
            let response = create_list_response(field, page, i * page_size, total);
            Mock::given(method("GET"))
                .and(path(api_path))
                .and(query_param("include_totals", "true"))
                .and(query_param("page", i.to_string()))
                .and(query_param("per_page", page_size.to_string()))
                .and(header("authorization", format!("Bearer {}", API_TOKEN).as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(response))
                .expect(1)
                .mount(&self.server)
                .await;
        }
    }

    /// Sets up the users export job: `pending_polls` pending answers, then
    /// completed with `rows` as the gzip result.
    pub async fn mock_users_export_job(&self, job_id: &str, pending_polls: u64, rows: &[Value]) {
        Mock::given(method("POST"))
            .and(path("/api/v2/jobs/users-exports"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(create_job(job_id, "pending", None)),
            )
            .expect(1)
            .mount(&self.server)
            .await;

        if pending_polls > 0 {
            Mock::given(method("GET"))
                .and(path(format!("/api/v2/jobs/{}", job_id)))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(create_job(job_id, "pending", None)),
                )
                .up_to_n_times(pending_polls)
                .expect(pending_polls)
                .mount(&self.server)
                .await;
        }

        let location = format!("{}/exports/{}.json.gz", self.url(), job_id);
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/jobs/{}", job_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_job(job_id, "completed", Some(&location))),
            )
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/exports/{}.json.gz", job_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/gzip")
                    .set_body_bytes(gzip_ndjson(rows)),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_resource_server(&self, id: &str, server: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/resource-servers/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(server))
            .mount(&self.server)
            .await;
    }

    /// Expects `times` membership writes of `body` to `api_path`, answered
    /// with 204 and rate-limit headers.
    pub async fn mock_membership_write(
        &self,
        verb: &str,
        api_path: &str,
        body: Value,
        times: u64,
    ) {
        Mock::given(method(verb))
            .and(path(api_path))
            .and(header("authorization", format!("Bearer {}", API_TOKEN).as_str()))
            .and(body_json(body))
            .respond_with(
                ResponseTemplate::new(204)
                    .insert_header("x-ratelimit-limit", "50")
                    .insert_header("x-ratelimit-remaining", "41"),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Sets up rate limit response (429).
    pub async fn mock_rate_limit(&self, api_path: &str, retry_after: u64) {
        Mock::given(method("GET"))
            .and(path(api_path))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after.to_string().as_str())
                    .insert_header("x-ratelimit-limit", "50")
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(json!({
                        "statusCode": 429,
                        "error": "Too Many Requests",
                        "message": "Global limit has been reached"
                    })),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }
}
