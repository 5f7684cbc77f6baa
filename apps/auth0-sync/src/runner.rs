//! Walks every resource type of a connector to completion.
//!
//! The runner is the scheduling loop the engine leaves to its caller: it
//! feeds tokens back, sleeps on not-ready export jobs and exhausted rate
//! limits, and retries transient failures a bounded number of times.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use xavyo_connector_auth0::{
    Auth0Connector, Auth0Error, Entitlement, Grant, Resource, ResourceSyncer, SyncError,
    SyncPage, SyncResult,
};

use crate::error::{CliError, CliResult};

/// Longest single wait honoured for an exhausted rate limit.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// One output line.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'r> {
    Resource(&'r Resource),
    Entitlement(&'r Entitlement),
    Grant(&'r Grant),
}

/// Counts of what a run wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub resources: usize,
    pub entitlements: usize,
    pub grants: usize,
    /// Resources whose entitlements or grants were abandoned after an error.
    pub failed: usize,
}

pub struct SyncRunner<'a, W> {
    connector: &'a Auth0Connector,
    out: W,
    page_size: Option<u32>,
    max_retries: u32,
    retry_backoff: Duration,
    stats: SyncStats,
}

impl<'a, W: Write> SyncRunner<'a, W> {
    pub fn new(connector: &'a Auth0Connector, out: W) -> Self {
        Self {
            connector,
            out,
            page_size: connector.config().page_size,
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            stats: SyncStats::default(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay for transient errors; attempt `n` waits `n * backoff`.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sync the given resource types, or all of them when `only` is empty.
    ///
    /// # Errors
    ///
    /// Fails on an unknown resource type, a listing that cannot complete, or
    /// an output error. Entitlement and grant failures of a single resource
    /// are logged and counted in [`SyncStats::failed`] instead.
    pub async fn run(mut self, only: &[String]) -> CliResult<SyncStats> {
        let connector = self.connector;
        if let Some(unknown) = only.iter().find(|t| connector.syncer(t).is_none()) {
            let known: Vec<_> = connector.resource_types().iter().map(|t| t.id).collect();
            return Err(CliError::Config(format!(
                "unknown resource type '{}' (expected one of: {})",
                unknown,
                known.join(", ")
            )));
        }

        for syncer in connector.syncers() {
            let resource_type = syncer.resource_type().id;
            if !only.is_empty() && !only.iter().any(|t| t == resource_type) {
                continue;
            }
            self.sync_type(syncer.as_ref()).await?;
        }

        self.out.flush()?;
        info!(
            resources = self.stats.resources,
            entitlements = self.stats.entitlements,
            grants = self.stats.grants,
            failed = self.stats.failed,
            "Sync finished"
        );
        Ok(self.stats)
    }

    async fn sync_type(&mut self, syncer: &dyn ResourceSyncer) -> CliResult<()> {
        let resource_type = syncer.resource_type().id;
        let page_size = self.page_size;

        let resources = self
            .drain(&format!("{resource_type} listing"), |token: String| async move {
                syncer.list(None, &token, page_size).await
            })
            .await?;
        info!(resource_type, count = resources.len(), "Listed resources");

        for resource in &resources {
            self.emit(&Record::Resource(resource))?;
            self.stats.resources += 1;
        }

        for resource in &resources {
            let what = format!("{} entitlements", resource.id);
            let entitlements = self
                .drain(&what, |token: String| async move {
                    syncer.entitlements(resource, &token, page_size).await
                })
                .await;
            let grants = match entitlements {
                Ok(entitlements) => {
                    for entitlement in &entitlements {
                        self.emit(&Record::Entitlement(entitlement))?;
                        self.stats.entitlements += 1;
                    }
                    let what = format!("{} grants", resource.id);
                    self.drain(&what, |token: String| async move {
                        syncer.grants(resource, &token, page_size).await
                    })
                    .await
                }
                Err(e) => Err(e),
            };

            match grants {
                Ok(grants) => {
                    for grant in &grants {
                        self.emit(&Record::Grant(grant))?;
                        self.stats.grants += 1;
                    }
                }
                Err(CliError::Sync { what, source }) => {
                    warn!(resource = %resource.id, error = %source, "Skipping {}", what);
                    self.stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Call `fetch` with successive tokens until the listing is done.
    async fn drain<T, F, Fut>(&self, what: &str, mut fetch: F) -> CliResult<Vec<T>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = SyncResult<SyncPage<T>>>,
    {
        let mut token = String::new();
        let mut records = Vec::new();
        let mut retries = 0;

        loop {
            match fetch(token.clone()).await {
                Ok(page) => {
                    retries = 0;
                    debug!(what, records = page.records.len(), done = page.done(), "Page synced");
                    records.extend(page.records);
                    if page.next_token.is_empty() {
                        return Ok(records);
                    }
                    token = page.next_token;
                    if let Some(wait) = rate_limit_wait(&page.annotations) {
                        warn!(what, ?wait, "Rate limit exhausted, waiting");
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(SyncError::JobNotReady {
                    job_id,
                    attempt,
                    retry_after,
                    next_token,
                    ..
                }) => {
                    info!(what, %job_id, attempt, retry_after_secs = retry_after.as_secs(), "Export job not ready");
                    tokio::time::sleep(retry_after).await;
                    token = next_token;
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let delay = server_retry_after(&e).unwrap_or(self.retry_backoff * retries);
                    warn!(what, attempt = retries, ?delay, error = %e, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(CliError::Sync {
                        what: what.to_string(),
                        source,
                    })
                }
            }
        }
    }

    fn emit(&mut self, record: &Record<'_>) -> CliResult<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

/// Delay asked for by a 429 response, if that is what failed.
fn server_retry_after(err: &SyncError) -> Option<Duration> {
    match err {
        SyncError::Collaborator {
            source: Some(source),
            ..
        } => match source.downcast_ref::<Auth0Error>() {
            Some(Auth0Error::RateLimited { retry_after_secs }) => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Time until an exhausted rate-limit window resets, capped.
fn rate_limit_wait(annotations: &xavyo_connector_auth0::Annotations) -> Option<Duration> {
    let rate_limit = annotations.rate_limit()?;
    if !rate_limit.is_exhausted() {
        return None;
    }
    let wait = (rate_limit.reset_at? - Utc::now()).to_std().ok()?;
    Some(wait.min(MAX_RATE_LIMIT_WAIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xavyo_connector_auth0::{Auth0Config, Auth0ConfigBuilder, RateLimitDescription};

    fn builder(server: &MockServer) -> Auth0ConfigBuilder {
        Auth0Config::builder()
            .base_url(server.uri())
            .api_token("test-token")
    }

    fn connector(builder: Auth0ConfigBuilder) -> Auth0Connector {
        Auth0Connector::new(builder.build().unwrap()).unwrap()
    }

    fn list(field: &str, items: Vec<Value>) -> Value {
        json!({ "start": 0, "limit": 50, "total": items.len(), field: items })
    }

    async fn mount_list(server: &MockServer, api_path: &str, field: &str, items: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(api_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(list(field, items)))
            .mount(server)
            .await;
    }

    fn lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_role_graph_written_as_json_lines() {
        let server = MockServer::start().await;
        mount_list(
            &server,
            "/api/v2/roles",
            "roles",
            vec![json!({"id": "rol_admin", "name": "Admin"})],
        )
        .await;
        mount_list(
            &server,
            "/api/v2/roles/rol_admin/users",
            "users",
            vec![
                json!({"user_id": "auth0|1", "email": "ada@example.com"}),
                json!({"user_id": "auth0|2", "email": "alan@example.com"}),
            ],
        )
        .await;

        let connector = connector(builder(&server));
        let mut out = Vec::new();
        let stats = SyncRunner::new(&connector, &mut out)
            .run(&["role".to_string()])
            .await
            .unwrap();

        assert_eq!(
            stats,
            SyncStats {
                resources: 1,
                entitlements: 1,
                grants: 2,
                failed: 0
            }
        );
        let lines = lines(&out);
        let kinds: Vec<_> = lines.iter().map(|l| l["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["resource", "entitlement", "grant", "grant"]);
        assert_eq!(lines[1]["id"], "role:rol_admin:assigned");
        assert_eq!(lines[3]["principal"]["resource"], "auth0|2");
    }

    #[tokio::test]
    async fn test_unknown_resource_type_rejected() {
        let server = MockServer::start().await;
        let connector = connector(builder(&server));
        let mut out = Vec::new();

        let err = SyncRunner::new(&connector, &mut out)
            .run(&["group".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("group"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_waits_for_export_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/jobs/users-exports"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"id": "job_1", "status": "pending"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/jobs/job_1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "job_1", "status": "processing"})),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/jobs/job_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "job_1",
                "status": "completed",
                "location": format!("{}/exports/job_1.json.gz", server.uri())
            })))
            .mount(&server)
            .await;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        writeln!(encoder, "{}", json!({"user_id": "auth0|1", "nickname": "ada"})).unwrap();
        writeln!(encoder, "{}", json!({"user_id": "auth0|2", "nickname": "alan"})).unwrap();
        Mock::given(method("GET"))
            .and(path("/exports/job_1.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(encoder.finish().unwrap()))
            .mount(&server)
            .await;

        let connector = connector(
            builder(&server)
                .sync_users_by_job(true)
                .job_poll_interval_secs(0),
        );
        let mut out = Vec::new();
        let stats = SyncRunner::new(&connector, &mut out)
            .run(&["user".to_string()])
            .await
            .unwrap();

        assert_eq!(stats.resources, 2);
        assert_eq!(lines(&out)[1]["display_name"], "alan");
    }

    #[tokio::test]
    async fn test_transient_error_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_list(
            &server,
            "/api/v2/organizations",
            "organizations",
            vec![json!({"id": "org_1", "name": "acme"})],
        )
        .await;
        mount_list(&server, "/api/v2/organizations/org_1/members", "members", vec![]).await;

        let connector = connector(builder(&server));
        let mut out = Vec::new();
        let stats = SyncRunner::new(&connector, &mut out)
            .with_retry_backoff(Duration::ZERO)
            .run(&["organization".to_string()])
            .await
            .unwrap();

        assert_eq!(stats.resources, 1);
        assert_eq!(stats.entitlements, 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/roles"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let connector = connector(builder(&server));
        let mut out = Vec::new();
        let err = SyncRunner::new(&connector, &mut out)
            .with_max_retries(2)
            .with_retry_backoff(Duration::ZERO)
            .run(&["role".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_grant_failure_skips_resource() {
        let server = MockServer::start().await;
        mount_list(
            &server,
            "/api/v2/organizations",
            "organizations",
            vec![
                json!({"id": "org_gone", "name": "gone"}),
                json!({"id": "org_ok", "name": "ok"}),
            ],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/org_gone/members"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "statusCode": 404,
                "message": "No organization found by that id."
            })))
            .mount(&server)
            .await;
        mount_list(
            &server,
            "/api/v2/organizations/org_ok/members",
            "members",
            vec![json!({"user_id": "auth0|1"})],
        )
        .await;

        let connector = connector(builder(&server));
        let mut out = Vec::new();
        let stats = SyncRunner::new(&connector, &mut out)
            .run(&["organization".to_string()])
            .await
            .unwrap();

        assert_eq!(stats.resources, 2);
        assert_eq!(stats.grants, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_rate_limit_wait() {
        let mut annotations = xavyo_connector_auth0::Annotations::new();
        assert!(rate_limit_wait(&annotations).is_none());

        annotations.with_rate_limit(Some(RateLimitDescription {
            limit: 50,
            remaining: 10,
            reset_at: Some(Utc::now() + chrono::Duration::seconds(30)),
        }));
        assert!(rate_limit_wait(&annotations).is_none());

        annotations.with_rate_limit(Some(RateLimitDescription::retry_after(
            Duration::from_secs(600),
        )));
        assert_eq!(rate_limit_wait(&annotations), Some(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn test_server_retry_after() {
        let err = SyncError::from(Auth0Error::RateLimited { retry_after_secs: 4 });
        assert_eq!(server_retry_after(&err), Some(Duration::from_secs(4)));
        assert_eq!(server_retry_after(&SyncError::collaborator("x", true)), None);
    }
}
