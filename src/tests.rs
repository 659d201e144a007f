//! Integration tests for the challenge hub backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::catalog::{
    CatalogTransport, FetchErrorKind, GithubCatalog, RemoteMetadataClient, RetryPolicy,
};
use crate::config::Config;
use crate::db::{init_database, SqliteSlotStore};
use crate::hub::Hub;
use crate::models::{EntryDraft, RepoIdentifier};
use crate::{build_hub, create_router, AppState};

const GOOD_TOKEN: &str = "good-token";
const PUBLIC_URL: &str = "http://hub.test/";

// ==================== FAKE CATALOG ====================

/// Requests seen by the fake catalog, with their Authorization header.
#[derive(Default)]
struct CatalogLog {
    hits: Mutex<Vec<(String, Option<String>)>>,
    /// Remaining 500 responses per project before it answers normally.
    flaky: Mutex<HashMap<String, u32>>,
}

impl CatalogLog {
    fn record(&self, path: String, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.hits.lock().unwrap().push((path, auth));
    }

    fn hits_for(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|(p, _)| p == path).count()
    }
}

async fn fake_repo(
    State(log): State<Arc<CatalogLog>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    log.record(format!("/repos/{}/{}", owner, name), &headers);

    match name.as_str() {
        "missing" => return StatusCode::NOT_FOUND.into_response(),
        "limited" => return StatusCode::TOO_MANY_REQUESTS.into_response(),
        "quota" => {
            return (StatusCode::FORBIDDEN, [("x-ratelimit-remaining", "0")]).into_response()
        }
        "forbidden" => {
            return (StatusCode::FORBIDDEN, [("x-ratelimit-remaining", "4999")]).into_response()
        }
        _ => {}
    }

    {
        let mut flaky = log.flaky.lock().unwrap();
        if let Some(remaining) = flaky.get_mut(&name) {
            if *remaining > 0 {
                *remaining -= 1;
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    Json(json!({
        "id": 1296269,
        "name": name,
        "description": "Fetched from the fake catalog",
        "owner": { "login": owner },
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "language": "Rust",
        "stargazers_count": 42,
        "forks_count": 7,
        "updated_at": "2025-03-04T10:00:00Z",
        "pushed_at": "2025-03-05T08:30:00Z"
    }))
    .into_response()
}

async fn fake_contributors(
    State(log): State<Arc<CatalogLog>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    log.record(format!("/repos/{}/{}/contributors", owner, name), &headers);
    if name == "empty" {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(json!([
        { "login": "alice", "contributions": 12 },
        { "type": "Anonymous", "contributions": 3 },
        { "login": "bob", "contributions": 1 }
    ]))
    .into_response()
}

/// Answer a `per_page=1` listing the way the catalog does: one item and a
/// `Link` header naming the last page, or an empty page.
fn paged(total: u64) -> Response {
    if total == 0 {
        return Json(json!([])).into_response();
    }
    let link = format!(
        "<https://api.github.com/repositories/1296269/items?per_page=1&page={}>; rel=\"last\"",
        total
    );
    ([("link", link)], Json(json!([{ "number": total }]))).into_response()
}

async fn fake_listing(
    State(log): State<Arc<CatalogLog>>,
    Path((owner, name, listing)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    log.record(format!("/repos/{}/{}/{}", owner, name, listing), &headers);
    if name == "empty" {
        return match listing.as_str() {
            "commits" => StatusCode::CONFLICT.into_response(),
            _ => paged(0),
        };
    }
    match listing.as_str() {
        "pulls" => paged(12),
        // Pull requests are listed as issues too.
        "issues" => paged(20),
        "commits" if query.contains_key("since") => paged(9),
        "commits" => paged(40),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn fake_user(State(log): State<Arc<CatalogLog>>, headers: HeaderMap) -> Response {
    log.record("/user".to_string(), &headers);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));
    if bearer == Some(GOOD_TOKEN) {
        Json(json!({ "login": "octocat" })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Serve a fake catalog API and return its base URL.
async fn spawn_fake_catalog(log: Arc<CatalogLog>) -> String {
    let app = Router::new()
        .route("/repos/{owner}/{name}", get(fake_repo))
        .route("/repos/{owner}/{name}/contributors", get(fake_contributors))
        .route("/repos/{owner}/{name}/{listing}", get(fake_listing))
        .route("/user", get(fake_user))
        .with_state(log);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ==================== FIXTURE ====================

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    catalog: Arc<CatalogLog>,
    hub: Arc<Hub>,
    _temp_dir: TempDir,
}

fn test_config(
    temp_dir: &TempDir,
    psk: Option<String>,
    catalog_url: String,
    token: Option<String>,
) -> Config {
    Config {
        admin_psk: psk,
        db_path: temp_dir.path().join("test.sqlite"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        public_url: PUBLIC_URL.to_string(),
        log_level: "warn".to_string(),
        catalog_url,
        catalog_token: token,
        fetch_attempts: 3,
        retry_base: Duration::from_millis(1),
        stale_after: Duration::from_secs(300),
        inbound_link: None,
        challenge_start: None,
        challenge_days: 5,
        telemetry_enabled: true,
    }
}

impl TestFixture {
    async fn new() -> Self {
        Self::build(Some("test-api-key".to_string()), Some(GOOD_TOKEN.to_string())).await
    }

    async fn build(psk: Option<String>, token: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = Arc::new(CatalogLog::default());
        let catalog_url = spawn_fake_catalog(catalog.clone()).await;
        let config = test_config(&temp_dir, psk.clone(), catalog_url, token);

        let pool = init_database(&config.db_path)
            .await
            .expect("Failed to init DB");
        let transport = Arc::new(
            GithubCatalog::new(&config.catalog_url, config.catalog_token.clone())
                .expect("Failed to build catalog client"),
        );
        let hub = Arc::new(build_hub(
            &config,
            transport,
            Arc::new(SqliteSlotStore::new(pool)),
        ));
        hub.start(None).await;

        let state = AppState {
            hub: hub.clone(),
            config: Arc::new(config),
        };
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Redirects are asserted, not followed
        let mut client_builder = Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            catalog,
            hub,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn add(&self, url: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/entries"))
            .json(&json!({
                "displayName": "Widget",
                "description": "Tracks widgets",
                "externalUrl": url,
                "declaredContributors": ["@dave", "Dave", " erin "]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

fn direct_client(base_url: &str, token: Option<&str>) -> (Arc<GithubCatalog>, RemoteMetadataClient) {
    let transport = Arc::new(GithubCatalog::new(base_url, token.map(str::to_string)).unwrap());
    let client = RemoteMetadataClient::new(
        transport.clone(),
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    );
    (transport, client)
}

// ==================== HEALTH & AUTH ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = Client::new()
        .post(fixture.url("/api/entries"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .post(fixture.url("/api/refresh"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = Client::new()
        .post(fixture.url("/api/refresh"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_read_routes_are_public() {
    let fixture = TestFixture::new().await;

    for path in ["/api/entries", "/api/hub", "/api/window", "/api/credential"] {
        let resp = Client::new().get(fixture.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200, "{}", path);
    }
}

#[tokio::test]
async fn test_open_admin_routes_without_psk() {
    let fixture = TestFixture::build(None, None).await;

    let resp = Client::new()
        .post(fixture.url("/api/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ==================== ENTRIES ====================

#[tokio::test]
async fn test_entry_crud() {
    let fixture = TestFixture::new().await;

    let created = fixture.add("https://github.com/acme/widget").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["identifier"], json!({ "owner": "acme", "name": "widget" }));
    assert_eq!(created["declaredContributors"], json!(["dave", "erin"]));

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/entries/{}", id)))
        .json(&json!({ "description": "Edited" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["description"], "Edited");
    assert_eq!(body["data"]["displayName"], "Widget");

    let resp = fixture
        .client
        .get(fixture.url("/api/entries"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert!(body["revisionId"].as_i64().unwrap() >= 2);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/entries/{}", id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["removed"], true);

    // Idempotent
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/entries/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["removed"], false);
}

#[tokio::test]
async fn test_add_entry_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/entries"))
        .json(&json!({
            "displayName": "Widget",
            "description": "Tracks widgets",
            "externalUrl": "not a url at all"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(fixture.hub.list().await.is_empty());
}

#[tokio::test]
async fn test_unparseable_body_is_bad_request() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/entries"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_update_unknown_entry() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url("/api/entries/does-not-exist"))
        .json(&json!({ "description": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ==================== CATALOG ====================

#[tokio::test]
async fn test_refresh_populates_metadata() {
    let fixture = TestFixture::new().await;
    fixture.add("https://github.com/acme/widget").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/refresh?force=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["requested"], 1);
    assert_eq!(body["data"]["failures"], json!({}));

    let resp = fixture
        .client
        .get(fixture.url("/api/metadata/acme/widget"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let record = &body["data"];
    assert_eq!(record["resolvedName"], "widget");
    assert_eq!(record["stargazerCount"], 42);
    assert_eq!(record["remoteId"], "1296269");
    assert_eq!(record["lastUpdatedAt"], "2025-03-05T08:30:00Z");
    assert_eq!(record["contributors"], json!(["alice", "bob"]));
    assert_eq!(record["pullRequestCount"], 12);
    assert_eq!(record["issueCount"], 8);
    // Counted from the start of the challenge window
    assert_eq!(record["commitCount"], 9);

    // Credential is sent as a bearer token
    let hits = fixture.catalog.hits.lock().unwrap().clone();
    assert!(hits
        .iter()
        .all(|(_, auth)| auth.as_deref() == Some("Bearer good-token")));
}

#[tokio::test]
async fn test_metadata_not_cached() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/metadata/acme/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_refresh_reports_rate_limit() {
    let fixture = TestFixture::new().await;
    fixture.add("acme/limited").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/refresh?force=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["rateLimited"], true);
    assert_eq!(body["data"]["failures"]["acme/limited"], "rateLimited");
    assert!(fixture.hub.get_metadata("acme/limited").await.is_none());
}

#[tokio::test]
async fn test_status_classification_over_http() {
    let log = Arc::new(CatalogLog::default());
    let base_url = spawn_fake_catalog(log.clone()).await;
    let (transport, _) = direct_client(&base_url, None);
    let now = chrono::Utc::now();

    let cases = [
        ("missing", FetchErrorKind::NotFound),
        ("limited", FetchErrorKind::RateLimited),
        ("quota", FetchErrorKind::RateLimited),
        ("forbidden", FetchErrorKind::Unauthorized),
    ];
    for (name, expected) in cases {
        let err = transport
            .fetch_record(&RepoIdentifier::new("acme", name), now, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, expected, "{}", name);
    }

    // Anonymous requests carry no Authorization header
    let hits = log.hits.lock().unwrap().clone();
    assert!(hits.iter().all(|(_, auth)| auth.is_none()));
}

#[tokio::test]
async fn test_transport_errors_are_retried() {
    let log = Arc::new(CatalogLog::default());
    log.flaky.lock().unwrap().insert("flaky".to_string(), 2);
    let base_url = spawn_fake_catalog(log.clone()).await;
    let (_, client) = direct_client(&base_url, None);

    let record = client
        .fetch_one(&RepoIdentifier::new("acme", "flaky"))
        .await
        .unwrap();
    assert_eq!(record.stargazer_count, 42);
    assert_eq!(log.hits_for("/repos/acme/flaky"), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let log = Arc::new(CatalogLog::default());
    let base_url = spawn_fake_catalog(log.clone()).await;
    let (_, client) = direct_client(&base_url, None);

    let err = client
        .fetch_one(&RepoIdentifier::new("acme", "missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::NotFound);
    assert_eq!(log.hits_for("/repos/acme/missing"), 1);
}

#[tokio::test]
async fn test_empty_contributor_listing() {
    let log = Arc::new(CatalogLog::default());
    let base_url = spawn_fake_catalog(log.clone()).await;
    let (_, client) = direct_client(&base_url, None);

    let record = client
        .fetch_one(&RepoIdentifier::new("acme", "empty"))
        .await
        .unwrap();
    assert!(record.contributors.is_empty());
    assert_eq!(record.pull_request_count, 0);
    assert_eq!(record.issue_count, 0);
    assert_eq!(record.commit_count, 0);
}

#[tokio::test]
async fn test_commit_count_without_window_covers_history() {
    let log = Arc::new(CatalogLog::default());
    let base_url = spawn_fake_catalog(log.clone()).await;
    let (_, client) = direct_client(&base_url, None);

    let record = client
        .fetch_one(&RepoIdentifier::new("acme", "widget"))
        .await
        .unwrap();
    assert_eq!(record.commit_count, 40);
    assert_eq!(log.hits_for("/repos/acme/widget/commits"), 1);
}

#[tokio::test]
async fn test_refresh_single_identifier() {
    let fixture = TestFixture::new().await;
    fixture.add("acme/widget").await;
    fixture.add("acme/forbidden").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/metadata/acme/widget/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["stargazerCount"], 42);

    let resp = fixture
        .client
        .post(fixture.url("/api/metadata/acme/forbidden/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "REMOTE_FETCH_ERROR");

    let resp = fixture
        .client
        .post(fixture.url("/api/metadata/acme/untracked/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_refresh_single_identifier_rate_limited() {
    let fixture = TestFixture::new().await;
    fixture.add("acme/limited").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/metadata/acme/limited/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_credential_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/credential"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["state"], "unchecked");

    let resp = fixture
        .client
        .post(fixture.url("/api/credential/validate"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"]["state"], "valid");
    assert_eq!(body["data"]["status"]["login"], "octocat");
    assert_eq!(body["data"]["coolingDown"], false);

    // Second attempt inside the cool-down window makes no remote call
    let resp = fixture
        .client
        .post(fixture.url("/api/credential/validate"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["coolingDown"], true);
    assert_eq!(fixture.catalog.hits_for("/user"), 1);
}

#[tokio::test]
async fn test_invalid_credential_is_dropped() {
    let fixture =
        TestFixture::build(Some("test-api-key".to_string()), Some("revoked".to_string())).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/credential/validate"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"]["state"], "invalid");

    // Later catalog requests go out anonymously
    fixture.hub.refresh_identifiers(vec![RepoIdentifier::new("acme", "widget")]).await;
    let hits = fixture.catalog.hits.lock().unwrap().clone();
    let (_, auth) = hits
        .iter()
        .find(|(path, _)| path == "/repos/acme/widget")
        .unwrap();
    assert!(auth.is_none());
}

// ==================== SHARING ====================

#[tokio::test]
async fn test_share_then_import() {
    let source = TestFixture::new().await;
    source.add("https://github.com/acme/widget").await;
    source.add("acme/gadget").await;
    source.hub.refresh_all(true).await;

    let resp = source
        .client
        .post(source.url("/api/share"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let link = body["data"]["url"].as_str().unwrap().to_string();
    assert!(link.starts_with("http://hub.test/?snapshot="));
    let (_, query) = link.split_once('?').unwrap();

    let target = TestFixture::new().await;
    let resp = target
        .client
        .get(target.url(&format!("/api/import?tab=board&{}", query)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers()["location"], "http://hub.test/?tab=board");
    assert_eq!(resp.headers()["x-snapshot-outcome"], "applied");

    assert_eq!(target.hub.list().await, source.hub.list().await);
    let record = target.hub.get_metadata("acme/gadget").await.unwrap();
    assert_eq!(record.stargazer_count, 42);
    assert_eq!(record.contributors, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_import_rejects_malformed_snapshot() {
    let fixture = TestFixture::new().await;
    fixture.add("acme/widget").await;
    let before = fixture.hub.list().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/import?snapshot=%25%25%25garbage&snapshotAt=whenever"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers()["location"], "http://hub.test/");
    assert_eq!(resp.headers()["x-snapshot-outcome"], "rejected");
    assert_eq!(fixture.hub.list().await, before);
}

#[tokio::test]
async fn test_import_bare_token() {
    let source = TestFixture::new().await;
    source.add("acme/widget").await;
    let link = source.hub.generate_share_token().await.unwrap();

    let target = TestFixture::new().await;
    let resp = target
        .client
        .post(target.url("/api/snapshot"))
        .json(&json!({ "token": link.token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["state"], "applied");
    assert_eq!(body["data"]["entries"], 1);
    assert_eq!(target.hub.list().await, source.hub.list().await);

    let resp = target
        .client
        .post(target.url("/api/snapshot"))
        .json(&json!({ "token": "bm90IGpzb24" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MALFORMED_SNAPSHOT");
    assert_eq!(target.hub.list().await.len(), 1);
}

// ==================== VIEW ====================

#[tokio::test]
async fn test_hub_view() {
    let fixture = TestFixture::new().await;
    fixture.add("https://github.com/acme/widget").await;
    fixture.hub.refresh_all(true).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/hub"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let data = &body["data"];

    assert_eq!(data["entries"][0]["forkUrl"], "https://github.com/acme/widget/fork");
    assert_eq!(
        data["entries"][0]["compareUrl"],
        "https://github.com/acme/widget/compare"
    );
    assert!(data["entries"][0]["updatedAgo"].is_string());
    assert_eq!(data["summary"]["entryCount"], 1);
    assert_eq!(data["summary"]["totalStars"], 42);
    assert_eq!(data["summary"]["totalCommits"], 9);
    assert_eq!(data["summary"]["remoteContributors"], json!(["alice", "bob"]));
    assert_eq!(data["window"]["days"].as_array().unwrap().len(), 5);
    assert_eq!(data["window"]["days"][0]["label"], "Monday");
    assert_eq!(body["revisionId"], data["revisionId"]);
}

// ==================== DURABILITY ====================

async fn open_hub(config: &Config) -> Hub {
    let pool = init_database(&config.db_path).await.unwrap();
    let transport = Arc::new(GithubCatalog::new(&config.catalog_url, None).unwrap());
    build_hub(config, transport, Arc::new(SqliteSlotStore::new(pool)))
}

#[tokio::test]
async fn test_state_survives_restart_on_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(CatalogLog::default());
    let catalog_url = spawn_fake_catalog(log).await;
    let config = test_config(&temp_dir, None, catalog_url, None);

    let first = open_hub(&config).await;
    first.start(None).await;
    first
        .add_entry(EntryDraft {
            display_name: "Widget".to_string(),
            description: "Tracks widgets".to_string(),
            external_url: "acme/widget".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    first.refresh_all(false).await;
    let entries = first.list().await;
    let record = first.get_metadata("acme/widget").await;
    assert!(record.is_some());
    drop(first);

    let second = open_hub(&config).await;
    second.start(None).await;
    assert_eq!(second.list().await, entries);
    assert_eq!(second.get_metadata("acme/widget").await, record);
    assert!(!second.needs_initial_fetch().await);
}
