//! In-process scenario tests for tally-daemon HTTP endpoints.
//!
//! Each test builds the router with `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no socket is bound.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tally_config::ConfigError;
use tally_daemon::{routes, state};
use tally_reconcile::RecordFields;
use tally_runtime::{PassBuilder, PassDeps, PassError, Runner};
use tally_source::{FetchError, FetchOutcome, FetchRequest, RecordFetcher};
use tally_store::{ChangePublisher, MemoryObjectStore, ObjectStore, SnapshotStore, LATEST_KEY};
use tokio::sync::Notify;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

enum Behaviour {
    Records(Vec<Value>),
    Status(u16),
    /// Signal `entered`, then wait for `release` before returning no records.
    Gate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    },
}

struct StubFetcher(Behaviour);

#[async_trait::async_trait]
impl RecordFetcher for StubFetcher {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_all(&self, _req: FetchRequest) -> Result<FetchOutcome, FetchError> {
        match &self.0 {
            Behaviour::Records(r) => Ok(FetchOutcome {
                records: r.clone(),
                pages: 1,
            }),
            Behaviour::Status(code) => Err(FetchError::Status {
                code: *code,
                url: "http://harvest.test".to_string(),
            }),
            Behaviour::Gate { entered, release } => {
                entered.notify_one();
                release.notified().await;
                Ok(FetchOutcome {
                    records: vec![],
                    pages: 1,
                })
            }
        }
    }
}

struct StubBuilder {
    fetcher: Result<Arc<StubFetcher>, ConfigError>,
    bucket: Arc<MemoryObjectStore>,
}

impl PassBuilder for StubBuilder {
    fn build(&self) -> Result<PassDeps, PassError> {
        let fetcher = self.fetcher.clone().map_err(PassError::Config)?;
        let store: Arc<dyn ObjectStore> = self.bucket.clone();
        Ok(PassDeps {
            fetcher,
            snapshots: SnapshotStore::new(store.clone(), RecordFields::harvest()),
            publisher: ChangePublisher::new().with_destination(store),
            fields: RecordFields::harvest(),
            days_back: 90,
        })
    }
}

/// Blows up while building the pass.
struct PanickingBuilder;

impl PassBuilder for PanickingBuilder {
    fn build(&self) -> Result<PassDeps, PassError> {
        panic!("collaborator wiring exploded");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(fetcher: Result<StubFetcher, ConfigError>) -> (Arc<state::AppState>, Arc<MemoryObjectStore>) {
    let bucket = Arc::new(MemoryObjectStore::named("bucket"));
    let builder = StubBuilder {
        fetcher: fetcher.map(Arc::new),
        bucket: bucket.clone(),
    };
    let st = Arc::new(state::AppState::new(Runner::new(Arc::new(builder))));
    (st, bucket)
}

fn make_router(fetcher: Result<StubFetcher, ConfigError>) -> (axum::Router, Arc<MemoryObjectStore>) {
    let (st, bucket) = make_state(fetcher);
    (routes::build_router(st), bucket)
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn invoke(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/invoke")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn no_records() -> Result<StubFetcher, ConfigError> {
    Ok(StubFetcher(Behaviour::Records(vec![])))
}

// ---------------------------------------------------------------------------
// GET /v1/health, GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (router, _) = make_router(no_records());

    let (status, body) = call(router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "tally-daemon");
}

#[tokio::test]
async fn fresh_status_is_idle_with_no_pass() {
    let (router, _) = make_router(no_records());

    let (status, body) = call(router, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["state"], "idle");
    assert_eq!(json["passes_run"], 0);
    assert!(json["last_pass"].is_null());
    assert!(json["schedule_interval_secs"].is_null());
}

// ---------------------------------------------------------------------------
// POST /v1/invoke
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invoke_runs_a_pass_and_status_reflects_it() {
    let (st, bucket) = make_state(Ok(StubFetcher(Behaviour::Records(vec![
        json!({"id": 1, "spent_date": "2099-01-01", "updated_at": "t"}),
    ]))));
    let router = routes::build_router(st);

    let (status, body) = call(router.clone(), invoke("{}")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["message"], "reconciliation pass completed");
    assert_eq!(json["summary"]["created"], 1);
    assert_eq!(json["summary"]["success"], true);
    assert!(bucket.get(LATEST_KEY).is_some());

    let (_, body) = call(router, get("/v1/status")).await;
    let snap = parse_json(body);
    assert_eq!(snap["state"], "idle");
    assert_eq!(snap["passes_run"], 1);
    assert_eq!(snap["last_pass"]["persisted"], 1);
    assert!(snap["last_error"].is_null());
    assert!(snap["last_finished_at"].is_string());
}

#[tokio::test]
async fn empty_body_counts_as_empty_event() {
    let (router, bucket) = make_router(no_records());

    let (status, body) = call(router, invoke(Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["summary"]["fetched"], 0);
    assert!(bucket.get(LATEST_KEY).is_some());
}

#[tokio::test]
async fn notification_is_routed_without_a_pass() {
    let (router, bucket) = make_router(no_records());
    let event = json!({
        "Records": [{
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": {"name": "bucket"},
                "object": {"key": "changes/created/20240201-created-063000.json"}
            }
        }]
    });

    let (status, body) = call(router, invoke(event.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["message"], "artifact notification routed");
    assert_eq!(json["event"]["change_kind"], "created");
    assert!(bucket.is_empty());
}

#[tokio::test]
async fn config_error_is_400_and_recorded() {
    let (st, _) = make_state(Err(ConfigError::MissingField {
        field: "account_id".to_string(),
    }));
    let router = routes::build_router(st);

    let (status, body) = call(router.clone(), invoke("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("account_id"));

    let (_, body) = call(router, get("/v1/status")).await;
    let snap = parse_json(body);
    assert_eq!(snap["passes_run"], 1);
    assert!(snap["last_error"].as_str().unwrap().contains("configuration error"));
}

#[tokio::test]
async fn fetch_error_is_500() {
    let (router, bucket) = make_router(Ok(StubFetcher(Behaviour::Status(503))));

    let (status, body) = call(router, invoke("{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("503"));
    assert!(bucket.is_empty());
}

#[tokio::test]
async fn invalid_json_is_400_without_a_pass() {
    let (router, bucket) = make_router(no_records());

    let (status, body) = call(router, invoke("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid trigger event"));
    assert!(bucket.is_empty());
}

#[tokio::test]
async fn second_invoke_while_pass_in_flight_is_409() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (router, _) = make_router(Ok(StubFetcher(Behaviour::Gate {
        entered: entered.clone(),
        release: release.clone(),
    })));

    let first = tokio::spawn(call(router.clone(), invoke("{}")));
    entered.notified().await;

    let (status, body) = call(router.clone(), invoke("{}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("already running"));

    let (_, body) = call(router.clone(), get("/v1/status")).await;
    assert_eq!(parse_json(body)["state"], "running");

    release.notify_one();
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    // guard is free again; pre-release the gate so the next pass completes
    release.notify_one();
    let (status, _) = call(router, invoke("{}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn panicking_pass_is_500_and_status_returns_to_idle() {
    let st = Arc::new(state::AppState::new(Runner::new(Arc::new(PanickingBuilder))));
    let router = routes::build_router(st);

    let (status, body) = call(router.clone(), invoke("{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .starts_with("pass task failed"));

    let (_, body) = call(router.clone(), get("/v1/status")).await;
    let snap = parse_json(body);
    assert_eq!(snap["state"], "idle");
    assert_eq!(snap["passes_run"], 1);
    assert!(snap["last_error"]
        .as_str()
        .unwrap()
        .contains("pass task failed"));

    // guard was released; the next trigger is not refused as busy
    let (status, _) = call(router, invoke("{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
