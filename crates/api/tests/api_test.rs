use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use tesseract_api::{create_app, AppState};
use tesseract_core::{DispatcherConfig, LogStatus};
use tesseract_dispatcher::{DispatchOutcome, DispatchRepositories, TriggerDispatcher};
use tesseract_testing_utils::{MockExecutorTransport, MockRepositories};

struct TestApp {
    app: Router,
    repos: MockRepositories,
    dispatcher: Arc<TriggerDispatcher>,
    transport: MockExecutorTransport,
}

fn test_app() -> TestApp {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    let dispatcher = Arc::new(TriggerDispatcher::new(
        DispatchRepositories {
            triggers: repos.triggers.clone(),
            jobs: repos.jobs.clone(),
            executors: repos.executors.clone(),
            endpoints: repos.endpoints.clone(),
            logs: repos.logs.clone(),
            fired: repos.fired.clone(),
        },
        Arc::new(transport.clone()),
        &DispatcherConfig {
            core_workers: 2,
            max_workers: 4,
            queue_capacity: 16,
            keep_alive_seconds: 1,
            shutdown_timeout_seconds: 5,
        },
    ));

    let app = create_app(AppState {
        dispatcher: dispatcher.clone(),
        log_repo: repos.logs.clone(),
    });

    TestApp {
        app,
        repos,
        dispatcher,
        transport,
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = test_app();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pool"]["liveWorkers"], 2);
}

#[tokio::test]
async fn test_success_callback_resolves_once() {
    let t = test_app();
    let (trigger, endpoints) = t
        .repos
        .seed_dispatchable("nightly", "hash", &["w:1"])
        .await
        .unwrap();

    let DispatchOutcome::Pending(log) = t.dispatcher.dispatch_one(trigger.clone(), false).await
    else {
        panic!("expected pending");
    };

    let callback = json!({
        "triggerId": trigger.id,
        "executorDetailId": endpoints[0].id,
        "logId": log.id,
        "status": "SUCCESS",
        "message": "done in 3s"
    });

    let (status, body) = post_json(&t.app, "/tesseract-admin/callback", callback.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["resolved"], true);

    let stored = t.repos.store.log(log.id).unwrap();
    assert_eq!(stored.status, LogStatus::Success);
    assert_eq!(stored.message, "done in 3s");
    assert!(stored.end_time.is_some());
    assert_eq!(t.repos.store.fired_count(), 0);

    let (status, body) = post_json(&t.app, "/tesseract-admin/callback", callback).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resolved"], false);
}

#[tokio::test]
async fn test_fail_callback() {
    let t = test_app();
    let (trigger, endpoints) = t
        .repos
        .seed_dispatchable("flaky", "hash", &["w:1"])
        .await
        .unwrap();
    let DispatchOutcome::Pending(log) = t.dispatcher.dispatch_one(trigger.clone(), false).await
    else {
        panic!("expected pending");
    };

    let (status, body) = post_json(
        &t.app,
        "/tesseract-admin/callback",
        json!({
            "triggerId": trigger.id,
            "executorDetailId": endpoints[0].id,
            "logId": log.id,
            "status": "FAIL"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resolved"], true);

    let stored = t.repos.store.log(log.id).unwrap();
    assert_eq!(stored.status, LogStatus::Fail);
    assert_eq!(stored.message, "executor reported failure");
}

#[tokio::test]
async fn test_callback_for_unknown_log() {
    let t = test_app();
    let (status, body) = post_json(
        &t.app,
        "/tesseract-admin/callback",
        json!({
            "triggerId": 1,
            "executorDetailId": 1,
            "logId": 404,
            "status": "SUCCESS"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "LOG_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_callback_rejected() {
    let t = test_app();
    let (status, _) = post_json(
        &t.app,
        "/tesseract-admin/callback",
        json!({"logId": 1, "status": "MAYBE"}),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_dispatch_endpoint_accepts_batch() {
    let t = test_app();
    let (a, _) = t.repos.seed_dispatchable("a", "hash", &["w:1"]).await.unwrap();
    let (b, _) = t.repos.seed_dispatchable("b", "random", &["w:2", "w:3"]).await.unwrap();

    let (status, body) = post_json(
        &t.app,
        "/tesseract-admin/dispatch",
        json!({"triggerIds": [a.id, b.id, 999], "once": true}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["requested"], 3);
    assert_eq!(body["data"]["found"], 2);

    t.dispatcher.shutdown().await;
    assert_eq!(t.transport.request_count(), 2);
    assert_eq!(t.repos.store.log_count(), 2);
    assert_eq!(t.repos.store.fired_count(), 2);
}

#[tokio::test]
async fn test_dispatch_endpoint_rejects_empty_batch() {
    let t = test_app();
    let (status, body) = post_json(
        &t.app,
        "/tesseract-admin/dispatch",
        json!({"triggerIds": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_dispatch_after_shutdown_unavailable() {
    let t = test_app();
    t.dispatcher.shutdown().await;
    let (status, _) = post_json(
        &t.app,
        "/tesseract-admin/dispatch",
        json!({"triggerIds": [1]}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
