use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let pool = state.dispatcher.pool();
    Json(json!({
        "status": if pool.is_shutdown() { "shutting_down" } else { "ok" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "tesseract-dispatcher",
        "version": env!("CARGO_PKG_VERSION"),
        "pool": {
            "liveWorkers": pool.live_workers(),
            "queued": pool.queued(),
        }
    }))
}
