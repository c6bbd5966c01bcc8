use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /health — liveness plus a few counters.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let open_relays = app.relay.len().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "startedAt": app.started_at,
        "openRelays": open_relays,
        "workDirs": {
            "enqueued": app.reaper.enqueued(),
            "deleted": app.reaper.deleted(),
        },
    }))
}
