use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let upstreams = if state.upstreams.is_open() {
        "any".to_string()
    } else {
        state.upstreams.len().to_string()
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "upstreams": upstreams,
    }))
}
