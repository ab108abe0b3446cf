use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::AppState;

#[derive(Deserialize)]
pub struct RelayQuery {
    /// Absolute http(s) URL of the JSON document to fetch.
    pub url: Option<String>,
}

fn reject(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": msg.into() })))
}

/// GET /proxy?url=<upstream>
///
/// Fetches the upstream JSON and re-serves it so browser dashboards can read
/// bot endpoints that do not send CORS headers themselves.
pub async fn relay(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<RelayQuery>,
) -> impl IntoResponse {
    if let Err(msg) = state.rate_limiter.check_ip_limit(&peer.ip().to_string()) {
        warn!("Rate limited {}: {}", peer.ip(), msg);
        return reject(StatusCode::TOO_MANY_REQUESTS, msg);
    }

    let Some(raw) = params.url.filter(|u| !u.trim().is_empty()) else {
        return reject(StatusCode::BAD_REQUEST, "Missing url parameter");
    };

    let upstream = match Url::parse(raw.trim()) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u,
        Ok(u) => {
            return reject(
                StatusCode::BAD_REQUEST,
                format!("Unsupported scheme: {}", u.scheme()),
            )
        }
        Err(e) => return reject(StatusCode::BAD_REQUEST, format!("Invalid url: {e}")),
    };

    if !state.upstreams.permits(upstream.as_str()) {
        warn!("Blocked upstream {} for {}", upstream, peer.ip());
        return reject(StatusCode::FORBIDDEN, "Upstream not allowed");
    }

    let resp = match state.client.get(upstream.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!("Upstream {} unreachable: {}", upstream, e);
            return reject(StatusCode::BAD_GATEWAY, "Upstream unreachable");
        }
    };

    let status = resp.status();
    if !status.is_success() {
        warn!("Upstream {} returned {}", upstream, status);
        return reject(
            StatusCode::BAD_GATEWAY,
            format!("Upstream returned {}", status.as_u16()),
        );
    }

    match resp.json::<Value>().await {
        Ok(body) => {
            debug!("Relayed {} to {}", upstream, peer.ip());
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            warn!("Upstream {} sent invalid JSON: {}", upstream, e);
            reject(StatusCode::BAD_GATEWAY, "Upstream did not return JSON")
        }
    }
}
