//! End-to-end checks against a local fixture server standing in for the bot API.

use aspire_dashboard::app::{AppContext, View};
use aspire_dashboard::auth::{AuthError, CredentialCheck, Credentials, LoginError};
use aspire_dashboard::config::{AuthMode, DashboardConfig};
use aspire_dashboard::fetcher::{FetchError, JsonFetcher};
use aspire_dashboard::session::{Route, Session, SessionStore};
use aspire_dashboard::storage::KvStore;
use aspire_dashboard::types::{Payload, Role, Signal};
use aspire_dashboard::view::{Body, Section, SectionView};
use aspire_dashboard::mirror;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Fixture {
    signal: Arc<Mutex<Value>>,
    seen_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    users_delay_ms: u64,
}

async fn last_signal(
    State(fx): State<Fixture>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    fx.seen_queries.lock().unwrap().push(q);
    let body = fx.signal.lock().unwrap().clone();
    Json(body)
}

async fn pocket_users(State(fx): State<Fixture>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(fx.users_delay_ms)).await;
    Json(json!({
        "69662105": {"name": "Admin", "role": "admin", "status": "active"},
        "1001": {"name": "Trader", "role": "user", "status": "active"},
        "1002": {"name": "Paused", "role": "user", "status": "blocked"}
    }))
}

async fn serve(fx: Fixture) -> String {
    let history: Vec<Value> = (1..=14)
        .map(|i| json!({"pair": format!("PAIR{i}"), "direction": "BUY", "result": "WIN", "time": format!("10:{i:02}")}))
        .collect();
    let log = format!("{}TAIL-MARKER", "x".repeat(4000));

    let app = Router::new()
        .route("/api/last_signal.json", get(last_signal))
        .route(
            "/api/last_result.json",
            get(|| async {
                Json(json!({"pair": "GBPJPY", "result": "LOSS", "entry_price": 185.634, "exit_price": 185.7}))
            }),
        )
        .route(
            "/api/system_status.json",
            get(|| async { Json(json!({"total_trades": 1270, "win_rate": 77.5, "status": "LIVE"})) }),
        )
        .route(
            "/api/ml_info.json",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .route("/trade_history.json", get(move || async move { Json(Value::Array(history)) }))
        .route("/system_log.json", get(move || async move { log }))
        .route("/pocket_users.json", get(pocket_users))
        .route(
            "/api/latest_full.json",
            get(|| async {
                Json(json!({
                    "signal": {"pair": "AUDCAD", "direction": "SELL"},
                    "result": {"pair": "EURJPY", "result": "WIN"},
                    "system": {"win_rate": 80.0}
                }))
            }),
        )
        .route("/broken.json", get(|| async { "{not json" }))
        .with_state(fx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn session(role: Role) -> Session {
    Session {
        pocket_id: "69662105".into(),
        role,
        name: "Admin".into(),
        authenticated: true,
    }
}

async fn wait_for(ctx: &AppContext, section: Section) -> SectionView {
    for _ in 0..200 {
        if let Some(v) = ctx.page().get(section).await {
            return v;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{section:?} never rendered");
}

#[tokio::test]
async fn trader_view_renders_every_section() {
    let fx = Fixture::default();
    *fx.signal.lock().unwrap() = json!({"error": "no signal", "pair": "EURUSD"});
    let base = serve(fx.clone()).await;

    let mut ctx = AppContext::create(DashboardConfig::local(&base)).unwrap();
    ctx.start(View::Trader, &session(Role::User)).await.unwrap();

    let signal = wait_for(&ctx, Section::Signal).await;
    assert_eq!(signal.placeholder_text(), Some("No active signals"));

    let result = wait_for(&ctx, Section::Result).await;
    assert_eq!(result.field("Result"), Some("LOSS"));
    assert_eq!(result.field("Exit"), Some("185.70000"));
    assert_eq!(result.field("Direction"), Some("—"));

    let stats = wait_for(&ctx, Section::Stats).await;
    assert_eq!(stats.field("Trades"), Some("1270"));
    assert_eq!(stats.field("Active users"), Some("—"));

    let history = wait_for(&ctx, Section::History).await;
    let Body::Table { rows, .. } = history.body else { panic!("expected table") };
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0][1], "PAIR14");
    assert_eq!(rows[9][1], "PAIR5");

    let chart = wait_for(&ctx, Section::Chart).await;
    let Body::Image { src } = chart.body else { panic!("expected image") };
    assert!(src.starts_with(&format!("{base}/api/chart.png?t=")));

    assert!(fx.seen_queries.lock().unwrap().iter().all(|q| q.contains_key("t")));
    ctx.dispose().await;
}

#[tokio::test]
async fn each_tick_fully_replaces_a_section() {
    let fx = Fixture::default();
    *fx.signal.lock().unwrap() = json!({"pair": "EURUSD", "direction": "BUY", "confidence": 8});
    let base = serve(fx.clone()).await;

    let mut cfg = DashboardConfig::local(&base);
    cfg.poll_interval_ms = 100;
    let mut ctx = AppContext::create(cfg).unwrap();
    ctx.start(View::Trader, &session(Role::User)).await.unwrap();

    let first = wait_for(&ctx, Section::Signal).await;
    assert_eq!(first.field("Confidence"), Some("8/10"));

    *fx.signal.lock().unwrap() = json!({"error": "expired"});
    let mut replaced = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let v = ctx.page().get(Section::Signal).await.unwrap();
        if v.is_placeholder() {
            replaced = Some(v);
            break;
        }
    }
    let replaced = replaced.expect("signal never switched to placeholder");
    assert_eq!(replaced.field("Pair"), None);
    assert!(ctx.ticks() >= 2);
    ctx.dispose().await;
}

#[tokio::test]
async fn admin_view_degrades_per_section() {
    let base = serve(Fixture::default()).await;
    let mut ctx = AppContext::create(DashboardConfig::local(&base)).unwrap();
    ctx.start(View::Admin, &session(Role::Admin)).await.unwrap();

    let ml = wait_for(&ctx, Section::MlInfo).await;
    assert_eq!(ml.placeholder_text(), Some("Error loading ML data."));

    let users = wait_for(&ctx, Section::Whitelist).await;
    let Body::Table { rows, footer, .. } = users.body else { panic!("expected table") };
    assert_eq!(rows.len(), 3);
    assert_eq!(footer.as_deref(), Some("3 total | 1 admin(s) | 2 active | 2 user(s)"));

    let logs = wait_for(&ctx, Section::Logs).await;
    let Body::Text(text) = logs.body else { panic!("expected text") };
    assert_eq!(text.chars().count(), 3000);
    assert!(text.ends_with("TAIL-MARKER"));

    let system = wait_for(&ctx, Section::System).await;
    assert!(matches!(system.body, Body::Text(ref t) if t.contains("\"LIVE\"")));
    ctx.dispose().await;
}

#[tokio::test]
async fn switching_views_drops_late_renders_of_the_old_view() {
    let fx = Fixture {
        users_delay_ms: 300,
        ..Default::default()
    };
    let base = serve(fx).await;
    let mut ctx = AppContext::create(DashboardConfig::local(&base)).unwrap();

    ctx.start(View::Admin, &session(Role::Admin)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.start(View::Trader, &session(Role::Admin)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;

    let shown: Vec<Section> = ctx.page().snapshot().await.iter().map(|v| v.section).collect();
    assert_eq!(ctx.view(), Some(View::Trader));
    assert!(!shown.is_empty());
    for section in shown {
        assert!(View::Trader.sections().contains(&section), "{section:?} leaked into trader view");
    }
    ctx.dispose().await;
}

#[tokio::test]
async fn fetcher_classifies_failures() {
    let fx = Fixture::default();
    *fx.signal.lock().unwrap() = json!({"error": "none"});
    let base = serve(fx).await;
    let fetcher = JsonFetcher::new(Duration::from_secs(5)).unwrap();

    assert_eq!(
        fetcher.fetch_json::<Value>(&format!("{base}/api/ml_info.json")).await.unwrap_err(),
        FetchError::Status(500)
    );
    assert!(matches!(
        fetcher.fetch_json::<Value>(&format!("{base}/broken.json")).await.unwrap_err(),
        FetchError::Decode(_)
    ));
    assert_eq!(
        fetcher.fetch_json::<Value>(&format!("{base}/missing.json")).await.unwrap_err(),
        FetchError::Status(404)
    );

    let payload = fetcher
        .fetch_payload::<Signal>(&format!("{base}/api/last_signal.json"))
        .await
        .unwrap();
    assert!(matches!(payload, Payload::Empty(ref reason) if reason == "none"));
    assert_eq!(payload.data().map(|s| s.pair), None);
}

#[tokio::test]
async fn remote_allow_list_login() {
    let base = serve(Fixture::default()).await;
    let mut cfg = DashboardConfig::local(&base);
    cfg.auth_mode = AuthMode::AllowList;
    let ctx = AppContext::create(cfg).unwrap();
    let check = CredentialCheck::from_config(ctx.config(), ctx.fetcher());
    let sessions = SessionStore::new(KvStore::in_memory().unwrap());

    let admin = check
        .check(&Credentials::new("69662105", None, Role::User))
        .await
        .unwrap();
    assert_eq!(sessions.login(&admin).unwrap(), Route::Admin);

    let sessions = SessionStore::new(KvStore::in_memory().unwrap());
    let err = check
        .check(&Credentials::new("555", None, Role::User))
        .await
        .unwrap_err();
    assert_eq!(err, LoginError::Auth(AuthError::NotFound("555".into())));
    assert!(sessions.current().unwrap().is_none());

    let err = check
        .check(&Credentials::new("1002", None, Role::User))
        .await
        .unwrap_err();
    assert_eq!(err, LoginError::Auth(AuthError::Inactive("1002".into())));
}

#[tokio::test]
async fn mirror_writes_static_files() {
    let base = serve(Fixture::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = JsonFetcher::new(Duration::from_secs(5)).unwrap();

    let files = mirror::run(&fetcher, &base, dir.path()).await.unwrap();
    assert_eq!(files.source, mirror::FeedSource::LiveBot);
    assert_eq!(files.last_signal["pair"], "AUDCAD");
    assert_eq!(files.system_status["win_rate"], 80.0);
    assert!(dir.path().join(mirror::RESULT_FILE).exists());
}
