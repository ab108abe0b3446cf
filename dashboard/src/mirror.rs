//! Mirror the bot's combined feed into the static JSON files the dashboard polls.
//!
//! Pulls `<bot>/api/latest_full.json` and writes `system_status.json`,
//! `last_signal.json` and `last_result.json`, plus `chart.png` when the feed
//! carries a chart. Missing or `error` blocks fall back to demo payloads so the
//! site never serves an empty file.

use crate::fetcher::JsonFetcher;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SYSTEM_FILE: &str = "system_status.json";
pub const SIGNAL_FILE: &str = "last_signal.json";
pub const RESULT_FILE: &str = "last_result.json";
pub const CHART_FILE: &str = "chart.png";

/// Combined bot feed. Every block is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestFull {
    #[serde(default)]
    pub signal: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub system: Option<Value>,
    /// PNG, either bare base64 or a `data:image/png;base64,` URI.
    #[serde(default)]
    pub chart_base64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    LiveBot,
    Demo,
}

impl FeedSource {
    fn as_str(&self) -> &'static str {
        match self {
            FeedSource::LiveBot => "live_bot",
            FeedSource::Demo => "demo_data",
        }
    }
}

/// The three files, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorFiles {
    pub system_status: Value,
    pub last_signal: Value,
    pub last_result: Value,
    pub chart_png: Option<Vec<u8>>,
    pub source: FeedSource,
}

fn demo_signal() -> Map<String, Value> {
    let v = json!({
        "pair": "EURUSD",
        "direction": "BUY",
        "confidence": 8,
        "entry_price": 1.07521,
        "expiry": 2,
        "source": "ENHANCED_SMART_MONEY",
    });
    into_map(v)
}

fn demo_result() -> Map<String, Value> {
    let v = json!({
        "pair": "GBPJPY",
        "direction": "SELL",
        "result": "WIN",
        "entry_price": 185.634,
        "exit_price": 185.521,
    });
    into_map(v)
}

fn into_map(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// Object block without an `error` field, if the feed carried one.
fn usable(block: Option<&Value>) -> Option<Map<String, Value>> {
    match block {
        Some(Value::Object(m)) if m.get("error").map_or(true, Value::is_null) && !m.is_empty() => {
            Some(m.clone())
        }
        _ => None,
    }
}

/// Decode the feed's chart. A malformed chart is skipped, never fatal.
fn decode_chart(raw: Option<&str>) -> Option<Vec<u8>> {
    let raw = raw?.trim();
    let data = match raw.split_once(";base64,") {
        Some((_, data)) => data,
        None => raw,
    };
    if data.is_empty() {
        return None;
    }
    match STANDARD.decode(data) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Chart in feed is not valid base64: {e}");
            None
        }
    }
}

fn counter(system: &Map<String, Value>, key: &str, default: Value) -> Value {
    system.get(key).cloned().unwrap_or(default)
}

/// Derive the mirror files from a fetched feed, or from nothing (bot unreachable).
pub fn build(feed: Option<&LatestFull>, now: &str) -> MirrorFiles {
    let Some(feed) = feed else {
        let mut signal = demo_signal();
        signal.insert("last_updated".into(), json!(now));
        signal.insert("note".into(), json!("Demo signal"));
        let mut result = demo_result();
        result.insert("last_updated".into(), json!(now));
        result.insert("note".into(), json!("Demo result"));
        return MirrorFiles {
            system_status: json!({
                "win_rate": 78.2,
                "active_signals": 1,
                "status": "DEMO",
                "total_trades": 1270,
                "total_wins": 992,
                "total_losses": 278,
                "last_updated": now,
                "source": FeedSource::Demo.as_str(),
            }),
            last_signal: Value::Object(signal),
            last_result: Value::Object(result),
            chart_png: None,
            source: FeedSource::Demo,
        };
    };

    let system = feed
        .system
        .as_ref()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let system_status = json!({
        "win_rate": counter(&system, "win_rate", json!(77.5)),
        "active_signals": counter(&system, "active_signals", json!(1)),
        "status": counter(&system, "status", json!("LIVE")),
        "total_trades": counter(&system, "total_trades", json!(1270)),
        "total_wins": counter(&system, "total_wins", json!(985)),
        "total_losses": counter(&system, "total_losses", json!(285)),
        "last_updated": now,
        "source": FeedSource::LiveBot.as_str(),
    });

    let last_signal = match usable(feed.signal.as_ref()) {
        Some(mut m) => {
            m.insert("last_updated".into(), json!(now));
            m.insert("source".into(), json!(FeedSource::LiveBot.as_str()));
            m
        }
        None => {
            let mut m = demo_signal();
            m.insert("last_updated".into(), json!(now));
            m.insert("note".into(), json!("Demo signal - bot unavailable"));
            m
        }
    };

    let last_result = match usable(feed.result.as_ref()) {
        Some(mut m) => {
            m.insert("last_updated".into(), json!(now));
            m.insert("source".into(), json!(FeedSource::LiveBot.as_str()));
            m
        }
        None => {
            let mut m = demo_result();
            m.insert("last_updated".into(), json!(now));
            m.insert("note".into(), json!("Demo result - bot unavailable"));
            m
        }
    };

    MirrorFiles {
        system_status,
        last_signal: Value::Object(last_signal),
        last_result: Value::Object(last_result),
        chart_png: decode_chart(feed.chart_base64.as_deref()),
        source: FeedSource::LiveBot,
    }
}

impl MirrorFiles {
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).with_context(|| format!("Create {}", dir.display()))?;
        let mut written = Vec::with_capacity(3);
        for (name, value) in [
            (SYSTEM_FILE, &self.system_status),
            (SIGNAL_FILE, &self.last_signal),
            (RESULT_FILE, &self.last_result),
        ] {
            let path = dir.join(name);
            let body = serde_json::to_string_pretty(value)?;
            std::fs::write(&path, body).with_context(|| format!("Write {}", path.display()))?;
            info!("{name} saved");
            written.push(path);
        }
        if let Some(png) = &self.chart_png {
            let path = dir.join(CHART_FILE);
            std::fs::write(&path, png).with_context(|| format!("Write {}", path.display()))?;
            info!("{CHART_FILE} saved ({} bytes)", png.len());
            written.push(path);
        }
        Ok(written)
    }
}

/// Fetch the feed and write the mirror files into `out_dir`.
pub async fn run(fetcher: &JsonFetcher, bot_api_url: &str, out_dir: &Path) -> Result<MirrorFiles> {
    let url = format!("{}/api/latest_full.json", bot_api_url.trim_end_matches('/'));
    info!("Fetching bot feed from {url}");

    let feed = match fetcher.fetch_json::<LatestFull>(&url).await {
        Ok(feed) => {
            info!("Bot feed received");
            Some(feed)
        }
        Err(e) => {
            warn!("Bot unavailable ({e}); writing demo data");
            None
        }
    };

    let now = chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string();
    let files = build(feed.as_ref(), &now);
    files.write_to(out_dir)?;

    let pair = files
        .last_signal
        .get("pair")
        .and_then(|p| p.as_str())
        .unwrap_or("N/A");
    info!(
        "Mirror complete: status={} pair={} chart={}",
        files.system_status["status"],
        pair,
        files.chart_png.is_some()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2026-01-01T00:00:00";

    #[test]
    fn test_unreachable_bot_yields_demo_set() {
        let files = build(None, NOW);
        assert_eq!(files.source, FeedSource::Demo);
        assert_eq!(files.system_status["status"], "DEMO");
        assert_eq!(files.last_signal["pair"], "EURUSD");
        assert_eq!(files.last_result["result"], "WIN");
        assert_eq!(files.last_signal["last_updated"], NOW);
    }

    #[test]
    fn test_live_feed_passes_blocks_through() {
        let feed: LatestFull = serde_json::from_value(json!({
            "signal": {"pair": "AUDCAD", "direction": "SELL", "confidence": 7},
            "result": {"error": "no trades"},
            "system": {"win_rate": 81.0, "status": "LIVE", "total_trades": 10}
        }))
        .unwrap();
        let files = build(Some(&feed), NOW);

        assert_eq!(files.source, FeedSource::LiveBot);
        assert_eq!(files.last_signal["pair"], "AUDCAD");
        assert_eq!(files.last_signal["source"], "live_bot");
        assert_eq!(files.last_result["pair"], "GBPJPY");
        assert_eq!(files.last_result["note"], "Demo result - bot unavailable");
        assert_eq!(files.system_status["win_rate"], 81.0);
        assert_eq!(files.system_status["total_wins"], 985);
        assert_eq!(files.chart_png, None);
    }

    #[test]
    fn test_chart_decoded_from_data_uri() {
        let png = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let feed = LatestFull {
            chart_base64: Some(uri),
            ..Default::default()
        };
        let files = build(Some(&feed), NOW);
        assert_eq!(files.chart_png.as_deref(), Some(&png[..]));

        let dir = tempfile::tempdir().unwrap();
        let written = files.write_to(dir.path()).unwrap();
        assert_eq!(written.len(), 4);
        assert_eq!(std::fs::read(dir.path().join(CHART_FILE)).unwrap(), png);
    }

    #[test]
    fn test_bad_chart_is_skipped() {
        let feed = LatestFull {
            chart_base64: Some("not base64 at all!".into()),
            ..Default::default()
        };
        let files = build(Some(&feed), NOW);
        assert_eq!(files.chart_png, None);
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(files.write_to(dir.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let written = build(None, NOW).write_to(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        let signal: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SIGNAL_FILE)).unwrap())
                .unwrap();
        assert_eq!(signal["direction"], "BUY");
    }
}
