//! Per-section formatters. Inputs are already normalized; these only lay out fields.

use super::{Body, Section, GLYPH, UNKNOWN};
use crate::types::{HistoryRecord, Signal, SystemStatus, TradeResult};
use crate::whitelist::AllowList;
use serde_json::Value;
use std::fmt::Display;

fn or_glyph<T: Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| GLYPH.to_string())
}

fn or_unknown<T: Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| UNKNOWN.to_string())
}

/// Fixed-precision number, or the glyph for missing/NaN/inf.
pub fn number(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(n) if n.is_finite() => format!("{n:.decimals$}"),
        _ => GLYPH.to_string(),
    }
}

/// Number with trailing zeros trimmed, as the bot writes them.
fn plain(v: Option<f64>) -> String {
    match v {
        Some(n) if n.is_finite() => n.to_string(),
        _ => GLYPH.to_string(),
    }
}

fn percent(v: Option<f64>) -> String {
    match v {
        Some(n) if n.is_finite() => format!("{}%", (n * 100.0).round() / 100.0),
        _ => GLYPH.to_string(),
    }
}

fn countdown(secs: Option<i64>) -> String {
    match secs {
        Some(s) if s >= 0 => format!("{}:{:02}", s / 60, s % 60),
        _ => GLYPH.to_string(),
    }
}

pub fn signal(s: Signal) -> Body {
    let confidence = match s.confidence {
        Some(c) => format!("{}/10", (c * 10.0).round() / 10.0),
        None => format!("{UNKNOWN}/10"),
    };
    Body::Fields(vec![
        ("Pair", or_glyph(s.pair)),
        ("Direction", or_glyph(s.direction)),
        ("Entry", plain(s.entry_price)),
        ("Expiry", or_glyph(s.expiry)),
        ("Confidence", confidence),
        ("Source", or_unknown(s.source)),
        ("Time left", countdown(s.time_left_sec)),
    ])
}

pub fn result(r: TradeResult) -> Body {
    Body::Fields(vec![
        ("Pair", or_glyph(r.pair)),
        ("Direction", or_glyph(r.direction)),
        ("Result", or_glyph(r.result)),
        ("Entry", number(r.entry_price, 5)),
        ("Exit", number(r.exit_price, 5)),
        ("Time", or_glyph(r.timestamp)),
    ])
}

pub fn stats(st: SystemStatus) -> Body {
    Body::Fields(vec![
        ("Trades", or_glyph(st.total_trades)),
        ("Win rate", percent(st.win_rate)),
        ("Active users", or_glyph(st.active_users)),
        ("ML accuracy", percent(st.ml_accuracy)),
    ])
}

pub fn chart(src: String) -> Body {
    Body::Image { src }
}

/// Keep the last `limit` items, newest first.
pub fn recent_first<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    let start = items.len().saturating_sub(limit);
    let mut recent = items.split_off(start);
    recent.reverse();
    recent
}

pub fn history(records: Vec<HistoryRecord>, limit: usize) -> Body {
    let recent = recent_first(records, limit);
    if recent.is_empty() {
        return Body::Placeholder(Section::History.no_data().to_string());
    }
    let rows = recent
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            vec![
                (i + 1).to_string(),
                or_glyph(t.pair),
                or_glyph(t.direction),
                or_glyph(t.result),
                or_glyph(t.time),
            ]
        })
        .collect();
    Body::Table {
        header: vec!["#", "Pair", "Direction", "Result", "Time"],
        rows,
        footer: None,
    }
}

pub fn whitelist(list: AllowList) -> Body {
    if list.is_empty() {
        return Body::Placeholder(Section::Whitelist.no_data().to_string());
    }
    let stats = list.stats();
    let rows = list
        .iter()
        .map(|e| {
            vec![
                e.id.clone(),
                if e.name.is_empty() { GLYPH.to_string() } else { e.name.clone() },
                e.role.to_string(),
                if e.status.is_empty() { GLYPH.to_string() } else { e.status.clone() },
                or_glyph(e.telegram_id),
                or_glyph(e.registered_at.as_deref()),
            ]
        })
        .collect();
    Body::Table {
        header: vec!["Pocket ID", "Name", "Role", "Status", "Telegram", "Registered"],
        rows,
        footer: Some(format!(
            "{} total | {} admin(s) | {} active | {} user(s)",
            stats.total_users, stats.admins, stats.active_users, stats.users
        )),
    }
}

/// Opaque payloads (ML info, raw status, raw signal) are shown pretty-printed.
pub fn json(value: Value) -> Body {
    match serde_json::to_string_pretty(&value) {
        Ok(text) => Body::Text(text),
        Err(_) => Body::Text(value.to_string()),
    }
}

/// Last `n` characters of `text`, never splitting a UTF-8 sequence.
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

pub fn logs(text: String, tail: usize) -> Body {
    let shown = tail_chars(&text, tail);
    if shown.trim().is_empty() {
        return Body::Placeholder(Section::Logs.no_data().to_string());
    }
    Body::Text(shown.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Outcome};

    #[test]
    fn test_signal_missing_fields_render_placeholders() {
        let body = signal(Signal {
            pair: Some("EURUSD".into()),
            ..Default::default()
        });
        let Body::Fields(fields) = body else { panic!("expected fields") };
        let get = |l: &str| fields.iter().find(|(k, _)| *k == l).unwrap().1.clone();
        assert_eq!(get("Pair"), "EURUSD");
        assert_eq!(get("Direction"), GLYPH);
        assert_eq!(get("Entry"), GLYPH);
        assert_eq!(get("Confidence"), "?/10");
        assert_eq!(get("Source"), "?");
        assert_eq!(get("Time left"), GLYPH);
        assert_eq!(fields.len(), 7);
    }

    #[test]
    fn test_result_prices_five_decimals() {
        let body = result(TradeResult {
            pair: Some("GBPJPY".into()),
            direction: Some(Direction::Sell),
            result: Some(Outcome::Win),
            entry_price: Some(185.634),
            exit_price: Some(f64::NAN),
            timestamp: None,
        });
        let Body::Fields(fields) = body else { panic!("expected fields") };
        assert!(fields.contains(&("Entry", "185.63400".to_string())));
        assert!(fields.contains(&("Exit", GLYPH.to_string())));
        assert!(fields.contains(&("Result", "WIN".to_string())));
        assert!(!fields.iter().any(|(_, v)| v.contains("NaN") || v.contains("undefined")));
    }

    #[test]
    fn test_stats_percentages() {
        let body = stats(SystemStatus {
            total_trades: Some(1270),
            win_rate: Some(77.5),
            ..Default::default()
        });
        let Body::Fields(fields) = body else { panic!("expected fields") };
        assert!(fields.contains(&("Win rate", "77.5%".to_string())));
        assert!(fields.contains(&("ML accuracy", GLYPH.to_string())));
    }

    #[test]
    fn test_recent_first_truncates_newest_first() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(recent_first(items.clone(), 10), (16..=25).rev().collect::<Vec<_>>());
        assert_eq!(recent_first(items, 6), vec![25, 24, 23, 22, 21, 20]);
        assert_eq!(recent_first(vec![1, 2], 10), vec![2, 1]);
    }

    #[test]
    fn test_history_rows_numbered() {
        let records: Vec<HistoryRecord> = (0..12)
            .map(|i| HistoryRecord {
                pair: Some(format!("P{i}")),
                ..Default::default()
            })
            .collect();
        let Body::Table { rows, .. } = history(records, 10) else { panic!("expected table") };
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][0], "1");
        assert_eq!(rows[0][1], "P11");
        assert_eq!(rows[9][1], "P2");
    }

    #[test]
    fn test_history_empty_is_placeholder() {
        assert_eq!(
            history(vec![], 10),
            Body::Placeholder("No history yet".to_string())
        );
    }

    #[test]
    fn test_tail_chars_is_char_safe() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("сигнал", 2), "ал");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_logs_tail() {
        let text = "x".repeat(5000);
        let Body::Text(shown) = logs(text, 3000) else { panic!("expected text") };
        assert_eq!(shown.len(), 3000);
        assert_eq!(logs("   \n".into(), 3000), Body::Placeholder("Log is empty".into()));
    }

    #[test]
    fn test_whitelist_footer() {
        let Body::Table { rows, footer, .. } = whitelist(AllowList::seeded()) else {
            panic!("expected table")
        };
        assert_eq!(rows[0][0], "69662105");
        assert_eq!(footer.unwrap(), "1 total | 1 admin(s) | 1 active | 0 user(s)");
    }
}
