use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Account role, gates which dashboard a session may open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
        }
    }
}

/// Signal expiry: the bot sends either minutes as a number or a preformatted label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expiry {
    Minutes(f64),
    Label(String),
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Minutes(m) if m.fract() == 0.0 => write!(f, "{m:.0} min"),
            Expiry::Minutes(m) => write!(f, "{m} min"),
            Expiry::Label(s) => f.write_str(s),
        }
    }
}

/// Current trading signal (`last_signal.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default, deserialize_with = "lenient")]
    pub pair: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<Direction>,
    #[serde(default, alias = "entryPrice", deserialize_with = "lenient")]
    pub entry_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub expiry: Option<Expiry>,
    #[serde(default, deserialize_with = "confidence")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(default, alias = "timeLeftSec", alias = "time_left", deserialize_with = "lenient")]
    pub time_left_sec: Option<i64>,
}

/// Last closed trade (`last_result.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeResult {
    #[serde(default, deserialize_with = "lenient")]
    pub pair: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<Direction>,
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<Outcome>,
    #[serde(default, alias = "entryPrice", deserialize_with = "lenient")]
    pub entry_price: Option<f64>,
    #[serde(default, alias = "exitPrice", deserialize_with = "lenient")]
    pub exit_price: Option<f64>,
    #[serde(default, alias = "time", alias = "last_updated", deserialize_with = "lenient")]
    pub timestamp: Option<String>,
}

/// One row of `trade_history.json`, oldest first on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub pair: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<Direction>,
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<Outcome>,
    #[serde(default, alias = "timestamp", deserialize_with = "lenient")]
    pub time: Option<String>,
}

/// Aggregate counters (`system_status.json`). Unknown counters pass through in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default, alias = "totalTrades", deserialize_with = "lenient")]
    pub total_trades: Option<u64>,
    #[serde(default, alias = "winRate", deserialize_with = "lenient")]
    pub win_rate: Option<f64>,
    #[serde(default, alias = "activeUsers", deserialize_with = "lenient")]
    pub active_users: Option<u64>,
    #[serde(default, alias = "mlAccuracy", deserialize_with = "lenient")]
    pub ml_accuracy: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A fetched body after schema normalization.
///
/// Bodies carrying a non-null `error` field are `Empty` regardless of any
/// other field present.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Data(T),
    Empty(String),
}

impl<T: DeserializeOwned> Payload<T> {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if let Some(reason) = error_field(&value) {
            return Ok(Payload::Empty(reason));
        }
        serde_json::from_value(value).map(Payload::Data)
    }
}

impl<T> Payload<T> {
    pub fn data(self) -> Option<T> {
        match self {
            Payload::Data(d) => Some(d),
            Payload::Empty(_) => None,
        }
    }
}

fn error_field(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Deserialize an optional field, treating a value of the wrong shape as missing.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like [`lenient`], but a missing or misshapen value becomes `T::default()`.
pub(crate) fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

fn confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = lenient(deserializer)?;
    Ok(raw.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 10.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_field_wins_over_data() {
        let body = json!({"error": "no signal", "pair": "EURUSD", "direction": "BUY"});
        let p: Payload<Signal> = Payload::from_value(body).unwrap();
        assert_eq!(p.data().map(|s| s.pair), None);
    }

    #[test]
    fn test_null_error_is_data() {
        let body = json!({"error": null, "pair": "EURUSD"});
        let p: Payload<Signal> = Payload::from_value(body).unwrap();
        assert_eq!(p.data().unwrap().pair.as_deref(), Some("EURUSD"));
    }

    #[test]
    fn test_signal_lenient_fields() {
        let body = json!({
            "pair": "GBPJPY",
            "direction": "SIDEWAYS",
            "entryPrice": 185.634,
            "expiry": 2,
            "confidence": 14,
            "source": 42
        });
        let s: Signal = serde_json::from_value(body).unwrap();
        assert_eq!(s.pair.as_deref(), Some("GBPJPY"));
        assert_eq!(s.direction, None);
        assert_eq!(s.entry_price, Some(185.634));
        assert_eq!(s.expiry.unwrap().to_string(), "2 min");
        assert_eq!(s.confidence, Some(10.0));
        assert_eq!(s.source, None);
    }

    #[test]
    fn test_expiry_label() {
        let s: Signal = serde_json::from_value(json!({"expiry": "M5"})).unwrap();
        assert_eq!(s.expiry, Some(Expiry::Label("M5".into())));
    }

    #[test]
    fn test_system_status_extras_pass_through() {
        let st: SystemStatus = serde_json::from_value(json!({
            "total_trades": 1270,
            "win_rate": 77.5,
            "total_wins": 985,
            "status": "LIVE"
        }))
        .unwrap();
        assert_eq!(st.total_trades, Some(1270));
        assert_eq!(st.active_users, None);
        assert_eq!(st.extra.get("status"), Some(&json!("LIVE")));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
