use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// How submitted credentials are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Static id -> {secret, role} map baked into the client.
    Demo,
    /// Remote `pocket_users.json` allow-list, id + active status. Falls back
    /// to the built-in list while the file cannot be fetched.
    AllowList,
    /// Built-in allow-list only (offline).
    Seeded,
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "demo" | "static" => Ok(AuthMode::Demo),
            "allowlist" | "whitelist" | "remote" => Ok(AuthMode::AllowList),
            "seeded" | "seed" | "local" => Ok(AuthMode::Seeded),
            other => bail!("Unknown AUTH_MODE: {other} (expected demo, allowlist or seeded)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Bot API base, e.g. `http://host:8080/api`. Signal, result, status, ML and chart live here.
    pub api_base_url: String,
    /// Where the static site files (`pocket_users.json`, `trade_history.json`, `system_log.json`) are served.
    pub site_base_url: String,
    /// Bot root used by the data mirror (`/api/latest_full.json`).
    pub bot_api_url: String,
    pub poll_interval_ms: u64,
    pub fetch_timeout_secs: u64,
    /// `trade_history.json` on current deployments, `last_history.json` on older ones.
    pub history_file: String,
    pub history_limit: usize,
    pub log_tail_chars: usize,
    pub auth_mode: AuthMode,
    pub session_db: String,
    pub export_path: String,
}

impl DashboardConfig {
    /// Load config from a specific .env file, or the default `.env` if None.
    pub fn from_env_file(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                dotenvy::from_filename(p).with_context(|| format!("Load config file {p}"))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::build_from_env()
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::build_from_env()
    }

    fn build_from_env() -> Result<Self> {
        let poll_interval_ms: u64 = env_parse("POLL_INTERVAL_MS", "15000")?;
        if poll_interval_ms == 0 {
            bail!("POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            api_base_url: trim_base(&env("API_BASE_URL", "http://127.0.0.1:8080/api")),
            site_base_url: trim_base(&env("SITE_BASE_URL", "http://127.0.0.1:8000")),
            bot_api_url: trim_base(&env("BOT_API_URL", "http://127.0.0.1:8080")),
            poll_interval_ms,
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", "10")?,
            history_file: env("HISTORY_FILE", "trade_history.json"),
            history_limit: env_parse("HISTORY_LIMIT", "10")?,
            log_tail_chars: env_parse("LOG_TAIL_CHARS", "3000")?,
            auth_mode: env("AUTH_MODE", "demo").parse()?,
            session_db: env("SESSION_DB", "aspire_session.db"),
            export_path: env("EXPORT_PATH", "pocket_users.json"),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn api_url(&self, file: &str) -> String {
        format!("{}/{}", self.api_base_url, file)
    }

    pub fn site_url(&self, file: &str) -> String {
        format!("{}/{}", self.site_base_url, file)
    }

    pub fn users_url(&self) -> String {
        self.site_url("pocket_users.json")
    }

    /// Config pointing both bases at one server; used by tests and local setups.
    pub fn local(base: &str) -> Self {
        let base = trim_base(base);
        Self {
            api_base_url: format!("{base}/api"),
            site_base_url: base.clone(),
            bot_api_url: base,
            poll_interval_ms: 15_000,
            fetch_timeout_secs: 5,
            history_file: "trade_history.json".to_string(),
            history_limit: 10,
            log_tail_chars: 3000,
            auth_mode: AuthMode::Demo,
            session_db: ":memory:".to_string(),
            export_path: "pocket_users.json".to_string(),
        }
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let val = env(key, default);
    val.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {val} ({e})"))
}
