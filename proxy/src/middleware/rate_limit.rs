use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fixed one-minute request window per client IP.
#[derive(Clone)]
pub struct RateLimiter {
    /// IP address -> (count, window_start)
    ip_minute: Arc<DashMap<String, (u32, DateTime<Utc>)>>,
    pub max_requests_per_ip_per_minute: u32,
}

impl RateLimiter {
    pub fn new(max_requests_per_ip_per_minute: u32) -> Self {
        Self {
            ip_minute: Arc::new(DashMap::new()),
            max_requests_per_ip_per_minute,
        }
    }

    /// Count one request from `ip`. Returns the count so far in this window,
    /// or the message to send back once the limit is reached.
    pub fn check_ip_limit(&self, ip: &str) -> Result<u32, String> {
        self.check_at(ip, Utc::now())
    }

    fn check_at(&self, ip: &str, now: DateTime<Utc>) -> Result<u32, String> {
        let mut entry = self.ip_minute.entry(ip.to_string()).or_insert((0, now));

        if (now - entry.1).num_seconds() >= 60 {
            entry.0 = 0;
            entry.1 = now;
        }

        if entry.0 >= self.max_requests_per_ip_per_minute {
            return Err(format!(
                "Rate limit of {} requests/minute exceeded",
                self.max_requests_per_ip_per_minute
            ));
        }

        entry.0 += 1;
        Ok(entry.0)
    }

    pub fn tracked(&self) -> usize {
        self.ip_minute.len()
    }

    /// Drop windows older than two minutes.
    pub fn cleanup_stale_entries(&self) {
        let now = Utc::now();
        self.ip_minute
            .retain(|_, (_, window_start)| (now - *window_start).num_seconds() < 120);
    }
}

/// Background loop that keeps the limiter map from growing without bound.
pub async fn run_sweeper(limiter: RateLimiter, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let before = limiter.tracked();
        limiter.cleanup_stale_entries();
        debug!("Rate limiter sweep: {} -> {} tracked IPs", before, limiter.tracked());
    }
}
