use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub upstreams: UpstreamPolicy,
    pub max_requests_per_ip_per_minute: u32,
    pub upstream_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid u16")?,
            upstreams: UpstreamPolicy::parse(
                &std::env::var("ALLOWED_UPSTREAMS").unwrap_or_default(),
            ),
            max_requests_per_ip_per_minute: std::env::var("MAX_REQUESTS_PER_IP_PER_MINUTE")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("MAX_REQUESTS_PER_IP_PER_MINUTE must be a valid u32")?,
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("UPSTREAM_TIMEOUT_SECS must be a valid u64")?,
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("SWEEP_INTERVAL_SECS must be a valid u64")?,
        })
    }
}

/// URL prefixes the relay may fetch. Empty means any http(s) upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamPolicy {
    prefixes: Vec<String>,
}

impl UpstreamPolicy {
    /// Comma-separated prefixes, e.g. `http://bot:8080/api/,https://site.example/`.
    pub fn parse(raw: &str) -> Self {
        Self {
            prefixes: raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn permits(&self, url: &str) -> bool {
        self.is_open() || self.prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_policy_permits_anything() {
        let policy = UpstreamPolicy::parse("  ");
        assert!(policy.is_open());
        assert!(policy.permits("http://anywhere/x.json"));
    }

    #[test]
    fn test_prefix_policy() {
        let policy = UpstreamPolicy::parse("http://bot:8080/api/, https://site.example/");
        assert_eq!(policy.len(), 2);
        assert!(policy.permits("http://bot:8080/api/last_signal.json"));
        assert!(policy.permits("https://site.example/pocket_users.json"));
        assert!(!policy.permits("http://bot:8080/admin"));
        assert!(!policy.permits("http://evil.example/api/"));
    }
}
