use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Team Assistant service
    pub api_url: String,
    /// Delay between the end of one poll cycle and the start of the next
    pub poll_interval: Duration,
    /// Page size requested per poll
    pub poll_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_url: env_str("VS_API_URL", "http://localhost:8000"),
            poll_interval: Duration::from_millis(env_parse("VS_POLL_INTERVAL_MS", 3_000)?),
            poll_limit: env_parse("VS_POLL_LIMIT", trace_types::DEFAULT_POLL_LIMIT)?,
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
