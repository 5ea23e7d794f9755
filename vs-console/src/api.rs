//! HTTP client for the Team Assistant service
//!
//! One GET for trace events plus the fire-and-forget control endpoints.
//! Callers treat every error here as non-fatal: log it and move on.

use trace_types::{TraceEvent, TraceEventQuery};

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// No request timeout is configured: a hung call stalls its own poll
    /// cycle only, it never turns into an error.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one page of trace events matching `query`, newest-first.
    pub async fn fetch_trace_events(&self, query: &TraceEventQuery) -> Result<Vec<TraceEvent>> {
        let url = format!("{}/api/trace-events", self.base_url);

        let resp = self.client.get(&url).query(query).send().await?;
        let resp = check_status(resp).await?;
        let events: Vec<TraceEvent> = resp.json().await?;

        tracing::debug!(count = events.len(), "Fetched trace events");
        Ok(events)
    }

    /// Reset server-side state (event log and counters).
    pub async fn reset_system(&self) -> Result<()> {
        self.post_control("/api/control/reset").await
    }

    /// Begin a simulated event stream on the server.
    pub async fn start_sim(&self) -> Result<()> {
        self.post_control("/api/control/sim/start").await
    }

    /// Stop a running simulation.
    pub async fn stop_sim(&self) -> Result<()> {
        self.post_control("/api/control/sim/stop").await
    }

    // Control endpoints share a contract: POST, no body either way, only the
    // status code matters.
    async fn post_control(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self.client.post(&url).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");

        let client = ApiClient::new("http://localhost:8000");
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Api {
            status: 503,
            message: "service restarting".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 503): service restarting");
    }
}
