use std::sync::Arc;

use vs_console::api::ApiClient;
use vs_console::app::ConsoleApp;
use vs_console::config::Config;
use vs_console::poller::EventPoller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        interval_ms = config.poll_interval.as_millis() as u64,
        limit = config.poll_limit,
        "Starting Team Assistant VS Console"
    );

    let client = Arc::new(ApiClient::new(&config.api_url));
    let poller = EventPoller::new(client.clone(), config.poll_interval, config.poll_limit);

    let mut app = ConsoleApp::new(client, poller);
    app.run().await
}
