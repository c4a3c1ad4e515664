use std::sync::Arc;

use anyhow::Context;
use chat_cli::config::LOG_ENV;
use chat_cli::{ChatApp, CliConfig};
use gateway_api::GatewayClient;
use stream_chat::StreamRuntime;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = CliConfig::from_env().context("failed to load configuration")?;
    let client = GatewayClient::new(config.gateway.clone())
        .context("failed to initialize gateway client")?;
    tracing::debug!(base_url = %config.gateway.base_url, "gateway client ready");

    let runtime = StreamRuntime::new(Arc::new(client.clone()))
        .with_system_prompt(&config.system_prompt);
    let app = ChatApp::new(runtime, Arc::new(client), config.registry, std::io::stdout())
        .with_handoff_delay(config.handoff_delay)
        .with_default_model(config.default_model);

    app.run(BufReader::new(tokio::io::stdin()))
        .await
        .context("terminal I/O failed")
}

fn init_tracing() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
