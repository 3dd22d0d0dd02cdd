use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use qa_bridge::channels::OneBotSource;
use qa_bridge::config::{OneBotConfig, QaConfig};
use qa_bridge::qa::QaClient;
use qa_bridge::router::EventRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional rolling file log alongside stderr
    let (file_layer, _log_guard) = match std::env::var("QA_BRIDGE_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "qa-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    let qa_config = QaConfig::from_env().context("loading QA backend configuration")?;
    let bot_config = OneBotConfig::from_env();

    eprintln!("🤖 QA Bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   QA endpoint: {}", qa_config.api_endpoint);
    eprintln!("   Theme: {}", qa_config.theme_id);
    eprintln!("   Timeout: {}s", qa_config.timeout.as_secs());
    eprintln!("   OneBot: {}\n", bot_config.ws_url);

    let qa = Arc::new(QaClient::new(&qa_config).context("building QA client")?);
    let source = OneBotSource::new(bot_config);
    let router = EventRouter::new(Box::new(source), qa);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down...");
        }
        trigger.cancel();
    });

    router.run(shutdown).await?;
    Ok(())
}
