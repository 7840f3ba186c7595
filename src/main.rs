use pulsewatch::config::{MonitorConfig, SourceMode};
use pulsewatch::insight::{ChatClient, TextCompletion};
use pulsewatch::monitor::Monitor;
use pulsewatch::source::{HttpSampleSource, SampleSource, SplitSource};
use pulsewatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pulsewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load();
    cfg.validate()?;
    tracing::info!("Starting Pulsewatch on port {}...", cfg.http_port);
    tracing::info!("Polling {} every {:?} ({:?} mode)", cfg.metrics_url, cfg.poll_interval, cfg.source_mode);

    let http = HttpSampleSource::new(&cfg.metrics_url, cfg.fetch_timeout)?;
    let source: Arc<dyn SampleSource> = match cfg.source_mode {
        SourceMode::Unified => Arc::new(http),
        SourceMode::Split => Arc::new(SplitSource::new(http)),
    };

    let ai: Option<Arc<dyn TextCompletion>> = match &cfg.ai {
        Some(ai) => {
            let client = ChatClient::new(&ai.endpoint, &ai.model, ai.api_key.clone(), ai.timeout)?;
            tracing::info!("AI analysis enabled via {} ({})", client.endpoint(), ai.model);
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("AI analysis disabled, using local health scoring");
            None
        }
    };

    let monitor = Monitor::new(cfg, source, ai);
    monitor.start();

    // Start web server
    let server = Server::new(monitor);
    server.start().await?;

    Ok(())
}
