use analytics_logs::{AnalyticsClient, Config, S3LogStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        bucket = %config.s3.bucket,
        "Starting Nier Analytics Logs export"
    );

    let store = S3LogStore::new(&config.s3)
        .await
        .context("Failed to initialize S3 log store")?;
    let client = AnalyticsClient::new(Arc::new(store));

    let query = &config.query;
    let mut records = client
        .list_log_records(query.service, query.start, query.end, query.list_options())
        .context("Invalid log query")?;

    let mut stdout = tokio::io::stdout();
    let mut exported = 0u64;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let record = tokio::select! {
            record = records.next() => record.context("Failed to read analytics logs")?,
            _ = &mut shutdown => {
                warn!(exported, "Export interrupted");
                break;
            }
        };
        let Some(record) = record else {
            break;
        };

        let mut line = serde_json::to_vec(&record).context("Failed to encode log record")?;
        line.push(b'\n');
        stdout
            .write_all(&line)
            .await
            .context("Failed to write to stdout")?;
        exported += 1;
    }

    records.close();
    stdout.flush().await.context("Failed to flush stdout")?;

    info!(exported, "Analytics logs export finished");

    Ok(())
}

/// Initialize tracing/logging
///
/// Logs go to stderr so stdout carries only records.
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Wait for Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C signal");
}
