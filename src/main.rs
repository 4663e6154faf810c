use std::sync::Arc;

use limitcast::config::AppConfig;
use limitcast::monitor::Monitor;
use limitcast::notify::Notifier;
use limitcast::server::{CallbackServer, ChallengeVerifier};
use limitcast::source::HttpAccountSource;
use limitcast::storage::SnapshotStore;

#[tokio::main]
async fn main() {
    let config = match AppConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let log_dir = config.log_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    // daily rotated file + console
    let file_appender = tracing_appender::rolling::daily(&log_dir, "limitcast.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("LimitCast starting... Log file: {:?}", log_dir.join("limitcast.log"));

    if let Err(e) = run(config).await {
        tracing::error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let notifier = Notifier::from_config(&config);
    let source = Arc::new(HttpAccountSource::new(&config.api));
    let store = SnapshotStore::new(&config.storage.snapshot_path);
    tracing::info!(
        "Transport mode: {}, snapshot: {:?}",
        notifier.mode(),
        store.path()
    );

    let monitor = Monitor::new(notifier, source, store)
        .with_time_range(config.api.usage.time_range.clone());

    let feishu = &config.notification.feishu;
    let verifier = ChallengeVerifier::new(
        feishu.encrypt_key.clone(),
        feishu.verification_token.clone(),
    );

    let mut server = CallbackServer::new(Arc::new(monitor), verifier, config.server.auth.clone());
    server.start(&config.server.host, config.server.port).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.stop();
    Ok(())
}
