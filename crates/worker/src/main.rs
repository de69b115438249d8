use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quire_content::PageStore;
use quire_core::clock::SystemClock;
use quire_worker::config::{load_page_types, WorkerConfig};
use quire_worker::DelayedPublisher;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "quire_worker=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let pool = quire_db::create_pool(&config.database_url, config.max_connections)
        .await
        .expect("Failed to connect to database");
    quire_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    quire_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let registry = load_page_types(config.page_types_file.as_deref().map(Path::new))
        .expect("Failed to load page types");
    let store = PageStore::new(pool, Arc::new(registry), Arc::new(SystemClock));
    let publisher = DelayedPublisher::new(
        store,
        config.batch_size,
        Duration::from_secs(config.interval_secs),
    );

    if config.run_once {
        match publisher.run().await {
            Ok(report) => tracing::info!(
                published = report.published,
                skipped = report.skipped,
                failed = report.failed,
                "Delayed publish sweep finished",
            ),
            Err(e) => {
                tracing::error!(error = %e, "Delayed publish sweep failed");
                std::process::exit(1);
            }
        }
        return;
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    publisher.run_loop(cancel).await;
    tracing::info!("Worker shut down");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
