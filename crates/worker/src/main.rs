use std::sync::Arc;

use anyhow::Context;
use clipcart_cloud::S3Storage;
use clipcart_core::plan::PlanPolicy;
use clipcart_generation::GenerationApi;
use clipcart_pipeline::adapters::pg_services;
use clipcart_pipeline::BatchProcessor;
use clipcart_worker::{JobRunner, LogFormat, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;
    init_tracing(config.log_format);

    let pool = clipcart_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    clipcart_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    clipcart_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let generation = GenerationApi::with_timeouts(
        config.generation_api_url.clone(),
        config.generation_api_key.clone(),
        config.http_timeout,
        config.http_connect_timeout,
    )
    .context("Failed to build generation client")?;
    let storage = S3Storage::from_config(&config.storage).await;
    let services = pg_services(pool.clone(), Arc::new(generation), Arc::new(storage));
    let processor = BatchProcessor::new(services, Arc::new(PlanPolicy));

    let runner = JobRunner::new(pool.clone(), processor).with_poll_interval(config.poll_interval);
    let cancel = CancellationToken::new();
    let runner_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(cancel).await })
    };

    shutdown_signal().await;
    tracing::info!("Waiting for the current batch to finish");
    cancel.cancel();
    runner_handle.await.context("Job runner task panicked")?;

    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clipcart_worker=debug,clipcart_pipeline=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
