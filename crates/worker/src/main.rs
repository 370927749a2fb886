use std::sync::Arc;
use std::time::Duration;

use emporia_db::repositories::{DeliveryJobRepo, NotificationRepo};
use emporia_events::{HandlebarsRenderer, MaintenanceScheduler, NotifyConfig, QueueWorker, SmtpTransport};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long background tasks get to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emporia_worker=debug,emporia_events=debug,emporia_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = NotifyConfig::from_env();
    tracing::info!(
        batch_size = config.batch_size,
        max_attempts = config.max_attempts,
        retention_days = config.retention_days,
        "Loaded notification configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = emporia_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    emporia_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    emporia_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // --- Stores ---
    let notifications = Arc::new(NotificationRepo::new(pool.clone()));
    let queue = Arc::new(DeliveryJobRepo::new(pool.clone()));

    // --- Delivery ---
    let transport = Arc::new(SmtpTransport::from_env().expect("Failed to configure SMTP transport"));
    let renderer = Arc::new(HandlebarsRenderer::new().expect("Failed to register email templates"));
    let worker = Arc::new(QueueWorker::new(queue.clone(), transport, renderer));

    // --- Background services ---
    let cancel = CancellationToken::new();

    let scheduler = MaintenanceScheduler::new(worker, notifications, queue, config);
    let scheduler_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tracing::info!("Notification maintenance scheduler started");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler_handle).await.is_err() {
        tracing::warn!("Maintenance scheduler did not stop in time");
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
