use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use delivery_desk::api;
use delivery_desk::config::{Config, LogFormat};
use delivery_desk::error::AppError;
use delivery_desk::notify::outbox::{run_notification_worker, RetryPolicy};
use delivery_desk::notify::LogNotifier;
use delivery_desk::registry::MemoryRegistry;
use delivery_desk::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let (app_state, outbox_rx) = AppState::new(
        Arc::new(MemoryRegistry::new()),
        Arc::new(LogNotifier),
        &config.notifications,
    );
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_notification_worker(
        shared_state.clone(),
        outbox_rx,
        RetryPolicy::from(&config.notifications),
    ));

    let app = api::rest::app(shared_state, &config);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        notification_mode = ?config.notifications.mode,
        allowed_origins = ?config.allowed_origins,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
