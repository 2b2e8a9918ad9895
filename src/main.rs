use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use payfast_gateway::api::{self, AppState};
use payfast_gateway::config::AppConfig;
use payfast_gateway::database::{
    self, activity_log_repository::ActivityLogRepository, ipn_log_repository::IpnLogRepository,
    payment_repository::PaymentRepository,
};
use payfast_gateway::gateway::client::{PayfastClient, ProviderGateway};
use payfast_gateway::services::{IpnService, LogNotifier, Notifier, OtpService};
use payfast_gateway::workers::{PendingPaymentsWorker, SweepOptions};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    payfast_gateway::init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.payfast.mode,
        "starting payfast gateway service"
    );

    let pool = database::init_pool_from_config(&config.database)
        .await
        .context("failed to initialize database pool")?;

    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let ipn_log = Arc::new(IpnLogRepository::new(pool.clone()));
    let activity_log = Arc::new(ActivityLogRepository::new(pool.clone()));
    let notifier: Arc<dyn Notifier> =
        Arc::new(LogNotifier::new(config.payfast.admin_emails.clone()));
    let gateway: Arc<dyn ProviderGateway> =
        Arc::new(PayfastClient::new(config.payfast.clone()));

    let ipn = Arc::new(IpnService::new(
        payments.clone(),
        ipn_log.clone(),
        notifier.clone(),
    ));
    let otp = Arc::new(OtpService::new(
        gateway.clone(),
        payments.clone(),
        notifier.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_interval = std::env::var("PENDING_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300);
    let worker = PendingPaymentsWorker::new(
        gateway.clone(),
        payments.clone(),
        activity_log.clone(),
        notifier.clone(),
        Duration::from_secs(poll_interval),
        SweepOptions::default(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let state = Arc::new(AppState { ipn, otp, pool });
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "worker task panicked");
    }

    info!("shutdown complete");
    Ok(())
}
