//! One-shot sweep over payments stuck in a non-terminal state.
//!
//! Env knobs: SWEEP_LIMIT (default 100), SWEEP_STATUS
//! (pending|validated|otp_verified), SWEEP_NOTIFY (default true).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use payfast_gateway::config::AppConfig;
use payfast_gateway::database::{
    self, activity_log_repository::ActivityLogRepository,
    payment_repository::PaymentRepository,
};
use payfast_gateway::gateway::client::{PayfastClient, ProviderGateway};
use payfast_gateway::gateway::types::PaymentStatus;
use payfast_gateway::services::{LogNotifier, Notifier};
use payfast_gateway::workers::{PendingPaymentsWorker, SweepOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    payfast_gateway::init_tracing(&config.logging);

    let options = SweepOptions {
        limit: std::env::var("SWEEP_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100),
        status: std::env::var("SWEEP_STATUS")
            .ok()
            .map(|v| v.parse::<PaymentStatus>())
            .transpose()
            .context("invalid SWEEP_STATUS")?,
        notify: std::env::var("SWEEP_NOTIFY")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true),
    };

    let pool = database::init_pool_from_config(&config.database)
        .await
        .context("failed to initialize database pool")?;

    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let activity_log = Arc::new(ActivityLogRepository::new(pool.clone()));
    let notifier: Arc<dyn Notifier> =
        Arc::new(LogNotifier::new(config.payfast.admin_emails.clone()));
    let gateway: Arc<dyn ProviderGateway> =
        Arc::new(PayfastClient::new(config.payfast.clone()));

    let worker = PendingPaymentsWorker::new(
        gateway,
        payments,
        activity_log,
        notifier,
        Duration::from_secs(0),
        options,
    );

    let summary = worker.run_once().await;
    info!(
        examined = summary.examined,
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        errors = summary.errors,
        "sweep finished"
    );

    Ok(())
}
