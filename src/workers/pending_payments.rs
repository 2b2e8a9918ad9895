//! Pending-payment reconciler.
//!
//! IPNs get lost. This worker sweeps records stuck in a non-terminal state
//! and asks the provider's basket status endpoint for the truth. Each
//! record is handled in isolation; one bad record or one provider hiccup
//! never aborts the sweep.

use crate::database::activity_log_repository::{ActivityLogStore, NewActivityLogEntry};
use crate::database::payment_repository::{PaymentRecord, PaymentStore};
use crate::gateway::client::ProviderGateway;
use crate::gateway::types::PaymentStatus;
use crate::services::notification::Notifier;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Upper bound on records examined per sweep.
    pub limit: i64,
    /// Restrict the sweep to a single status; None sweeps every open state.
    pub status: Option<PaymentStatus>,
    pub notify: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            status: None,
            notify: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct PendingPaymentsWorker {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentStore>,
    activity_log: Arc<dyn ActivityLogStore>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    options: SweepOptions,
}

impl PendingPaymentsWorker {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        payments: Arc<dyn PaymentStore>,
        activity_log: Arc<dyn ActivityLogStore>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        options: SweepOptions,
    ) -> Self {
        Self {
            gateway,
            payments,
            activity_log,
            notifier,
            poll_interval,
            options,
        }
    }

    /// Worker loop. Sweeps on the configured interval until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            limit = self.options.limit,
            "pending payments worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("pending payments worker shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    let summary = self.run_once().await;
                    info!(
                        examined = summary.examined,
                        completed = summary.completed,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        errors = summary.errors,
                        "sweep finished"
                    );
                }
            }
        }
    }

    /// One sweep over open records.
    pub async fn run_once(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let records = match self
            .payments
            .list_open(self.options.limit, self.options.status)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to list open payments");
                summary.errors += 1;
                return summary;
            }
        };

        for record in records {
            summary.examined += 1;
            match self.reconcile_record(&record).await {
                Ok(Some(PaymentStatus::Completed)) => summary.completed += 1,
                Ok(Some(PaymentStatus::Failed)) => summary.failed += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    // Transport errors leave the record for the next sweep.
                    warn!(payment_id = record.id, error = %e, "record reconciliation failed");
                    summary.errors += 1;
                }
            }
        }

        summary
    }

    async fn reconcile_record(
        &self,
        record: &PaymentRecord,
    ) -> Result<Option<PaymentStatus>, crate::error::GatewayError> {
        let response = self.gateway.check_basket_status(&record.order_no).await?;
        let transaction_id = record.transaction_id.clone().unwrap_or_default();

        if response.is_success() {
            let updated = self.payments.complete_sticky(record.id).await?;
            if updated.is_none() {
                return Ok(None);
            }
            self.log_activity(record, PaymentStatus::Completed, &response.code)
                .await;
            if self.options.notify {
                self.notifier
                    .payment_completed(&transaction_id, &record.order_no, &record.request_data)
                    .await;
            }
            return Ok(Some(PaymentStatus::Completed));
        }

        let updated = self
            .payments
            .set_status_unless_completed(record.id, PaymentStatus::Failed)
            .await?;
        if updated.is_none() {
            return Ok(None);
        }
        self.log_activity(record, PaymentStatus::Failed, &response.code)
            .await;
        if self.options.notify {
            let (description, _) = crate::gateway::codes::map_error_code(&response.code);
            self.notifier
                .payment_failed(
                    &transaction_id,
                    &record.order_no,
                    &response.code,
                    description,
                    &record.request_data,
                )
                .await;
        }
        Ok(Some(PaymentStatus::Failed))
    }

    async fn log_activity(&self, record: &PaymentRecord, status: PaymentStatus, code: &str) {
        let amount = record
            .request_data
            .get("transaction_amount")
            .and_then(|v| v.as_str())
            .and_then(|v| BigDecimal::from_str(v).ok())
            .unwrap_or_else(|| BigDecimal::from(0));

        let entry = NewActivityLogEntry {
            user_id: record
                .request_data
                .get("user_id")
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            transaction_id: record.transaction_id.clone().unwrap_or_default(),
            order_no: record.order_no.clone(),
            status: status.as_str().to_string(),
            amount,
            details: Some(format!("reconciled via basket status, code {}", code)),
            metadata: Some(record.payload.clone()),
        };

        if let Err(e) = self.activity_log.record(entry).await {
            // Audit failure must not undo the reconciliation itself.
            error!(payment_id = record.id, error = %e, "failed to write activity log");
        }
    }
}
