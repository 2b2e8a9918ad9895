//! Outcome notifications.
//!
//! The production impl emits structured log events carrying the original
//! request payload; the actual mail transport is an external collaborator
//! consuming those events.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{error, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payment_completed(&self, transaction_id: &str, order_no: &str, request: &JsonValue);
    async fn payment_failed(
        &self,
        transaction_id: &str,
        order_no: &str,
        code: &str,
        description: &str,
        request: &JsonValue,
    );
}

pub struct LogNotifier {
    admin_emails: Vec<String>,
}

impl LogNotifier {
    pub fn new(admin_emails: Vec<String>) -> Self {
        Self { admin_emails }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn payment_completed(&self, transaction_id: &str, order_no: &str, request: &JsonValue) {
        info!(
            transaction_id = %transaction_id,
            order_no = %order_no,
            recipients = ?self.admin_emails,
            request = %request,
            "NOTIFICATION: payment completed"
        );
    }

    async fn payment_failed(
        &self,
        transaction_id: &str,
        order_no: &str,
        code: &str,
        description: &str,
        request: &JsonValue,
    ) {
        error!(
            transaction_id = %transaction_id,
            order_no = %order_no,
            code = %code,
            description = %description,
            recipients = ?self.admin_emails,
            request = %request,
            "NOTIFICATION: payment failed"
        );
    }
}
