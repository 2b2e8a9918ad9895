//! OTP/3DS completion.
//!
//! The provider's hosted page collects the OTP; what comes back to us is
//! the 3DS pares. Both steps here are guarded by compare-and-swap status
//! transitions, so a replayed callback or a concurrent worker can never
//! complete the same payment twice.

use crate::database::payment_repository::{PaymentRecord, PaymentStore};
use crate::error::{GatewayError, GatewayResult, StateError};
use crate::gateway::client::ProviderGateway;
use crate::gateway::codes;
use crate::gateway::types::{CardPaymentRequest, PaymentStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct OtpService {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentStore>,
    notifier: Arc<dyn crate::services::notification::Notifier>,
}

impl OtpService {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        payments: Arc<dyn PaymentStore>,
        notifier: Arc<dyn crate::services::notification::Notifier>,
    ) -> Self {
        Self {
            gateway,
            payments,
            notifier,
        }
    }

    /// Stores the 3DS pares returned after the customer passed the hosted
    /// OTP step. The OTP itself was already checked by the issuer's page;
    /// it is accepted here for the caller's contract but not re-verified.
    /// The record must currently be Validated; the transition to
    /// OtpVerified happens in a single conditional update.
    pub async fn verify_otp_and_store_pares(
        &self,
        transaction_id: &str,
        otp: &str,
        pares: &str,
    ) -> GatewayResult<PaymentRecord> {
        debug!(
            transaction_id = %transaction_id,
            otp_present = !otp.is_empty(),
            "storing pares after hosted OTP step"
        );
        if let Some(record) = self
            .payments
            .mark_otp_verified(transaction_id, pares)
            .await?
        {
            info!(
                payment_id = record.id,
                transaction_id = %transaction_id,
                "OTP verified, pares stored"
            );
            return Ok(record);
        }

        // The conditional update missed; distinguish absent from wrong state.
        match self.payments.find_by_transaction_id(transaction_id).await? {
            None => Err(StateError::NotFound.into()),
            Some(record) => Err(StateError::InvalidStatus {
                expected: PaymentStatus::Validated.as_str(),
                actual: record.status,
            }
            .into()),
        }
    }

    /// Final transaction submission keyed by the stored pares. A record
    /// that is not OtpVerified is reported as not found, so a replay after
    /// success fails closed rather than resubmitting the charge.
    pub async fn complete_transaction_from_pares(
        &self,
        pares: &str,
    ) -> GatewayResult<PaymentRecord> {
        let record = self
            .payments
            .find_by_pares(pares)
            .await?
            .filter(|r| r.status == PaymentStatus::OtpVerified.as_str())
            .ok_or(StateError::NotFound)?;

        let transaction_id = record
            .transaction_id
            .clone()
            .ok_or(StateError::NotFound)?;

        let mut request: CardPaymentRequest = serde_json::from_value(record.request_data.clone())
            .map_err(|e| GatewayError::Storage(format!("stored request unreadable: {}", e)))?;
        request.transaction_id = Some(transaction_id.clone());
        request.data_3ds_pares = Some(pares.to_string());
        request.data_3ds_secure_id = Some(record.data_3ds_secureid.clone());

        let token = self.gateway.get_token().await?;
        let response = self.gateway.initiate_transaction(&request, &token).await?;

        if response.is_success() {
            let completed = self
                .payments
                .complete_from_otp(record.id)
                .await?
                .ok_or(StateError::NotFound)?;
            info!(
                payment_id = completed.id,
                transaction_id = %transaction_id,
                "transaction completed"
            );
            self.notifier
                .payment_completed(&transaction_id, &record.order_no, &record.request_data)
                .await;
            return Ok(completed);
        }

        let (description, _) = codes::map_error_code(&response.code);
        warn!(
            payment_id = record.id,
            transaction_id = %transaction_id,
            code = %response.code,
            "transaction rejected by provider"
        );
        self.payments
            .set_status_unless_completed(record.id, PaymentStatus::Failed)
            .await?;
        self.notifier
            .payment_failed(
                &transaction_id,
                &record.order_no,
                &response.code,
                description,
                &record.request_data,
            )
            .await;

        Err(GatewayError::Provider {
            code: response.code,
            description: description.to_string(),
            message: response.message,
        })
    }
}
