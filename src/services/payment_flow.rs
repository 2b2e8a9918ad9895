//! Card and wallet payment initiation.
//!
//! Card payments run the 3DS pre-check: validate fields, obtain a token,
//! validate the customer with the provider, then persist the record in
//! Validated state and hand the caller what the OTP screen needs. Wallet
//! payments follow the same shape with the wallet bank codes.

use crate::database::payment_repository::{NewPaymentRecord, PaymentRecord, PaymentStore};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::client::ProviderGateway;
use crate::gateway::types::{
    AuthToken, CardPaymentRequest, PaymentMethod, PaymentStatus, ProviderResponse,
    WalletPaymentRequest, BANK_CODE_EASYPAISA, BANK_CODE_UPAISA,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the merchant frontend needs to render the 3DS/OTP step.
#[derive(Debug, Clone)]
pub struct OtpScreen {
    pub payment_id: i64,
    pub transaction_id: String,
    pub token: AuthToken,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WalletPaymentOutcome {
    pub payment_id: i64,
    pub transaction_id: String,
    pub payment_method: PaymentMethod,
    pub raw: JsonValue,
}

pub struct PaymentFlowService {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentStore>,
    notifier: Arc<dyn crate::services::notification::Notifier>,
}

impl PaymentFlowService {
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

    /// Card validation step. Field validation happens before any network
    /// call; a provider rejection is mapped through the code table and
    /// emits a failure notification.
    pub async fn get_otp_screen(&self, request: CardPaymentRequest) -> GatewayResult<OtpScreen> {
        request.validate()?;

        let token = self.gateway.get_token().await?;
        let outcome = match self.gateway.validate_customer(&request, &token).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let GatewayError::Provider {
                    code, description, ..
                } = &err
                {
                    let request_json = to_json(&request)?;
                    self.notifier
                        .payment_failed(
                            "",
                            &request.order_number,
                            code,
                            description,
                            &request_json,
                        )
                        .await;
                }
                return Err(err);
            }
        };

        let request_json = to_json(&request)?;
        let record = self
            .payments
            .create(NewPaymentRecord {
                order_no: request.order_number.clone(),
                transaction_id: Some(outcome.transaction_id.clone()),
                data_3ds_secureid: outcome.data_3ds_secure_id.clone(),
                status: PaymentStatus::Validated,
                payment_method: PaymentMethod::Card,
                payload: json!({
                    "customer_validate": outcome.raw,
                    "user_request": request_json,
                }),
                request_data: request_json,
            })
            .await?;

        info!(
            payment_id = record.id,
            transaction_id = %outcome.transaction_id,
            order_no = %request.order_number,
            "customer validated, awaiting OTP"
        );

        Ok(OtpScreen {
            payment_id: record.id,
            transaction_id: outcome.transaction_id,
            token,
            redirect_url: outcome.redirect_url,
        })
    }

    pub async fn pay_with_easypaisa(
        &self,
        request: WalletPaymentRequest,
    ) -> GatewayResult<WalletPaymentOutcome> {
        self.validate_wallet_transaction(request, BANK_CODE_EASYPAISA)
            .await
    }

    pub async fn pay_with_upaisa(
        &self,
        request: WalletPaymentRequest,
    ) -> GatewayResult<WalletPaymentOutcome> {
        self.validate_wallet_transaction(request, BANK_CODE_UPAISA)
            .await
    }

    pub async fn validate_wallet_transaction(
        &self,
        request: WalletPaymentRequest,
        bank_code: u32,
    ) -> GatewayResult<WalletPaymentOutcome> {
        request.validate()?;

        let token = self.gateway.get_token().await?;
        let outcome = match self.gateway.validate_wallet(&request, bank_code, &token).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let GatewayError::Provider {
                    code, description, ..
                } = &err
                {
                    warn!(
                        order_no = %request.order_number,
                        bank_code,
                        code = %code,
                        "wallet validation rejected by provider"
                    );
                    let request_json = to_json(&request)?;
                    self.notifier
                        .payment_failed(
                            "",
                            &request.order_number,
                            code,
                            description,
                            &request_json,
                        )
                        .await;
                }
                return Err(err);
            }
        };

        let payment_method = PaymentMethod::from_bank_code(bank_code);
        let request_json = to_json(&request)?;
        let record = self
            .payments
            .create(NewPaymentRecord {
                order_no: request.order_number.clone(),
                transaction_id: Some(outcome.transaction_id.clone()),
                data_3ds_secureid: outcome.data_3ds_secure_id.clone(),
                status: PaymentStatus::Validated,
                payment_method,
                payload: json!({
                    "customer_validate": outcome.raw,
                    "user_request": request_json,
                }),
                request_data: request_json,
            })
            .await?;

        info!(
            payment_id = record.id,
            transaction_id = %outcome.transaction_id,
            method = %payment_method,
            "wallet transaction validated"
        );

        Ok(WalletPaymentOutcome {
            payment_id: record.id,
            transaction_id: outcome.transaction_id,
            payment_method,
            raw: outcome.raw,
        })
    }

    /// Submits the wallet transaction after validation. The provider
    /// debits the wallet; final settlement arrives via IPN or the poller.
    pub async fn wallet_transaction_initiate(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        self.gateway
            .wallet_transaction_initiate(request, bank_code, transaction_id, token)
            .await
    }

    pub async fn find_payment(&self, transaction_id: &str) -> GatewayResult<Option<PaymentRecord>> {
        Ok(self.payments.find_by_transaction_id(transaction_id).await?)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> GatewayResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| GatewayError::Storage(e.to_string()))
}
