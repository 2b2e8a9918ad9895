//! PayFast REST client.
//!
//! Auth tokens are plain values: `get_token` returns one and every call that
//! needs it takes it as a parameter. The client holds no token state, so two
//! concurrent flows can never observe each other's credentials.

use crate::config::PayfastConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::codes;
use crate::gateway::http::{Auth, GatewayHttpClient};
use crate::gateway::types::{
    AuthToken, CardPaymentRequest, ProviderResponse, RefundRequest, ValidationOutcome,
    WalletPaymentRequest, ACCOUNT_TYPE_CARD, ACCOUNT_TYPE_WALLET,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Seam between services and the provider API. Mocked in tests.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn get_token(&self) -> GatewayResult<AuthToken>;
    async fn refresh_token(&self, token: &AuthToken) -> GatewayResult<AuthToken>;
    async fn validate_customer(
        &self,
        request: &CardPaymentRequest,
        token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome>;
    async fn initiate_transaction(
        &self,
        request: &CardPaymentRequest,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn validate_wallet(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
        token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome>;
    async fn wallet_transaction_initiate(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn transaction_details(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn transaction_details_by_basket(
        &self,
        basket_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn refund_transaction(
        &self,
        request: &RefundRequest,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn void_transaction(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn settlement_status(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    async fn list_banks(&self, token: &AuthToken) -> GatewayResult<ProviderResponse>;
    async fn list_instruments(
        &self,
        bank_code: u32,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse>;
    /// Basic-auth transaction status lookup on the separately-hosted
    /// reporting endpoint. Used by the pending-payment reconciler.
    async fn check_basket_status(&self, basket_id: &str) -> GatewayResult<ProviderResponse>;
}

pub struct PayfastClient {
    http: GatewayHttpClient,
    config: PayfastConfig,
}

impl PayfastClient {
    pub fn new(config: PayfastConfig) -> Self {
        let http = GatewayHttpClient::new(config.base_url(), config.request_timeout_secs);
        PayfastClient { http, config }
    }

    fn order_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    // The provider concatenates the basket id directly onto the segment,
    // with no separating slash.
    fn basket_details_path(basket_id: &str) -> String {
        format!("transaction/basket_id{}", basket_id)
    }

    fn bearer(token: &AuthToken) -> Auth {
        Auth::Bearer(token.token.clone())
    }

    /// Rejects non-"00" responses with the mapped description.
    fn require_success(response: ProviderResponse) -> GatewayResult<ProviderResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let (description, _) = codes::map_error_code(&response.code);
        Err(GatewayError::Provider {
            code: response.code,
            description: description.to_string(),
            message: response.message,
        })
    }

    fn validation_outcome(response: ProviderResponse) -> GatewayResult<ValidationOutcome> {
        let response = Self::require_success(response)?;
        let transaction_id = response
            .field("transaction_id")
            .map(|v| v.to_string())
            .ok_or_else(|| GatewayError::Transport {
                message: "provider validation response carried no transaction_id".to_string(),
                timed_out: false,
            })?;
        let data_3ds_secure_id = response
            .field("data_3ds_secureid")
            .unwrap_or_default()
            .to_string();
        let redirect_url = response
            .field("data_3ds_acsurl")
            .or_else(|| response.field("redirect_url"))
            .map(|v| v.to_string());
        Ok(ValidationOutcome {
            transaction_id,
            data_3ds_secure_id,
            redirect_url,
            raw: response.raw,
        })
    }

    fn card_form(&self, request: &CardPaymentRequest) -> Vec<(&'static str, String)> {
        vec![
            ("basket_id", request.order_number.clone()),
            ("txnamt", request.transaction_amount.clone()),
            ("customer_mobile_no", request.customer_mobile_no.clone()),
            ("customer_email_address", request.customer_email.clone()),
            ("account_type_id", ACCOUNT_TYPE_CARD.to_string()),
            ("card_number", request.card_number.clone()),
            ("expiry_month", request.expiry_month.clone()),
            ("expiry_year", request.expiry_year.clone()),
            ("cvv", request.cvv.clone()),
            ("order_date", Self::order_date()),
            ("currency_code", "PKR".to_string()),
            ("store_id", self.config.store_id.clone()),
            ("merchant_id", self.config.merchant_id.clone()),
        ]
    }

    fn wallet_form(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("basket_id", request.order_number.clone()),
            ("txnamt", request.transaction_amount.clone()),
            ("customer_mobile_no", request.customer_mobile_no.clone()),
            ("customer_email_address", request.customer_email.clone()),
            ("account_number", request.account_no().to_string()),
            ("account_type_id", ACCOUNT_TYPE_WALLET.to_string()),
            ("bank_code", bank_code.to_string()),
            ("order_date", Self::order_date()),
            ("currency_code", "PKR".to_string()),
            ("store_id", self.config.store_id.clone()),
            ("merchant_id", self.config.merchant_id.clone()),
        ]
    }
}

#[async_trait]
impl ProviderGateway for PayfastClient {
    async fn get_token(&self) -> GatewayResult<AuthToken> {
        let form = [
            ("grant_type", self.config.grant_type.as_str()),
            ("merchant_id", self.config.merchant_id.as_str()),
            ("secured_key", self.config.secured_key.as_str()),
        ];
        let raw = self.http.post_form("token", &Auth::None, &form).await?;
        let response = ProviderResponse::from_json(raw);

        let token = response
            .field("token")
            .or_else(|| response.field("ACCESS_TOKEN"))
            .map(|v| v.to_string());
        match token {
            Some(token) if !token.is_empty() => {
                info!("obtained provider access token");
                Ok(AuthToken {
                    token,
                    refresh_token: response.field("refresh_token").map(|v| v.to_string()),
                    expires_in: response
                        .raw
                        .get("expires_in")
                        .and_then(|v| v.as_u64()),
                })
            }
            _ => {
                warn!(code = %response.code, "token request rejected by provider");
                Err(GatewayError::Auth {
                    code: response.code,
                    message: response
                        .message
                        .unwrap_or_else(|| "token request rejected".to_string()),
                })
            }
        }
    }

    async fn refresh_token(&self, token: &AuthToken) -> GatewayResult<AuthToken> {
        let refresh = token.refresh_token.clone().ok_or_else(|| {
            GatewayError::Auth {
                code: "401".to_string(),
                message: "no refresh token available".to_string(),
            }
        })?;
        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh),
        ];
        let raw = self
            .http
            .post_form("refreshtoken", &Self::bearer(token), &form)
            .await?;
        let response = ProviderResponse::from_json(raw);

        match response.field("token").map(|v| v.to_string()) {
            Some(new_token) if !new_token.is_empty() => Ok(AuthToken {
                token: new_token,
                refresh_token: response.field("refresh_token").map(|v| v.to_string()),
                expires_in: response.raw.get("expires_in").and_then(|v| v.as_u64()),
            }),
            _ => Err(GatewayError::Auth {
                code: response.code,
                message: response
                    .message
                    .unwrap_or_else(|| "token refresh rejected".to_string()),
            }),
        }
    }

    async fn validate_customer(
        &self,
        request: &CardPaymentRequest,
        token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome> {
        let mut form = self.card_form(request);
        form.push(("data_3ds_callback_url", self.config.return_url.clone()));

        let raw = self
            .http
            .post_form("customer/validate", &Self::bearer(token), &form)
            .await?;
        Self::validation_outcome(ProviderResponse::from_json(raw))
    }

    async fn initiate_transaction(
        &self,
        request: &CardPaymentRequest,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let mut form = self.card_form(request);
        if let Some(transaction_id) = &request.transaction_id {
            form.push(("transaction_id", transaction_id.clone()));
        }
        if let Some(pares) = &request.data_3ds_pares {
            form.push(("data_3ds_pares", pares.clone()));
        }
        if let Some(secure_id) = &request.data_3ds_secure_id {
            form.push(("data_3ds_secureid", secure_id.clone()));
        }

        let raw = self
            .http
            .post_form("transaction", &Self::bearer(token), &form)
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn validate_wallet(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
        token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome> {
        let form = self.wallet_form(request, bank_code);
        let raw = self
            .http
            .post_form("customer/validate", &Self::bearer(token), &form)
            .await?;
        Self::validation_outcome(ProviderResponse::from_json(raw))
    }

    async fn wallet_transaction_initiate(
        &self,
        request: &WalletPaymentRequest,
        bank_code: u32,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let mut form = self.wallet_form(request, bank_code);
        form.push(("transaction_id", transaction_id.to_string()));

        let raw = self
            .http
            .post_form("transaction", &Self::bearer(token), &form)
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn transaction_details(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let raw = self
            .http
            .get(&format!("transaction/{}", transaction_id), &Self::bearer(token))
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn transaction_details_by_basket(
        &self,
        basket_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let raw = self
            .http
            .get(&Self::basket_details_path(basket_id), &Self::bearer(token))
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn refund_transaction(
        &self,
        request: &RefundRequest,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let form = [
            ("transaction_id", request.transaction_id.clone()),
            ("txnamt", request.transaction_amount.clone()),
            ("refund_reason", request.refund_reason.clone()),
        ];
        let raw = self
            .http
            .post_form(
                &format!("transaction/refund/{}", request.transaction_id),
                &Self::bearer(token),
                &form,
            )
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn void_transaction(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let form = [("transaction_id", transaction_id.to_string())];
        let raw = self
            .http
            .post_form(
                &format!("transaction/void/{}", transaction_id),
                &Self::bearer(token),
                &form,
            )
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn settlement_status(
        &self,
        transaction_id: &str,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let raw = self
            .http
            .get(
                &format!("transaction/settlement/{}", transaction_id),
                &Self::bearer(token),
            )
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn list_banks(&self, token: &AuthToken) -> GatewayResult<ProviderResponse> {
        let raw = self.http.get("list/banks", &Self::bearer(token)).await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn list_instruments(
        &self,
        bank_code: u32,
        token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        let raw = self
            .http
            .get(
                &format!("list/instruments?bank_code={}", bank_code),
                &Self::bearer(token),
            )
            .await?;
        Ok(ProviderResponse::from_json(raw))
    }

    async fn check_basket_status(&self, basket_id: &str) -> GatewayResult<ProviderResponse> {
        let url = format!(
            "{}transaction/view/basket/id?basket_id={}",
            self.config.transaction_check_url, basket_id
        );
        let auth = Auth::Basic {
            username: self.config.merchant_id.clone(),
            password: self.config.secured_key.clone(),
        };
        let raw = self.http.get_absolute(&url, &auth).await?;
        Ok(ProviderResponse::from_json(raw))
    }
}
