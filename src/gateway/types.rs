use crate::error::GatewayError;
use bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::OnceLock;

/// Lifecycle status of a payment record. Monotonic in the happy path;
/// Completed is terminal and is never retracted by a late notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Validated,
    OtpVerified,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Validated => "validated",
            PaymentStatus::OtpVerified => "otp_verified",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "validated" => Ok(PaymentStatus::Validated),
            "otp_verified" => Ok(PaymentStatus::OtpVerified),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(GatewayError::validation(
                format!("unknown payment status: {}", value),
                Some("status"),
            )),
        }
    }
}

/// Payment rail used for a record. Wallet methods are selected by the
/// provider bank code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    EasyPaisa,
    JazzCash,
    UPaisa,
}

pub const BANK_CODE_EASYPAISA: u32 = 13;
pub const BANK_CODE_UPAISA: u32 = 14;
pub const ACCOUNT_TYPE_CARD: u32 = 1;
pub const ACCOUNT_TYPE_WALLET: u32 = 4;

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::EasyPaisa => "easypaisa",
            PaymentMethod::JazzCash => "jazzcash",
            PaymentMethod::UPaisa => "upaisa",
        }
    }

    pub fn from_bank_code(bank_code: u32) -> Self {
        match bank_code {
            BANK_CODE_UPAISA => PaymentMethod::UPaisa,
            _ => PaymentMethod::EasyPaisa,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "easypaisa" => Ok(PaymentMethod::EasyPaisa),
            "jazzcash" => Ok(PaymentMethod::JazzCash),
            "upaisa" => Ok(PaymentMethod::UPaisa),
            _ => Err(GatewayError::validation(
                format!("unknown payment method: {}", value),
                Some("payment_method"),
            )),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

fn require(value: &str, field: &'static str, message: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::validation(message, Some(field)));
    }
    Ok(())
}

fn validate_positive_amount(amount: &str, field: &'static str) -> Result<(), GatewayError> {
    let parsed = BigDecimal::from_str(amount.trim()).map_err(|_| {
        GatewayError::validation(format!("invalid decimal amount: {}", amount), Some(field))
    })?;
    if parsed <= BigDecimal::from(0) {
        return Err(GatewayError::validation(
            "Transaction Amount must be greater than zero",
            Some(field),
        ));
    }
    Ok(())
}

/// Card payment request as submitted by the merchant application.
///
/// Field aliases accept both the camelCase merchant form and the provider's
/// snake_case form, so a stored request payload round-trips through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPaymentRequest {
    #[serde(alias = "orderNumber", alias = "basket_id")]
    pub order_number: String,
    #[serde(alias = "transactionAmount", alias = "txnamt")]
    pub transaction_amount: String,
    #[serde(alias = "customerMobileNo", alias = "customer_mobile_no")]
    pub customer_mobile_no: String,
    #[serde(alias = "customer_email", alias = "customer_email_address")]
    pub customer_email: String,
    #[serde(alias = "cardNumber", alias = "card_number")]
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "transactionId")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub data_3ds_pares: Option<String>,
    #[serde(default, alias = "data_3ds_secureid")]
    pub data_3ds_secure_id: Option<String>,
}

impl CardPaymentRequest {
    /// Field-level validation performed before any network call.
    pub fn validate(&self) -> Result<(), GatewayError> {
        require(&self.order_number, "order_number", "Order Number is Required")?;
        require(
            &self.transaction_amount,
            "transaction_amount",
            "Transaction Amount is required",
        )?;
        validate_positive_amount(&self.transaction_amount, "transaction_amount")?;
        require(
            &self.customer_mobile_no,
            "customer_mobile_no",
            "Customer Mobile Number is required",
        )?;
        require(
            &self.customer_email,
            "customer_email",
            "Customer Email address is required",
        )?;
        if !email_pattern().is_match(self.customer_email.trim()) {
            return Err(GatewayError::validation(
                "Customer Email address is invalid",
                Some("customer_email"),
            ));
        }
        require(&self.card_number, "card_number", "Card Number is required")?;
        require(&self.expiry_month, "expiry_month", "Expiry Month is required")?;
        require(&self.expiry_year, "expiry_year", "Expiry Year is required")?;
        require(&self.cvv, "cvv", "CVV is a required Field.")?;
        Ok(())
    }
}

/// Wallet payment request (EasyPaisa / UPaisa rails).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletPaymentRequest {
    #[serde(alias = "orderNumber", alias = "basket_id")]
    pub order_number: String,
    #[serde(alias = "transactionAmount", alias = "txnamt")]
    pub transaction_amount: String,
    #[serde(alias = "customerMobileNo", alias = "customer_mobile_no")]
    pub customer_mobile_no: String,
    #[serde(alias = "customer_email", alias = "customer_email_address")]
    pub customer_email: String,
    /// Wallet account number; defaults to the mobile number when absent.
    #[serde(default)]
    pub account_number: Option<String>,
}

impl WalletPaymentRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        require(&self.order_number, "order_number", "Order Number is Required")?;
        require(
            &self.transaction_amount,
            "transaction_amount",
            "Transaction Amount is required",
        )?;
        validate_positive_amount(&self.transaction_amount, "transaction_amount")?;
        require(
            &self.customer_mobile_no,
            "customer_mobile_no",
            "Customer Mobile Number is required",
        )?;
        require(
            &self.customer_email,
            "customer_email",
            "Customer Email address is required",
        )?;
        if !email_pattern().is_match(self.customer_email.trim()) {
            return Err(GatewayError::validation(
                "Customer Email address is invalid",
                Some("customer_email"),
            ));
        }
        Ok(())
    }

    pub fn account_no(&self) -> &str {
        self.account_number
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.customer_mobile_no)
    }
}

/// Refund request against a settled transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    #[serde(alias = "transactionId")]
    pub transaction_id: String,
    #[serde(alias = "transactionAmount", alias = "txnamt")]
    pub transaction_amount: String,
    #[serde(default)]
    pub refund_reason: String,
}

/// Bearer token issued by the provider. Returned to the caller and threaded
/// through subsequent calls explicitly; never cached inside the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Raw provider response envelope. Every endpoint answers JSON with a
/// `code` field; "00" is success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub code: String,
    pub message: Option<String>,
    pub raw: JsonValue,
}

impl ProviderResponse {
    pub fn from_json(raw: JsonValue) -> Self {
        let code = raw
            .get("code")
            .map(|v| match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let message = raw
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        ProviderResponse { code, message, raw }
    }

    pub fn is_success(&self) -> bool {
        self.code == super::codes::SUCCESS
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(|v| v.as_str())
    }
}

/// Successful `/customer/validate` outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub transaction_id: String,
    pub data_3ds_secure_id: String,
    pub redirect_url: Option<String>,
    pub raw: JsonValue,
}
