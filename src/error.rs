//! Error taxonomy for the gateway integration.
//!
//! Every component returns a discriminated [`GatewayError`] to its caller;
//! nothing is swallowed. Provider-reported failures (non-"00" codes) are kept
//! distinct from transport failures so callers can branch on retryability.

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Authentication failed ({code}): {message}")]
    Auth { code: String, message: String },

    #[error("Provider error {code}: {description}")]
    Provider {
        code: String,
        description: String,
        message: Option<String>,
    },

    #[error("Transport error: {message}")]
    Transport { message: String, timed_out: bool },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Precondition violations on a payment record transition.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("Payment record not found")]
    NotFound,

    #[error("Payment is not in {expected} state (found {actual})")]
    InvalidStatus {
        expected: &'static str,
        actual: String,
    },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        GatewayError::Validation {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }

    /// Stable machine-facing code for the response envelope.
    pub fn error_code(&self) -> String {
        match self {
            GatewayError::Validation { .. } => "VALIDATION_ERROR".to_string(),
            GatewayError::Auth { .. } => "AUTH_ERROR".to_string(),
            GatewayError::Provider { code, .. } => code.clone(),
            GatewayError::Transport { .. } => "TRANSPORT_ERROR".to_string(),
            GatewayError::State(StateError::NotFound) => "PAYMENT_NOT_FOUND".to_string(),
            GatewayError::State(StateError::InvalidStatus { .. }) => "INVALID_STATUS".to_string(),
            GatewayError::Storage(_) => "STORAGE_ERROR".to_string(),
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            GatewayError::Validation { .. } => 400,
            GatewayError::Auth { .. } => 401,
            GatewayError::Provider { description, .. } => {
                if description == crate::gateway::codes::UNKNOWN_ERROR {
                    406
                } else {
                    502
                }
            }
            GatewayError::Transport { .. } => 504,
            GatewayError::State(StateError::NotFound) => 404,
            GatewayError::State(StateError::InvalidStatus { .. }) => 409,
            GatewayError::Storage(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }

    /// Message suitable for end-user-facing flows. Provider codes are
    /// translated through the static description table; machine flows keep
    /// the raw code via [`GatewayError::error_code`].
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Validation { message, .. } => message.clone(),
            GatewayError::Auth { message, .. } => message.clone(),
            GatewayError::Provider { description, .. } => description.clone(),
            GatewayError::Transport { timed_out, .. } => {
                if *timed_out {
                    "Payment provider request timed out. Please try again".to_string()
                } else {
                    "Payment provider is temporarily unavailable".to_string()
                }
            }
            GatewayError::State(err) => err.to_string(),
            GatewayError::Storage(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
        }
    }
}

impl From<crate::database::error::DatabaseError> for GatewayError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        GatewayError::Storage(err.to_string())
    }
}
