pub mod client;
pub mod codes;
pub mod http;
pub mod types;

pub use client::{PayfastClient, ProviderGateway};
pub use types::{
    AuthToken, CardPaymentRequest, PaymentMethod, PaymentStatus, ProviderResponse,
    RefundRequest, ValidationOutcome, WalletPaymentRequest,
};
