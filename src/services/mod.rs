pub mod ipn;
pub mod notification;
pub mod otp;
pub mod payment_flow;

pub use ipn::{IpnOutcome, IpnService};
pub use notification::{LogNotifier, Notifier};
pub use otp::OtpService;
pub use payment_flow::PaymentFlowService;
