pub mod pending_payments;

pub use pending_payments::{PendingPaymentsWorker, SweepOptions, SweepSummary};
