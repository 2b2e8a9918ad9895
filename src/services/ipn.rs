//! IPN (instant payment notification) reconciliation.
//!
//! Notifications arrive at-least-once and out of order. Idempotency comes
//! from the unique transaction key in the IPN log; completion stickiness
//! comes from the conditional status updates in the payment store. A late
//! "failed" after a "completed" therefore changes nothing.

use crate::database::ipn_log_repository::{IpnLogStore, NewIpnLogEntry};
use crate::database::payment_repository::PaymentStore;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::types::PaymentStatus;
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

const TRANSACTION_ID_KEYS: &[&str] = &[
    "transaction_id",
    "transactionId",
    "TRANSACTION_ID",
    "txn_id",
];
const ORDER_KEYS: &[&str] = &[
    "basket_id",
    "basketId",
    "BASKET_ID",
    "order_no",
    "orderNumber",
    "ORDER_NO",
    "order_id",
];
const STATUS_KEYS: &[&str] = &[
    "status",
    "Status",
    "STATUS",
    "transaction_status",
    "err_code",
    "errCode",
    "code",
    "CODE",
];
const AMOUNT_KEYS: &[&str] = &[
    "transaction_amount",
    "txnamt",
    "TXNAMT",
    "amount",
    "AMOUNT",
];
const CURRENCY_KEYS: &[&str] = &[
    "transaction_currency",
    "currency_code",
    "CURRENCY_CODE",
    "currency",
    "CURRENCY",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpnOutcome {
    /// First sighting of this transaction. `new_status` is None when the
    /// provider status did not map to a known terminal state or no payment
    /// record matched.
    Processed {
        transaction_id: String,
        new_status: Option<PaymentStatus>,
    },
    /// Duplicate delivery; logged once, no further effects.
    AlreadyProcessed { transaction_id: String },
}

/// Maps a provider-reported status to a terminal payment status.
/// Exact lowercase matches first, then a substring fallback. Unknown
/// values map to None and leave the record untouched.
pub fn map_ipn_status(raw: &str) -> Option<PaymentStatus> {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "00" | "completed" | "success" => return Some(PaymentStatus::Completed),
        "failed" | "failure" => return Some(PaymentStatus::Failed),
        "cancelled" | "cancel" => return Some(PaymentStatus::Cancelled),
        _ => {}
    }
    if normalized.contains("success") {
        Some(PaymentStatus::Completed)
    } else if normalized.contains("fail") {
        Some(PaymentStatus::Failed)
    } else if normalized.contains("cancel") {
        Some(PaymentStatus::Cancelled)
    } else {
        None
    }
}

/// First non-empty string under any of the candidate keys.
fn extract<'a>(payload: &'a JsonValue, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = payload.get(key) {
            let text = match value {
                JsonValue::String(s) => s.trim().to_string(),
                JsonValue::Number(n) => n.to_string(),
                _ => continue,
            };
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

pub struct IpnService {
    payments: Arc<dyn PaymentStore>,
    ipn_log: Arc<dyn IpnLogStore>,
    notifier: Arc<dyn crate::services::notification::Notifier>,
}

impl IpnService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        ipn_log: Arc<dyn IpnLogStore>,
        notifier: Arc<dyn crate::services::notification::Notifier>,
    ) -> Self {
        Self {
            payments,
            ipn_log,
            notifier,
        }
    }

    pub async fn process_ipn(&self, payload: JsonValue) -> GatewayResult<IpnOutcome> {
        let transaction_id = extract(&payload, TRANSACTION_ID_KEYS);
        let order_no = extract(&payload, ORDER_KEYS);

        // A notification naming neither a transaction nor an order is noise.
        let dedup_key = match transaction_id.clone().or_else(|| order_no.clone()) {
            Some(key) => key,
            None => {
                warn!("rejected IPN carrying no transaction or order identifier");
                return Err(GatewayError::validation(
                    "IPN payload carries no transaction_id or basket_id",
                    None,
                ));
            }
        };

        let raw_status = extract(&payload, STATUS_KEYS).unwrap_or_default();
        let amount = extract(&payload, AMOUNT_KEYS)
            .and_then(|v| BigDecimal::from_str(&v).ok())
            .unwrap_or_else(|| BigDecimal::from(0));
        let currency =
            extract(&payload, CURRENCY_KEYS).unwrap_or_else(|| "PKR".to_string());

        let inserted = self
            .ipn_log
            .insert_if_absent(NewIpnLogEntry {
                order_no: order_no.clone(),
                transaction_id: dedup_key.clone(),
                status: raw_status.clone(),
                amount,
                currency,
                details: Some(payload.clone()),
            })
            .await?;

        if inserted.is_none() {
            info!(transaction_id = %dedup_key, "duplicate IPN dropped");
            return Ok(IpnOutcome::AlreadyProcessed {
                transaction_id: dedup_key,
            });
        }

        let new_status = self
            .update_payment_status(transaction_id.as_deref(), order_no.as_deref(), &raw_status)
            .await?;

        Ok(IpnOutcome::Processed {
            transaction_id: dedup_key,
            new_status,
        })
    }

    async fn update_payment_status(
        &self,
        transaction_id: Option<&str>,
        order_no: Option<&str>,
        raw_status: &str,
    ) -> GatewayResult<Option<PaymentStatus>> {
        let record = match transaction_id {
            Some(id) => self.payments.find_by_transaction_id(id).await?,
            None => None,
        };
        let record = match record {
            Some(record) => Some(record),
            None => match order_no {
                Some(order) => self.payments.find_by_order_no(order).await?,
                None => None,
            },
        };

        let Some(record) = record else {
            warn!(
                transaction_id = transaction_id.unwrap_or(""),
                order_no = order_no.unwrap_or(""),
                "IPN matched no payment record"
            );
            return Ok(None);
        };

        let Some(target) = map_ipn_status(raw_status) else {
            warn!(
                payment_id = record.id,
                status = %raw_status,
                "IPN carried unrecognized status, record left untouched"
            );
            return Ok(None);
        };

        let txn = record.transaction_id.clone().unwrap_or_default();
        let updated = match target {
            PaymentStatus::Completed => self.payments.complete_sticky(record.id).await?,
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                self.payments
                    .set_status_unless_completed(record.id, target)
                    .await?
            }
            _ => None,
        };

        match updated {
            Some(updated) => {
                info!(
                    payment_id = updated.id,
                    status = %updated.status,
                    "payment status reconciled from IPN"
                );
                match target {
                    PaymentStatus::Completed => {
                        self.notifier
                            .payment_completed(&txn, &record.order_no, &record.request_data)
                            .await;
                    }
                    PaymentStatus::Failed | PaymentStatus::Cancelled => {
                        self.notifier
                            .payment_failed(
                                &txn,
                                &record.order_no,
                                raw_status,
                                target.as_str(),
                                &record.request_data,
                            )
                            .await;
                    }
                    _ => {}
                }
                Ok(Some(target))
            }
            None => {
                // Conditional update refused: the record already reached a
                // state this notification may not overwrite.
                info!(
                    payment_id = record.id,
                    current = %record.status,
                    target = %target,
                    "IPN status update refused by state guard"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_status_values_map_to_terminal_states() {
        assert_eq!(map_ipn_status("00"), Some(PaymentStatus::Completed));
        assert_eq!(map_ipn_status("completed"), Some(PaymentStatus::Completed));
        assert_eq!(map_ipn_status("SUCCESS"), Some(PaymentStatus::Completed));
        assert_eq!(map_ipn_status("failed"), Some(PaymentStatus::Failed));
        assert_eq!(map_ipn_status("failure"), Some(PaymentStatus::Failed));
        assert_eq!(map_ipn_status("cancelled"), Some(PaymentStatus::Cancelled));
        assert_eq!(map_ipn_status("cancel"), Some(PaymentStatus::Cancelled));
    }

    #[test]
    fn substring_fallback_applies_after_exact_match() {
        assert_eq!(
            map_ipn_status("transaction successful"),
            Some(PaymentStatus::Completed)
        );
        assert_eq!(
            map_ipn_status("payment_failed_by_bank"),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(
            map_ipn_status("user cancelled at otp"),
            Some(PaymentStatus::Cancelled)
        );
    }

    #[test]
    fn unknown_status_maps_to_none() {
        assert_eq!(map_ipn_status("pending"), None);
        assert_eq!(map_ipn_status(""), None);
        assert_eq!(map_ipn_status("01"), None);
    }

    #[test]
    fn extract_accepts_case_variant_keys_first_match_wins() {
        let payload = serde_json::json!({
            "transactionId": "TXN-2",
            "txn_id": "TXN-3",
            "basket_id": "ORD-1"
        });
        assert_eq!(
            extract(&payload, TRANSACTION_ID_KEYS),
            Some("TXN-2".to_string())
        );
        assert_eq!(extract(&payload, ORDER_KEYS), Some("ORD-1".to_string()));
        assert_eq!(extract(&payload, STATUS_KEYS), None);
    }

    #[test]
    fn extract_accepts_uppercase_and_code_keys() {
        let upper = serde_json::json!({
            "TRANSACTION_ID": "TXN-9",
            "BASKET_ID": "ORD-9",
            "STATUS": "failed",
            "TXNAMT": "250.00",
            "CURRENCY": "PKR"
        });
        assert_eq!(
            extract(&upper, TRANSACTION_ID_KEYS),
            Some("TXN-9".to_string())
        );
        assert_eq!(extract(&upper, ORDER_KEYS), Some("ORD-9".to_string()));
        assert_eq!(extract(&upper, STATUS_KEYS), Some("failed".to_string()));
        assert_eq!(extract(&upper, AMOUNT_KEYS), Some("250.00".to_string()));
        assert_eq!(extract(&upper, CURRENCY_KEYS), Some("PKR".to_string()));

        // Some deliveries carry the provider code field instead of a
        // status word.
        let coded = serde_json::json!({ "transaction_id": "TXN-10", "code": "00" });
        assert_eq!(extract(&coded, STATUS_KEYS), Some("00".to_string()));
    }

    #[test]
    fn extract_reads_numbers_and_skips_empty_strings() {
        let payload = serde_json::json!({
            "transaction_id": "",
            "txn_id": 12345,
            "amount": 100.5
        });
        assert_eq!(
            extract(&payload, TRANSACTION_ID_KEYS),
            Some("12345".to_string())
        );
        assert_eq!(extract(&payload, AMOUNT_KEYS), Some("100.5".to_string()));
    }
}
