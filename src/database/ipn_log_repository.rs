//! Append-only IPN log.
//!
//! The UNIQUE key on `transaction_id` is the idempotency mechanism: the
//! first notification for a transaction claims the row, every replay sees
//! the conflict and is dropped without side effects.

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct IpnLogEntry {
    pub id: i64,
    pub uid: Uuid,
    pub order_no: Option<String>,
    pub transaction_id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub details: Option<serde_json::Value>,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIpnLogEntry {
    pub order_no: Option<String>,
    pub transaction_id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub details: Option<serde_json::Value>,
}

#[async_trait]
pub trait IpnLogStore: Send + Sync {
    /// Inserts the entry unless one already exists for its transaction id.
    /// `None` means a duplicate; the caller treats that as already processed.
    async fn insert_if_absent(
        &self,
        entry: NewIpnLogEntry,
    ) -> Result<Option<IpnLogEntry>, DatabaseError>;
}

pub struct IpnLogRepository {
    pool: PgPool,
}

impl IpnLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IpnLogStore for IpnLogRepository {
    async fn insert_if_absent(
        &self,
        entry: NewIpnLogEntry,
    ) -> Result<Option<IpnLogEntry>, DatabaseError> {
        sqlx::query_as::<_, IpnLogEntry>(
            "INSERT INTO payfast_ipn_log \
                 (order_no, transaction_id, status, amount, currency, details) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (transaction_id) DO NOTHING \
             RETURNING id, uid, order_no, transaction_id, status, amount, currency, \
                       details, received_at",
        )
        .bind(&entry.order_no)
        .bind(&entry.transaction_id)
        .bind(&entry.status)
        .bind(&entry.amount)
        .bind(&entry.currency)
        .bind(&entry.details)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
