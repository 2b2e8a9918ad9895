//! Write-only audit trail for reconciliation outcomes.

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub uid: Uuid,
    pub user_id: i64,
    pub transaction_id: String,
    pub order_no: String,
    pub status: String,
    pub amount: BigDecimal,
    pub details: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub transaction_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivityLogEntry {
    pub user_id: i64,
    pub transaction_id: String,
    pub order_no: String,
    pub status: String,
    pub amount: BigDecimal,
    pub details: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn record(&self, entry: NewActivityLogEntry) -> Result<ActivityLogEntry, DatabaseError>;
}

pub struct ActivityLogRepository {
    pool: PgPool,
}

impl ActivityLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogStore for ActivityLogRepository {
    async fn record(&self, entry: NewActivityLogEntry) -> Result<ActivityLogEntry, DatabaseError> {
        sqlx::query_as::<_, ActivityLogEntry>(
            "INSERT INTO payfast_activity_log \
                 (user_id, transaction_id, order_no, status, amount, details, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, uid, user_id, transaction_id, order_no, status, amount, \
                       details, metadata, transaction_date",
        )
        .bind(entry.user_id)
        .bind(&entry.transaction_id)
        .bind(&entry.order_no)
        .bind(&entry.status)
        .bind(&entry.amount)
        .bind(&entry.details)
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
