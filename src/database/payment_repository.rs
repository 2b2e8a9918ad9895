//! Payment record storage.
//!
//! Status transitions are compare-and-swap updates: the expected prior
//! status is part of the SQL predicate, so a concurrent writer that got
//! there first makes the update a no-op instead of clobbering its result.
//! `None` from a transition method means the precondition did not hold.

use crate::database::error::DatabaseError;
use crate::gateway::types::{PaymentMethod, PaymentStatus};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, uid, order_no, transaction_id, data_3ds_secureid, \
     data_3ds_pares, status, payment_method, payload, request_data, \
     otp_verified_at, completed_at, created_at, updated_at, deleted_at";

/// Payment record entity
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub uid: Uuid,
    pub order_no: String,
    pub transaction_id: Option<String>,
    pub data_3ds_secureid: String,
    pub data_3ds_pares: Option<String>,
    pub status: String,
    pub payment_method: String,
    pub payload: serde_json::Value,
    pub request_data: serde_json::Value,
    pub otp_verified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentRecord {
    pub fn parsed_status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }
}

/// Insertable payment record
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub order_no: String,
    pub transaction_id: Option<String>,
    pub data_3ds_secureid: String,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payload: serde_json::Value,
    pub request_data: serde_json::Value,
}

/// Storage seam for payment records. Backed by Postgres in production and
/// by an in-memory double in tests.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError>;
    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;
    async fn find_by_order_no(
        &self,
        order_no: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;
    async fn find_by_pares(&self, pares: &str) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Validated -> OtpVerified, storing the 3DS pares and stamping
    /// `otp_verified_at`. `None` when the record is missing or not Validated.
    async fn mark_otp_verified(
        &self,
        transaction_id: &str,
        pares: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// OtpVerified -> Completed. `completed_at` is stamped only when unset.
    async fn complete_from_otp(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Transition to Completed from any non-terminal-failure state.
    /// Idempotent on an already-Completed record; refuses Failed/Cancelled.
    async fn complete_sticky(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Transition to `status` unless the record already reached Completed.
    async fn set_status_unless_completed(
        &self,
        id: i64,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Records still awaiting a terminal state, oldest first.
    async fn list_open(
        &self,
        limit: i64,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, DatabaseError>;
}

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "INSERT INTO payfast_process_payments \
                 (order_no, transaction_id, data_3ds_secureid, status, payment_method, payload, request_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(&record.order_no)
        .bind(&record.transaction_id)
        .bind(&record.data_3ds_secureid)
        .bind(record.status.as_str())
        .bind(record.payment_method.as_str())
        .bind(&record.payload)
        .bind(&record.request_data)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payfast_process_payments \
             WHERE transaction_id = $1 AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_order_no(
        &self,
        order_no: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payfast_process_payments \
             WHERE order_no = $1 AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_pares(&self, pares: &str) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payfast_process_payments \
             WHERE data_3ds_pares = $1 AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(pares)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_otp_verified(
        &self,
        transaction_id: &str,
        pares: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payfast_process_payments \
             SET status = 'otp_verified', data_3ds_pares = $2, \
                 otp_verified_at = COALESCE(otp_verified_at, NOW()), updated_at = NOW() \
             WHERE transaction_id = $1 AND status = 'validated' AND deleted_at IS NULL \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(transaction_id)
        .bind(pares)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn complete_from_otp(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payfast_process_payments \
             SET status = 'completed', completed_at = COALESCE(completed_at, NOW()), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'otp_verified' AND deleted_at IS NULL \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn complete_sticky(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payfast_process_payments \
             SET status = 'completed', completed_at = COALESCE(completed_at, NOW()), \
                 updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('failed', 'cancelled') AND deleted_at IS NULL \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn set_status_unless_completed(
        &self,
        id: i64,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payfast_process_payments \
             SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status <> 'completed' AND deleted_at IS NULL \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn list_open(
        &self,
        limit: i64,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        match status {
            Some(status) => sqlx::query_as::<_, PaymentRecord>(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payfast_process_payments \
                 WHERE status = $1 AND deleted_at IS NULL \
                 ORDER BY created_at ASC LIMIT $2"
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx),
            None => sqlx::query_as::<_, PaymentRecord>(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payfast_process_payments \
                 WHERE status IN ('pending', 'validated', 'otp_verified') \
                   AND deleted_at IS NULL \
                 ORDER BY created_at ASC LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx),
        }
    }
}
