//! In-memory doubles for the storage and provider seams.
//!
//! The stores mirror the SQL semantics of the real repositories, in
//! particular the conditional status updates, so the services can be
//! exercised without a database.

#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use payfast_gateway::database::activity_log_repository::{
    ActivityLogEntry, ActivityLogStore, NewActivityLogEntry,
};
use payfast_gateway::database::error::DatabaseError;
use payfast_gateway::database::ipn_log_repository::{IpnLogEntry, IpnLogStore, NewIpnLogEntry};
use payfast_gateway::database::payment_repository::{
    NewPaymentRecord, PaymentRecord, PaymentStore,
};
use payfast_gateway::error::{GatewayError, GatewayResult};
use payfast_gateway::gateway::client::ProviderGateway;
use payfast_gateway::gateway::types::{
    AuthToken, CardPaymentRequest, PaymentStatus, ProviderResponse, RefundRequest,
    ValidationOutcome, WalletPaymentRequest,
};
use payfast_gateway::services::notification::Notifier;

// ---------------------------------------------------------------------------
// Payment store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPaymentStore {
    records: Mutex<Vec<PaymentRecord>>,
    next_id: AtomicI64,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn get(&self, id: i64) -> Option<PaymentRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Force a record into a given status, bypassing the guards.
    pub fn force_status(&self, id: i64, status: PaymentStatus) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.status = status.as_str().to_string();
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now();
        let entity = PaymentRecord {
            id,
            uid: Uuid::new_v4(),
            order_no: record.order_no,
            transaction_id: record.transaction_id,
            data_3ds_secureid: record.data_3ds_secureid,
            data_3ds_pares: None,
            status: record.status.as_str().to_string(),
            payment_method: record.payment_method.as_str().to_string(),
            payload: record.payload,
            request_data: record.request_data,
            otp_verified_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.records.lock().unwrap().push(entity.clone());
        Ok(entity)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| {
                r.transaction_id.as_deref() == Some(transaction_id) && r.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_by_order_no(
        &self,
        order_no: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.order_no == order_no && r.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_pares(&self, pares: &str) -> Result<Option<PaymentRecord>, DatabaseError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.data_3ds_pares.as_deref() == Some(pares) && r.deleted_at.is_none())
            .cloned())
    }

    async fn mark_otp_verified(
        &self,
        transaction_id: &str,
        pares: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        for record in records.iter_mut() {
            if record.transaction_id.as_deref() == Some(transaction_id)
                && record.status == PaymentStatus::Validated.as_str()
                && record.deleted_at.is_none()
            {
                record.status = PaymentStatus::OtpVerified.as_str().to_string();
                record.data_3ds_pares = Some(pares.to_string());
                record.otp_verified_at.get_or_insert(chrono::Utc::now());
                record.updated_at = chrono::Utc::now();
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn complete_from_otp(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        for record in records.iter_mut() {
            if record.id == id
                && record.status == PaymentStatus::OtpVerified.as_str()
                && record.deleted_at.is_none()
            {
                record.status = PaymentStatus::Completed.as_str().to_string();
                record.completed_at.get_or_insert(chrono::Utc::now());
                record.updated_at = chrono::Utc::now();
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn complete_sticky(&self, id: i64) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        for record in records.iter_mut() {
            if record.id == id
                && record.status != PaymentStatus::Failed.as_str()
                && record.status != PaymentStatus::Cancelled.as_str()
                && record.deleted_at.is_none()
            {
                record.status = PaymentStatus::Completed.as_str().to_string();
                record.completed_at.get_or_insert(chrono::Utc::now());
                record.updated_at = chrono::Utc::now();
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn set_status_unless_completed(
        &self,
        id: i64,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        for record in records.iter_mut() {
            if record.id == id
                && record.status != PaymentStatus::Completed.as_str()
                && record.deleted_at.is_none()
            {
                record.status = status.as_str().to_string();
                record.updated_at = chrono::Utc::now();
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn list_open(
        &self,
        limit: i64,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        let records = self.records.lock().unwrap();
        let open = ["pending", "validated", "otp_verified"];
        Ok(records
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| match status {
                Some(status) => r.status == status.as_str(),
                None => open.contains(&r.status.as_str()),
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// IPN log store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryIpnLogStore {
    entries: Mutex<HashMap<String, IpnLogEntry>>,
    next_id: AtomicI64,
}

impl MemoryIpnLogStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl IpnLogStore for MemoryIpnLogStore {
    async fn insert_if_absent(
        &self,
        entry: NewIpnLogEntry,
    ) -> Result<Option<IpnLogEntry>, DatabaseError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&entry.transaction_id) {
            return Ok(None);
        }
        let stored = IpnLogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            uid: Uuid::new_v4(),
            order_no: entry.order_no,
            transaction_id: entry.transaction_id.clone(),
            status: entry.status,
            amount: entry.amount,
            currency: entry.currency,
            details: entry.details,
            received_at: chrono::Utc::now(),
        };
        entries.insert(entry.transaction_id, stored.clone());
        Ok(Some(stored))
    }
}

// ---------------------------------------------------------------------------
// Activity log store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryActivityLogStore {
    entries: Mutex<Vec<ActivityLogEntry>>,
    next_id: AtomicI64,
}

impl MemoryActivityLogStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityLogStore for MemoryActivityLogStore {
    async fn record(&self, entry: NewActivityLogEntry) -> Result<ActivityLogEntry, DatabaseError> {
        let stored = ActivityLogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            uid: Uuid::new_v4(),
            user_id: entry.user_id,
            transaction_id: entry.transaction_id,
            order_no: entry.order_no,
            status: entry.status,
            amount: entry.amount,
            details: entry.details,
            metadata: entry.metadata,
            transaction_date: chrono::Utc::now(),
        };
        self.entries.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Provider gateway mock
// ---------------------------------------------------------------------------

pub fn ok_response(code: &str) -> ProviderResponse {
    ProviderResponse::from_json(json!({ "code": code }))
}

pub struct MockGateway {
    pub token_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub initiate_calls: AtomicUsize,
    pub basket_calls: AtomicUsize,
    token_result: Mutex<Result<AuthToken, GatewayError>>,
    validate_result: Mutex<Result<ValidationOutcome, GatewayError>>,
    initiate_result: Mutex<Result<ProviderResponse, GatewayError>>,
    basket_results: Mutex<HashMap<String, Result<ProviderResponse, GatewayError>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            token_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            initiate_calls: AtomicUsize::new(0),
            basket_calls: AtomicUsize::new(0),
            token_result: Mutex::new(Ok(AuthToken {
                token: "test-token".to_string(),
                refresh_token: Some("test-refresh".to_string()),
                expires_in: Some(3600),
            })),
            validate_result: Mutex::new(Ok(ValidationOutcome {
                transaction_id: "TXN-1".to_string(),
                data_3ds_secure_id: "SEC-1".to_string(),
                redirect_url: Some("https://3ds.example.com/acs".to_string()),
                raw: json!({ "code": "00", "transaction_id": "TXN-1" }),
            })),
            initiate_result: Mutex::new(Ok(ok_response("00"))),
            basket_results: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_token_result(&self, result: Result<AuthToken, GatewayError>) {
        *self.token_result.lock().unwrap() = result;
    }

    pub fn set_validate_result(&self, result: Result<ValidationOutcome, GatewayError>) {
        *self.validate_result.lock().unwrap() = result;
    }

    pub fn set_initiate_result(&self, result: Result<ProviderResponse, GatewayError>) {
        *self.initiate_result.lock().unwrap() = result;
    }

    pub fn set_basket_result(
        &self,
        basket_id: &str,
        result: Result<ProviderResponse, GatewayError>,
    ) {
        self.basket_results
            .lock()
            .unwrap()
            .insert(basket_id.to_string(), result);
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    async fn get_token(&self) -> GatewayResult<AuthToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.token_result.lock().unwrap().clone()
    }

    async fn refresh_token(&self, _token: &AuthToken) -> GatewayResult<AuthToken> {
        self.token_result.lock().unwrap().clone()
    }

    async fn validate_customer(
        &self,
        _request: &CardPaymentRequest,
        _token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validate_result.lock().unwrap().clone()
    }

    async fn initiate_transaction(
        &self,
        _request: &CardPaymentRequest,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.initiate_result.lock().unwrap().clone()
    }

    async fn validate_wallet(
        &self,
        _request: &WalletPaymentRequest,
        _bank_code: u32,
        _token: &AuthToken,
    ) -> GatewayResult<ValidationOutcome> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validate_result.lock().unwrap().clone()
    }

    async fn wallet_transaction_initiate(
        &self,
        _request: &WalletPaymentRequest,
        _bank_code: u32,
        _transaction_id: &str,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.initiate_result.lock().unwrap().clone()
    }

    async fn transaction_details(
        &self,
        _transaction_id: &str,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn transaction_details_by_basket(
        &self,
        _basket_id: &str,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn refund_transaction(
        &self,
        _request: &RefundRequest,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn void_transaction(
        &self,
        _transaction_id: &str,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn settlement_status(
        &self,
        _transaction_id: &str,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn list_banks(&self, _token: &AuthToken) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn list_instruments(
        &self,
        _bank_code: u32,
        _token: &AuthToken,
    ) -> GatewayResult<ProviderResponse> {
        Ok(ok_response("00"))
    }

    async fn check_basket_status(&self, basket_id: &str) -> GatewayResult<ProviderResponse> {
        self.basket_calls.fetch_add(1, Ordering::SeqCst);
        self.basket_results
            .lock()
            .unwrap()
            .get(basket_id)
            .cloned()
            .unwrap_or_else(|| Ok(ok_response("00")))
    }
}

// ---------------------------------------------------------------------------
// Notifier double
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub completed: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn payment_completed(
        &self,
        transaction_id: &str,
        _order_no: &str,
        _request: &serde_json::Value,
    ) {
        self.completed
            .lock()
            .unwrap()
            .push(transaction_id.to_string());
    }

    async fn payment_failed(
        &self,
        transaction_id: &str,
        _order_no: &str,
        code: &str,
        _description: &str,
        _request: &serde_json::Value,
    ) {
        self.failed
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), code.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn card_request(order_no: &str) -> CardPaymentRequest {
    CardPaymentRequest {
        order_number: order_no.to_string(),
        transaction_amount: "1500.00".to_string(),
        customer_mobile_no: "03001234567".to_string(),
        customer_email: "customer@example.com".to_string(),
        card_number: "4111111111111111".to_string(),
        expiry_month: "09".to_string(),
        expiry_year: "2027".to_string(),
        cvv: "123".to_string(),
        user_id: None,
        transaction_id: None,
        data_3ds_pares: None,
        data_3ds_secure_id: None,
    }
}

pub fn wallet_request(order_no: &str) -> WalletPaymentRequest {
    WalletPaymentRequest {
        order_number: order_no.to_string(),
        transaction_amount: "800.00".to_string(),
        customer_mobile_no: "03007654321".to_string(),
        customer_email: "wallet@example.com".to_string(),
        account_number: None,
    }
}
