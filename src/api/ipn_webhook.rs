//! Inbound webhook handlers.
//!
//! PayFast posts IPNs as either JSON or form-encoded bodies, so both are
//! accepted here. The response envelope is always
//! `{status: bool, data|message, code}`; duplicates answer success so the
//! provider stops re-delivering.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::GatewayError;
use crate::services::ipn::IpnOutcome;

const CODE_SUCCESS: &str = "00";
const CODE_ALREADY_PROCESSED: &str = "ALREADY_PROCESSED";
const CODE_INVALID_IPN: &str = "INVALID_IPN";
const CODE_IPN_ERROR: &str = "IPN_ERROR";

/// Parses a body that may be JSON or form-encoded into a JSON object.
fn parse_body(body: &str) -> Option<JsonValue> {
    if let Ok(value) = serde_json::from_str::<JsonValue>(body) {
        if value.is_object() {
            return Some(value);
        }
    }
    serde_urlencoded::from_str::<HashMap<String, String>>(body)
        .ok()
        .filter(|map| !map.is_empty())
        .map(|map| json!(map))
}

fn success(data: JsonValue, code: &str) -> Json<JsonValue> {
    Json(json!({ "status": true, "data": data, "code": code }))
}

fn failure(message: &str, code: &str) -> Json<JsonValue> {
    Json(json!({ "status": false, "message": message, "code": code }))
}

/// POST /payfast/ipn
pub async fn handle_ipn(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let Some(payload) = parse_body(&body) else {
        warn!("IPN body was neither JSON nor form-encoded");
        return (
            StatusCode::BAD_REQUEST,
            failure("unreadable IPN body", CODE_INVALID_IPN),
        )
            .into_response();
    };

    match state.ipn.process_ipn(payload).await {
        Ok(IpnOutcome::Processed {
            transaction_id,
            new_status,
        }) => {
            info!(transaction_id = %transaction_id, "IPN processed");
            success(
                json!({
                    "transaction_id": transaction_id,
                    "new_status": new_status.map(|s| s.as_str()),
                }),
                CODE_SUCCESS,
            )
            .into_response()
        }
        Ok(IpnOutcome::AlreadyProcessed { transaction_id }) => success(
            json!({ "transaction_id": transaction_id }),
            CODE_ALREADY_PROCESSED,
        )
        .into_response(),
        Err(err @ GatewayError::Validation { .. }) => (
            StatusCode::BAD_REQUEST,
            failure(&err.user_message(), CODE_INVALID_IPN),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "IPN processing failed");
            (
                StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                failure(&err.user_message(), CODE_IPN_ERROR),
            )
                .into_response()
        }
    }
}

/// POST /payfast/callback -- the 3DS return carrying the pares.
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let Some(payload) = parse_body(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            failure("unreadable callback body", CODE_INVALID_IPN),
        )
            .into_response();
    };

    let pares = ["data_3ds_pares", "pares", "PaRes"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("");
    if pares.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            failure("callback carries no pares", CODE_INVALID_IPN),
        )
            .into_response();
    }

    match state.otp.complete_transaction_from_pares(pares).await {
        Ok(record) => success(
            json!({
                "transaction_id": record.transaction_id,
                "order_no": record.order_no,
                "status": record.status,
            }),
            CODE_SUCCESS,
        )
        .into_response(),
        Err(err) => {
            warn!(error = %err, "3DS callback completion failed");
            (
                StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                failure(&err.user_message(), &err.error_code()),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match crate::database::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}
