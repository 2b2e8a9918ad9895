pub mod ipn_webhook;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{IpnService, OtpService};

pub struct AppState {
    pub ipn: Arc<IpnService>,
    pub otp: Arc<OtpService>,
    pub pool: PgPool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/payfast/ipn", post(ipn_webhook::handle_ipn))
        .route("/payfast/callback", post(ipn_webhook::handle_callback))
        .route("/health", get(ipn_webhook::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
