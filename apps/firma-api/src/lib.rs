//! Firma API - digital signature request workflow
//!
//! An internal user creates a signature request for a quote or contract;
//! the external signer opens a capability-token link, receives a one-time
//! passcode by email, and verifying it produces a stamped PDF plus an
//! append-only audit trail.

pub mod audit;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod models;
pub mod otp;
pub mod requests;
pub mod stamper;
pub mod state;
pub mod storage;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let files = ServeDir::new(state.config.data_dir.join("signed"));

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Internal, authenticated (requester)
        .route("/api/signatures", post(handlers::create_signature))
        .route("/api/signatures/:id", get(handlers::get_signature))
        .route("/api/signatures/:id/send-otp", post(handlers::send_otp))
        .route("/api/signatures/:id", delete(handlers::cancel_signature))
        // Public, capability token in path
        .route("/sign/:token", get(handlers::get_sign_view))
        .route("/sign/:token/verify", post(handlers::verify_otp))
        .route("/sign/:token/decline", post(handlers::decline_signature))
        // Stamped PDF downloads
        .nest_service("/files", files)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
