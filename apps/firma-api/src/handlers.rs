//! HTTP handlers for the Firma API
//!
//! Thin layer: extractors resolve identity and client metadata, the
//! request/OTP managers do the work.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use firma_core::TokenError;

use crate::auth::{ClientMeta, RequesterId};
use crate::error::ApiError;
use crate::models::{
    CreateSignatureRequest, CreateSignatureResponse, DbSignatureRequest, DeclineRequest,
    SendOtpResponse, SignViewResponse, SignatureDetailResponse, VerifyOtpRequest,
    VerifyOtpResponse,
};
use crate::state::AppState;
use crate::{otp, requests};

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Resolve a capability token from a sign link into its request.
async fn resolve_token(
    state: &AppState,
    token: &str,
) -> Result<DbSignatureRequest, ApiError> {
    let request_id = match state.sign_tokens.verify(token) {
        Ok(id) => id,
        Err(TokenError::Expired) => return Err(ApiError::TokenExpired),
        Err(TokenError::Invalid) => return Err(ApiError::TokenInvalid),
    };
    requests::load(state, &request_id).await
}

// ------------------------------------------------------------------
// Internal endpoints (requester)
// ------------------------------------------------------------------

/// Create a new signature request
pub async fn create_signature(
    State(state): State<Arc<AppState>>,
    RequesterId(requester): RequesterId,
    meta: ClientMeta,
    Json(req): Json<CreateSignatureRequest>,
) -> Result<(StatusCode, Json<CreateSignatureResponse>), ApiError> {
    let response = requests::create(&state, &requester, req, &meta).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Request detail with OTP history and audit trail
pub async fn get_signature(
    State(state): State<Arc<AppState>>,
    RequesterId(requester): RequesterId,
    meta: ClientMeta,
    Path(id): Path<String>,
) -> Result<Json<SignatureDetailResponse>, ApiError> {
    let detail = requests::get_detail(&state, &id, &requester, &meta).await?;
    Ok(Json(detail))
}

/// Send (or resend) the OTP to the signer
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    RequesterId(requester): RequesterId,
    meta: ClientMeta,
    Path(id): Path<String>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let request = requests::load(&state, &id).await?;
    if request.requester_id != requester {
        return Err(ApiError::Forbidden);
    }
    let response = otp::send_otp(&state, &id, &meta).await?;
    Ok(Json(response))
}

/// Cancel an open request
pub async fn cancel_signature(
    State(state): State<Arc<AppState>>,
    RequesterId(requester): RequesterId,
    meta: ClientMeta,
    Path(id): Path<String>,
) -> Result<Json<crate::models::SignatureRequestView>, ApiError> {
    let view = requests::cancel(&state, &id, &requester, &meta).await?;
    Ok(Json(view))
}

// ------------------------------------------------------------------
// Public endpoints (capability token)
// ------------------------------------------------------------------

/// Signer-facing view of the request behind a sign link.
///
/// Any access past the deadline persists the expired transition, so the
/// returned status is trustworthy at the moment it is read.
pub async fn get_sign_view(
    State(state): State<Arc<AppState>>,
    meta: ClientMeta,
    Path(token): Path<String>,
) -> Result<Json<SignViewResponse>, ApiError> {
    let request = resolve_token(&state, &token).await?;
    requests::expire_if_due(&state, &request, &meta).await?;
    let request = requests::load(&state, &request.id).await?;

    Ok(Json(SignViewResponse {
        document_type: request.document_type,
        document_title: request.document_title,
        document_url: request.document_url,
        signer_name: request.signer_name,
        message: request.message,
        status: request.status,
        expires_at: request.expires_at,
    }))
}

/// Verify the submitted OTP and sign the document
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    meta: ClientMeta,
    Path(token): Path<String>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let request = resolve_token(&state, &token).await?;
    let response = otp::verify_otp(&state, &request, body.otp.trim(), &meta).await?;
    Ok(Json(response))
}

/// Decline the request on behalf of the signer
pub async fn decline_signature(
    State(state): State<Arc<AppState>>,
    meta: ClientMeta,
    Path(token): Path<String>,
    Json(body): Json<DeclineRequest>,
) -> Result<Json<SignViewResponse>, ApiError> {
    let request = resolve_token(&state, &token).await?;
    let view = requests::decline(&state, &request, &body.reason, &meta).await?;

    Ok(Json(SignViewResponse {
        document_type: view.document_type,
        document_title: view.document_title,
        document_url: view.document_url,
        signer_name: view.signer_name,
        message: view.message,
        status: view.status,
        expires_at: view.expires_at,
    }))
}
