//! Signature request manager
//!
//! Owns the request entity and its state machine:
//! `pending -> otp_sent -> signed | declined | expired | cancelled`.
//! Expiry is detected lazily on access; there is no background sweeper,
//! so the `expired` transition happens on the first access after the
//! deadline, which is the first moment it can matter.

use chrono::{Duration, Utc};
use firma_core::{status::ALLOWED_EXPIRY_DAYS, AuditAction, RequestStatus};
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::auth::ClientMeta;
use crate::error::ApiError;
use crate::models::{
    CreateSignatureRequest, CreateSignatureResponse, DbSignatureRequest, DbSignatureOtp,
    SignatureDetailResponse, SignatureRequestView,
};
use crate::state::AppState;

const REQUEST_COLUMNS: &str = "id, document_type, document_title, document_url, signed_pdf_url, \
     signer_name, signer_email, signer_phone, signer_client_id, message, status, expires_at, \
     signed_at, decline_reason, requester_id, created_at";

/// Load one request or fail with `NotFound`.
pub async fn load(state: &AppState, id: &str) -> Result<DbSignatureRequest, ApiError> {
    let request: Option<DbSignatureRequest> = sqlx::query_as(&format!(
        "SELECT {REQUEST_COLUMNS} FROM signature_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    request.ok_or(ApiError::NotFound)
}

/// Lazily persist the `expired` transition if the deadline has passed.
///
/// Returns `true` when the request is past its deadline (whether this
/// call performed the transition or a concurrent one already had); the
/// audit entry is written only by the call that actually flipped the row.
pub async fn expire_if_due(
    state: &AppState,
    request: &DbSignatureRequest,
    meta: &ClientMeta,
) -> Result<bool, ApiError> {
    if request.status.is_terminal() {
        return Ok(request.status == RequestStatus::Expired);
    }
    if Utc::now() <= request.expires_at {
        return Ok(false);
    }

    let affected = sqlx::query(
        "UPDATE signature_requests SET status = 'expired'
         WHERE id = ? AND status IN ('pending', 'otp_sent')",
    )
    .bind(&request.id)
    .execute(&state.db)
    .await?
    .rows_affected();

    if affected == 1 {
        audit::append(
            &state.db,
            &request.id,
            AuditAction::Expired,
            meta.ip.as_deref(),
            meta.user_agent.as_deref(),
            None,
        )
        .await?;
        tracing::info!("request {} expired lazily on access", request.id);
    }

    Ok(true)
}

fn validate_create(req: &CreateSignatureRequest) -> Result<(), ApiError> {
    if req.document_title.trim().is_empty() {
        return Err(ApiError::Validation("documentTitle must not be empty".into()));
    }
    if !req.document_url.starts_with("http://") && !req.document_url.starts_with("https://") {
        return Err(ApiError::Validation(
            "documentUrl must be an http(s) URL".into(),
        ));
    }
    if req.signer_name.trim().is_empty() {
        return Err(ApiError::Validation("signerName must not be empty".into()));
    }
    let email = req.signer_email.trim();
    if !email.contains('@') || !email.contains('.') || email.len() < 6 {
        return Err(ApiError::Validation(
            "signerEmail is not a valid email address".into(),
        ));
    }
    if !ALLOWED_EXPIRY_DAYS.contains(&req.expires_in_days) {
        return Err(ApiError::Validation(format!(
            "expiresInDays must be one of {:?}",
            ALLOWED_EXPIRY_DAYS
        )));
    }
    Ok(())
}

/// Create a signature request and hand back the public sign link.
pub async fn create(
    state: &AppState,
    requester_id: &str,
    req: CreateSignatureRequest,
    meta: &ClientMeta,
) -> Result<CreateSignatureResponse, ApiError> {
    validate_create(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::days(req.expires_in_days);

    sqlx::query(
        r#"
        INSERT INTO signature_requests
            (id, document_type, document_title, document_url, signer_name, signer_email,
             signer_phone, signer_client_id, message, status, expires_at, requester_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.document_type)
    .bind(req.document_title.trim())
    .bind(&req.document_url)
    .bind(req.signer_name.trim())
    .bind(req.signer_email.trim().to_lowercase())
    .bind(&req.signer_phone)
    .bind(&req.signer_client_id)
    .bind(&req.message)
    .bind(expires_at.to_rfc3339())
    .bind(requester_id)
    .bind(now.to_rfc3339())
    .execute(&state.db)
    .await?;

    audit::append(
        &state.db,
        &id,
        AuditAction::Created,
        meta.ip.as_deref(),
        meta.user_agent.as_deref(),
        Some(json!({
            "documentType": req.document_type,
            "expiresInDays": req.expires_in_days,
        })),
    )
    .await?;

    let token = state
        .sign_tokens
        .issue(&id, expires_at)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("token issue failed: {e}")))?;
    let sign_link = format!("{}/sign/{}", state.config.base_url.trim_end_matches('/'), token);

    tracing::info!("created signature request {} for {}", id, requester_id);

    let request = load(state, &id).await?;
    Ok(CreateSignatureResponse {
        request: request.into(),
        sign_link,
    })
}

/// Requester-facing detail projection: request, OTP history, audit trail.
pub async fn get_detail(
    state: &AppState,
    id: &str,
    requester_id: &str,
    meta: &ClientMeta,
) -> Result<SignatureDetailResponse, ApiError> {
    let request = load(state, id).await?;
    if request.requester_id != requester_id {
        return Err(ApiError::Forbidden);
    }

    expire_if_due(state, &request, meta).await?;
    let request = load(state, id).await?;

    let otps: Vec<DbSignatureOtp> = sqlx::query_as(
        r#"
        SELECT id, request_id, otp_hash, channel, sent_to, expires_at, is_used,
               attempts, max_attempts, created_at
        FROM signature_otps
        WHERE request_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let audit = audit::list(&state.db, id).await?;

    Ok(SignatureDetailResponse {
        request: request.into(),
        otps: otps.into_iter().map(Into::into).collect(),
        audit: audit.into_iter().map(Into::into).collect(),
    })
}

/// Cancel a request. Only the requester may cancel, and only while the
/// request is still open. A rejected repeat cancel is not audited.
pub async fn cancel(
    state: &AppState,
    id: &str,
    caller_id: &str,
    meta: &ClientMeta,
) -> Result<SignatureRequestView, ApiError> {
    let request = load(state, id).await?;
    if request.requester_id != caller_id {
        return Err(ApiError::Forbidden);
    }
    if request.status.is_terminal() {
        return Err(ApiError::RequestTerminal);
    }

    let affected = sqlx::query(
        "UPDATE signature_requests SET status = 'cancelled'
         WHERE id = ? AND status IN ('pending', 'otp_sent')",
    )
    .bind(id)
    .execute(&state.db)
    .await?
    .rows_affected();

    if affected == 0 {
        // Lost a race against another terminal transition.
        return Err(ApiError::RequestTerminal);
    }

    audit::append(
        &state.db,
        id,
        AuditAction::Cancelled,
        meta.ip.as_deref(),
        meta.user_agent.as_deref(),
        None,
    )
    .await?;

    let request = load(state, id).await?;
    Ok(request.into())
}

/// Decline on behalf of the signer. Requires a reason.
pub async fn decline(
    state: &AppState,
    request: &DbSignatureRequest,
    reason: &str,
    meta: &ClientMeta,
) -> Result<SignatureRequestView, ApiError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ApiError::Validation("a decline reason is required".into()));
    }

    if request.status.is_terminal() {
        return Err(ApiError::RequestTerminal);
    }
    if expire_if_due(state, request, meta).await? {
        return Err(ApiError::OtpExpired);
    }

    let affected = sqlx::query(
        "UPDATE signature_requests SET status = 'declined', decline_reason = ?
         WHERE id = ? AND status IN ('pending', 'otp_sent')",
    )
    .bind(reason)
    .bind(&request.id)
    .execute(&state.db)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::RequestTerminal);
    }

    audit::append(
        &state.db,
        &request.id,
        AuditAction::Declined,
        meta.ip.as_deref(),
        meta.user_agent.as_deref(),
        Some(json!({ "reason": reason })),
    )
    .await?;

    let request = load(state, &request.id).await?;
    Ok(request.into())
}
