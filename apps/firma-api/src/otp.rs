//! OTP manager: send and verify one-time passcodes
//!
//! Sending always inserts a fresh row; "the active OTP" is the latest
//! unused, unexpired row, derived by query at verify time. Verification
//! counts attempts through a single conditional UPDATE with RETURNING,
//! so two racing calls can never push `attempts` past `max_attempts` or
//! both sign from a stale read.

use chrono::{Duration, Utc};
use firma_core::otp::{generate_code, hash_code, verify_code};
use firma_core::status::{OTP_MAX_ATTEMPTS, OTP_TTL_MINUTES};
use firma_core::AuditAction;
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::auth::ClientMeta;
use crate::delivery::{OtpContext, SignedNotification};
use crate::error::ApiError;
use crate::models::{DbSignatureOtp, DbSignatureRequest, SendOtpResponse, VerifyOtpResponse};
use crate::requests;
use crate::stamper;
use crate::state::AppState;

const OTP_COLUMNS: &str = "id, request_id, otp_hash, channel, sent_to, expires_at, is_used, \
     attempts, max_attempts, created_at";

/// Generate, store and deliver a fresh OTP for an open request.
///
/// Prior rows are left untouched; a failed delivery surfaces as
/// `DeliveryFailure` without rolling back the row, so a retry simply
/// sends a fresh code.
pub async fn send_otp(
    state: &AppState,
    request_id: &str,
    meta: &ClientMeta,
) -> Result<SendOtpResponse, ApiError> {
    let key = format!("{}:send", meta.ip_or_unknown());
    if !state
        .send_limiter
        .lock()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("limiter poisoned")))?
        .check(&key)
        .is_allowed()
    {
        return Err(ApiError::RateLimited);
    }

    let request = requests::load(state, request_id).await?;
    if request.status.is_terminal() {
        return Err(ApiError::RequestTerminal);
    }
    if requests::expire_if_due(state, &request, meta).await? {
        return Err(ApiError::OtpExpired);
    }

    let code = generate_code();
    let otp_hash =
        hash_code(&code).map_err(|e| ApiError::Internal(anyhow::anyhow!("otp hash: {e}")))?;

    let otp_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query(
        r#"
        INSERT INTO signature_otps
            (id, request_id, otp_hash, channel, sent_to, expires_at, is_used, attempts, max_attempts, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(&otp_id)
    .bind(request_id)
    .bind(&otp_hash)
    .bind(state.channel.name())
    .bind(&request.signer_email)
    .bind(expires_at.to_rfc3339())
    .bind(OTP_MAX_ATTEMPTS)
    .bind(now.to_rfc3339())
    .execute(&state.db)
    .await?;

    let affected = sqlx::query(
        "UPDATE signature_requests SET status = 'otp_sent'
         WHERE id = ? AND status IN ('pending', 'otp_sent')",
    )
    .bind(request_id)
    .execute(&state.db)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(ApiError::RequestTerminal);
    }

    let context = OtpContext {
        document_title: request.document_title.clone(),
        signer_name: request.signer_name.clone(),
        ttl_minutes: OTP_TTL_MINUTES,
    };
    if let Err(e) = state
        .channel
        .send(&request.signer_email, &code, &context)
        .await
    {
        tracing::warn!("OTP delivery failed for request {}: {}", request_id, e);
        return Err(ApiError::DeliveryFailure);
    }

    audit::append(
        &state.db,
        request_id,
        AuditAction::OtpSent,
        meta.ip.as_deref(),
        meta.user_agent.as_deref(),
        Some(json!({ "channel": state.channel.name(), "otpId": otp_id })),
    )
    .await?;

    Ok(SendOtpResponse {
        success: true,
        sent_to: request.signer_email,
        expires_at,
    })
}

/// Latest unused, unexpired OTP row for a request, if any.
async fn active_otp(
    state: &AppState,
    request_id: &str,
) -> Result<Option<DbSignatureOtp>, ApiError> {
    let sql = format!(
        "SELECT {OTP_COLUMNS} FROM signature_otps
         WHERE request_id = ? AND is_used = 0 AND expires_at > ?
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    );
    let otp = sqlx::query_as(&sql)
        .bind(request_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&state.db)
        .await?;
    Ok(otp)
}

/// Verify a submitted code against the active OTP.
///
/// The attempt accounting is a single conditional UPDATE: increment only
/// while `attempts < max_attempts` on an unused row, with RETURNING as
/// the readback. Zero rows affected means the cap was already reached,
/// here or by a concurrent call.
pub async fn verify_otp(
    state: &AppState,
    request: &DbSignatureRequest,
    code: &str,
    meta: &ClientMeta,
) -> Result<VerifyOtpResponse, ApiError> {
    // 1. Per-IP guard; a refused call consumes no OTP attempt.
    let key = format!("{}:verify", meta.ip_or_unknown());
    if !state
        .verify_limiter
        .lock()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("limiter poisoned")))?
        .check(&key)
        .is_allowed()
    {
        return Err(ApiError::RateLimited);
    }

    // 2. Closed requests refuse outright.
    if request.status.is_terminal() {
        return Err(ApiError::RequestTerminal);
    }

    // 3. Lazy expiry; no attempt counted.
    if requests::expire_if_due(state, request, meta).await? {
        return Err(ApiError::OtpExpired);
    }

    // 4. Derived active row.
    let otp = active_otp(state, &request.id).await?.ok_or(ApiError::NoValidOtp)?;

    // 5. Atomic compare-and-increment.
    let attempts: Option<i64> = sqlx::query_scalar(
        "UPDATE signature_otps SET attempts = attempts + 1
         WHERE id = ? AND attempts < max_attempts AND is_used = 0
         RETURNING attempts",
    )
    .bind(&otp.id)
    .fetch_optional(&state.db)
    .await?;

    let Some(attempts) = attempts else {
        // Cap already reached by a prior or concurrent call.
        mark_used(state, &otp.id).await?;
        return Err(ApiError::OtpExhausted);
    };

    // 6. Constant-time comparison against the stored hash.
    if !verify_code(code, &otp.otp_hash) {
        let remaining = (otp.max_attempts - attempts).max(0);
        let exhausted = remaining == 0;

        if exhausted {
            mark_used(state, &otp.id).await?;
        }

        audit::append(
            &state.db,
            &request.id,
            AuditAction::OtpFailed,
            meta.ip.as_deref(),
            meta.user_agent.as_deref(),
            Some(json!({ "remainingAttempts": remaining, "exhausted": exhausted })),
        )
        .await?;

        return Err(if exhausted {
            ApiError::OtpExhausted
        } else {
            ApiError::OtpMismatch {
                remaining_attempts: remaining,
            }
        });
    }

    // 7. Match: consume the OTP, stamp best-effort, transition to signed.
    if mark_used(state, &otp.id).await? == 0 {
        // A concurrent verify already consumed this row.
        return Err(ApiError::NoValidOtp);
    }

    let signed_at = Utc::now();
    let ip = meta.ip_or_unknown();
    let stamped_url = stamper::produce_signed_pdf(state, request, signed_at, &ip).await;
    let signed_pdf_url = stamped_url.unwrap_or_else(|| request.document_url.clone());

    let affected = sqlx::query(
        "UPDATE signature_requests
         SET status = 'signed', signed_at = ?, signed_pdf_url = ?
         WHERE id = ? AND status IN ('pending', 'otp_sent')",
    )
    .bind(signed_at.to_rfc3339())
    .bind(&signed_pdf_url)
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
        AuditAction::Signed,
        meta.ip.as_deref(),
        meta.user_agent.as_deref(),
        Some(json!({ "signedPdfUrl": signed_pdf_url })),
    )
    .await?;

    // Fire-and-forget notification; its outcome never reaches the signer.
    let notifier = state.notifier.clone();
    let payload = SignedNotification {
        request_id: request.id.clone(),
        requester_id: request.requester_id.clone(),
        document_title: request.document_title.clone(),
        signer_name: request.signer_name.clone(),
        signed_at: signed_at.to_rfc3339(),
        signed_pdf_url: signed_pdf_url.clone(),
    };
    tokio::spawn(async move {
        notifier.notify_signed(payload).await;
    });

    tracing::info!("request {} signed by {}", request.id, request.signer_email);

    Ok(VerifyOtpResponse {
        success: true,
        signed_at,
        signed_pdf_url,
    })
}

/// Consume an OTP row; returns how many rows flipped (0 or 1).
async fn mark_used(state: &AppState, otp_id: &str) -> Result<u64, ApiError> {
    let affected = sqlx::query("UPDATE signature_otps SET is_used = 1 WHERE id = ? AND is_used = 0")
        .bind(otp_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    Ok(affected)
}
