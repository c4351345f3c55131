//! Best-effort stamped-PDF pipeline
//!
//! Fetch the source document, overlay the attestation, persist the
//! result. The signature's validity is the OTP verification outcome, not
//! the stamping outcome: every failure here is logged and the caller
//! falls back to the original document URL.

use chrono::{DateTime, Utc};
use firma_pdf::{stamp_attestation, Attestation};

use crate::models::DbSignatureRequest;
use crate::state::AppState;

/// Fetch, stamp and persist. Returns the public URL of the stamped PDF,
/// or `None` after logging why the fallback applies.
pub async fn produce_signed_pdf(
    state: &AppState,
    request: &DbSignatureRequest,
    signed_at: DateTime<Utc>,
    ip: &str,
) -> Option<String> {
    match try_produce(state, request, signed_at, ip).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(
                "stamping failed for request {}, falling back to original document: {}",
                request.id,
                e
            );
            None
        }
    }
}

async fn try_produce(
    state: &AppState,
    request: &DbSignatureRequest,
    signed_at: DateTime<Utc>,
    ip: &str,
) -> anyhow::Result<String> {
    let response = state
        .http
        .get(&request.document_url)
        .send()
        .await?
        .error_for_status()?;
    let original = response.bytes().await?;

    let attestation = Attestation {
        signer_name: &request.signer_name,
        signed_at,
        ip_address: ip,
    };
    let stamped = stamp_attestation(&original, &attestation)?;

    let key = format!("{}.pdf", request.id);
    let url = state.blobs.put(&key, &stamped).await?;

    tracing::info!("stamped PDF for request {} stored at {}", request.id, url);
    Ok(url)
}
