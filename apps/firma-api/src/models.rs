//! Data models for the Firma API

use chrono::{DateTime, Utc};
use firma_core::{AuditAction, DocumentType, RequestStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Signature request stored in the database
#[derive(Debug, Clone, FromRow)]
pub struct DbSignatureRequest {
    pub id: String,
    pub document_type: DocumentType,
    pub document_title: String,
    pub document_url: String,
    pub signed_pdf_url: Option<String>,
    pub signer_name: String,
    pub signer_email: String,
    pub signer_phone: Option<String>,
    pub signer_client_id: Option<String>,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
}

/// One OTP send, retained forever; superseded rows stay in place and
/// "active" is a query, not a column.
#[derive(Debug, Clone, FromRow)]
pub struct DbSignatureOtp {
    pub id: String,
    pub request_id: String,
    pub otp_hash: String,
    pub channel: String,
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub attempts: i64,
    pub max_attempts: i64,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit entry
#[derive(Debug, Clone, FromRow)]
pub struct DbAuditEntry {
    pub id: String,
    pub request_id: String,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ------------------------------------------------------------------
// Wire types (camelCase JSON)
// ------------------------------------------------------------------

/// Request to create a signature request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignatureRequest {
    pub document_type: DocumentType,
    pub document_title: String,
    pub document_url: String,
    pub signer_name: String,
    pub signer_email: String,
    #[serde(default)]
    pub signer_phone: Option<String>,
    #[serde(default)]
    pub signer_client_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub expires_in_days: i64,
}

/// Public projection of a signature request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequestView {
    pub id: String,
    pub document_type: DocumentType,
    pub document_title: String,
    pub document_url: String,
    pub signed_pdf_url: Option<String>,
    pub signer_name: String,
    pub signer_email: String,
    pub signer_phone: Option<String>,
    pub signer_client_id: Option<String>,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbSignatureRequest> for SignatureRequestView {
    fn from(r: DbSignatureRequest) -> Self {
        Self {
            id: r.id,
            document_type: r.document_type,
            document_title: r.document_title,
            document_url: r.document_url,
            signed_pdf_url: r.signed_pdf_url,
            signer_name: r.signer_name,
            signer_email: r.signer_email,
            signer_phone: r.signer_phone,
            signer_client_id: r.signer_client_id,
            message: r.message,
            status: r.status,
            expires_at: r.expires_at,
            signed_at: r.signed_at,
            decline_reason: r.decline_reason,
            requester_id: r.requester_id,
            created_at: r.created_at,
        }
    }
}

/// Response to a create call: the request plus the public sign link
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignatureResponse {
    pub request: SignatureRequestView,
    pub sign_link: String,
}

/// OTP history entry in the detail view; the hash never leaves storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpView {
    pub id: String,
    pub channel: String,
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub attempts: i64,
    pub max_attempts: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbSignatureOtp> for OtpView {
    fn from(o: DbSignatureOtp) -> Self {
        Self {
            id: o.id,
            channel: o.channel,
            sent_to: o.sent_to,
            expires_at: o.expires_at,
            is_used: o.is_used,
            attempts: o.attempts,
            max_attempts: o.max_attempts,
            created_at: o.created_at,
        }
    }
}

/// Audit entry in the timeline view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryView {
    pub id: String,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<DbAuditEntry> for AuditEntryView {
    fn from(a: DbAuditEntry) -> Self {
        let metadata = a
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok());
        Self {
            id: a.id,
            action: a.action,
            ip_address: a.ip_address,
            user_agent: a.user_agent,
            metadata,
            created_at: a.created_at,
        }
    }
}

/// Requester-facing detail: request plus OTP history and audit trail,
/// both ordered oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDetailResponse {
    pub request: SignatureRequestView,
    pub otps: Vec<OtpView>,
    pub audit: Vec<AuditEntryView>,
}

/// Signer-facing projection reached through the capability token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignViewResponse {
    pub document_type: DocumentType,
    pub document_title: String,
    pub document_url: String,
    pub signer_name: String,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
}

/// Body of the public verify call
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

/// Successful verification outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub signed_at: DateTime<Utc>,
    pub signed_pdf_url: String,
}

/// Body of the public decline call
#[derive(Debug, Clone, Deserialize)]
pub struct DeclineRequest {
    pub reason: String,
}

/// Response to a send-otp call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
}
