//! Append-only audit trail
//!
//! Every security-relevant action on a signature request lands here as a
//! single insert. No update or delete path exists; the compliance
//! timeline reads the rows back oldest first.

use chrono::Utc;
use firma_core::AuditAction;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::DbAuditEntry;

pub async fn append(
    pool: &SqlitePool,
    request_id: &str,
    action: AuditAction,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    metadata: Option<serde_json::Value>,
) -> Result<(), ApiError> {
    let metadata = metadata.map(|m| m.to_string());

    sqlx::query(
        r#"
        INSERT INTO signature_audit (id, request_id, action, ip_address, user_agent, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(request_id)
    .bind(action)
    .bind(ip_address)
    .bind(user_agent)
    .bind(metadata)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    tracing::info!("audit: {} on request {}", action, request_id);
    Ok(())
}

/// Full trail for one request, chronological.
pub async fn list(pool: &SqlitePool, request_id: &str) -> Result<Vec<DbAuditEntry>, ApiError> {
    let entries = sqlx::query_as(
        r#"
        SELECT id, request_id, action, ip_address, user_agent, metadata, created_at
        FROM signature_audit
        WHERE request_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}
