//! Application state for the Firma API

use anyhow::Result;
use firma_core::{RateLimitConfig, RateLimiter, TokenService};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::AppConfig;
use crate::delivery::{CompletionNotifier, LoggingChannel, OtpChannel, ResendChannel, WebhookNotifier};
use crate::storage::FsBlobStore;

pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    /// Capability tokens embedded in sign links
    pub sign_tokens: TokenService,
    /// Requester access tokens on the internal endpoints
    pub auth_tokens: TokenService,
    /// Per-IP guard on the public verify path
    pub verify_limiter: Mutex<RateLimiter>,
    /// Per-IP guard on OTP sending
    pub send_limiter: Mutex<RateLimiter>,
    pub channel: Arc<dyn OtpChannel>,
    pub notifier: Arc<dyn CompletionNotifier>,
    pub blobs: FsBlobStore,
    /// Client for fetching source documents; short timeout, stamping is
    /// best-effort.
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        let channel: Arc<dyn OtpChannel> = match &config.resend_api_key {
            Some(key) => Arc::new(ResendChannel::new(key.clone(), config.email_from.clone())),
            None => {
                tracing::warn!("RESEND_API_KEY not set; OTP delivery will only be logged");
                Arc::new(LoggingChannel)
            }
        };
        let notifier: Arc<dyn CompletionNotifier> =
            Arc::new(WebhookNotifier::new(config.notify_webhook_url.clone()));

        Self::with_collaborators(pool, config, channel, notifier).await
    }

    /// Wire up state around explicit collaborators. Tests use this with a
    /// recording channel.
    pub async fn with_collaborators(
        pool: SqlitePool,
        config: AppConfig,
        channel: Arc<dyn OtpChannel>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Result<Self> {
        run_migrations(&pool).await?;

        let blobs = FsBlobStore::new(
            config.data_dir.join("signed"),
            format!("{}/files", config.base_url.trim_end_matches('/')),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            db: pool,
            sign_tokens: TokenService::new(&config.token_secret),
            auth_tokens: TokenService::new(&config.auth_secret),
            verify_limiter: Mutex::new(RateLimiter::new(RateLimitConfig::otp_verify())),
            send_limiter: Mutex::new(RateLimiter::new(RateLimitConfig::otp_send())),
            channel,
            notifier,
            blobs,
            http,
            config,
        })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signature_requests (
            id TEXT PRIMARY KEY,
            document_type TEXT NOT NULL,
            document_title TEXT NOT NULL,
            document_url TEXT NOT NULL,
            signed_pdf_url TEXT,
            signer_name TEXT NOT NULL,
            signer_email TEXT NOT NULL,
            signer_phone TEXT,
            signer_client_id TEXT,
            message TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            expires_at TEXT NOT NULL,
            signed_at TEXT,
            decline_reason TEXT,
            requester_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signature_otps (
            id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES signature_requests(id),
            otp_hash TEXT NOT NULL,
            channel TEXT NOT NULL,
            sent_to TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signature_audit (
            id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES signature_requests(id),
            action TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lookup indexes for the derived active-OTP query and the timeline
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_otps_request_created
         ON signature_otps(request_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_request_created
         ON signature_audit(request_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_requests_requester
         ON signature_requests(requester_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Migrations complete");
    Ok(())
}
