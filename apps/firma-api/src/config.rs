//! Environment-backed configuration

use std::path::PathBuf;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sqlx connection string, e.g. `sqlite:firma.db?mode=rwc`
    pub database_url: String,
    /// Bind port for the HTTP server
    pub port: u16,
    /// Public base URL used to build sign links and file URLs
    pub base_url: String,
    /// Secret protecting signer capability tokens
    pub token_secret: String,
    /// Secret protecting requester access tokens
    pub auth_secret: String,
    /// Root directory for stamped PDFs
    pub data_dir: PathBuf,
    /// Resend API key; OTP emails are logged instead of sent when absent
    pub resend_api_key: Option<String>,
    /// From address for OTP emails
    pub email_from: String,
    /// Webhook receiving completion notifications, if configured
    pub notify_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:firma.db?mode=rwc".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3002),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            token_secret: std::env::var("TOKEN_SECRET")
                .unwrap_or_else(|_| "dev-token-secret-change-in-production".to_string()),
            auth_secret: std::env::var("AUTH_SECRET")
                .unwrap_or_else(|_| "dev-auth-secret-change-in-production".to_string()),
            data_dir,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "firma@example.com".to_string()),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
        }
    }
}
