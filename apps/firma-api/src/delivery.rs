//! External collaborators: OTP delivery and completion notification
//!
//! Both are trait objects so tests can substitute recording fakes. OTP
//! delivery failures are fatal to the send call that triggered them (the
//! OTP row stays, a retry sends a fresh code); notification failures are
//! only logged and never reach the signer.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Resend API endpoint
const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// HTTP timeout for outbound delivery calls
const DELIVERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Everything the channel needs to compose the message.
#[derive(Debug, Clone)]
pub struct OtpContext {
    pub document_title: String,
    pub signer_name: String,
    /// Minutes until the code stops working
    pub ttl_minutes: i64,
}

/// Delivery channel for one-time passcodes.
///
/// Email in production; the channel is interchangeable by design, so the
/// workflow never assumes more than `send`.
#[async_trait]
pub trait OtpChannel: Send + Sync {
    /// Stable name recorded on the OTP row (e.g. "email").
    fn name(&self) -> &'static str;

    async fn send(&self, to: &str, code: &str, context: &OtpContext) -> Result<(), DeliveryError>;
}

/// Fire-and-forget notification to the requester after a signature.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify_signed(&self, payload: SignedNotification);
}

/// Payload posted when a request reaches `signed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedNotification {
    pub request_id: String,
    pub requester_id: String,
    pub document_title: String,
    pub signer_name: String,
    pub signed_at: String,
    pub signed_pdf_url: String,
}

// ------------------------------------------------------------------
// Resend email channel
// ------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

pub struct ResendChannel {
    api_key: String,
    from_address: String,
    client: reqwest::Client,
}

impl ResendChannel {
    pub fn new(api_key: String, from_address: String) -> Self {
        Self {
            api_key,
            from_address,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl OtpChannel for ResendChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, to: &str, code: &str, context: &OtpContext) -> Result<(), DeliveryError> {
        let payload = ResendPayload {
            from: &self.from_address,
            to: [to],
            subject: format!("Your signature code for \"{}\"", context.document_title),
            html: format!(
                "<p>Hello {},</p>\
                 <p>Your one-time code to sign \"{}\" is:</p>\
                 <p style=\"font-size:24px;letter-spacing:4px\"><strong>{}</strong></p>\
                 <p>It expires in {} minutes. If you did not request this, ignore this email.</p>",
                context.signer_name, context.document_title, code, context.ttl_minutes
            ),
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Resend refused OTP email ({}): {}", status, body);
            return Err(DeliveryError::Failed(format!("resend returned {}", status)));
        }

        tracing::info!("OTP email accepted by Resend for {}", to);
        Ok(())
    }
}

// ------------------------------------------------------------------
// Logging channel (local development without an API key)
// ------------------------------------------------------------------

pub struct LoggingChannel;

#[async_trait]
impl OtpChannel for LoggingChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, to: &str, code: &str, _context: &OtpContext) -> Result<(), DeliveryError> {
        tracing::info!("(dev) OTP for {}: {}", to, code);
        Ok(())
    }
}

// ------------------------------------------------------------------
// Webhook completion notifier
// ------------------------------------------------------------------

pub struct WebhookNotifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify_signed(&self, payload: SignedNotification) {
        let Some(url) = &self.url else {
            tracing::debug!(
                "No NOTIFY_WEBHOOK_URL configured; skipping notification for {}",
                payload.request_id
            );
            return;
        };

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Completion notification delivered for {}", payload.request_id);
            }
            Ok(response) => {
                tracing::warn!(
                    "Completion notification for {} rejected with {}",
                    payload.request_id,
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Completion notification for {} failed: {}",
                    payload.request_id,
                    e
                );
            }
        }
    }
}
