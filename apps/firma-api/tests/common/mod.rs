//! Shared test harness: temp-file database, recording collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use firma_api::auth::ClientMeta;
use firma_api::config::AppConfig;
use firma_api::delivery::{
    CompletionNotifier, DeliveryError, OtpChannel, OtpContext, SignedNotification,
};
use firma_api::models::CreateSignatureRequest;
use firma_api::state::AppState;
use firma_core::DocumentType;

/// Channel that records every send instead of delivering anything.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl OtpChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, to: &str, code: &str, _context: &OtpContext) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}

/// Channel that always refuses, for delivery-failure paths.
pub struct FailingChannel;

#[async_trait]
impl OtpChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(
        &self,
        _to: &str,
        _code: &str,
        _context: &OtpContext,
    ) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed("smtp unreachable".into()))
    }
}

/// Notifier that only counts invocations.
#[derive(Default)]
pub struct CountingNotifier {
    pub notified: Mutex<Vec<SignedNotification>>,
}

#[async_trait]
impl CompletionNotifier for CountingNotifier {
    async fn notify_signed(&self, payload: SignedNotification) {
        self.notified.lock().unwrap().push(payload);
    }
}

pub struct TestEnv {
    pub state: Arc<AppState>,
    pub channel: Arc<RecordingChannel>,
    pub notifier: Arc<CountingNotifier>,
    pub data_dir: PathBuf,
    _dir: tempfile::TempDir,
}

pub async fn test_env() -> TestEnv {
    let channel = Arc::new(RecordingChannel::default());
    build_env(channel.clone(), channel).await
}

/// Environment whose channel always refuses delivery.
pub async fn failing_env() -> TestEnv {
    // The recording channel stays around so assertions still compile; it
    // never receives anything.
    build_env(Arc::new(FailingChannel), Arc::new(RecordingChannel::default())).await
}

async fn build_env(channel: Arc<dyn OtpChannel>, recorder: Arc<RecordingChannel>) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let db_path = dir.path().join("firma-test.db");

    let config = AppConfig {
        database_url: format!("sqlite:{}?mode=rwc", db_path.display()),
        port: 0,
        base_url: "http://localhost:3002".to_string(),
        token_secret: "test-token-secret-32-bytes-long!!".to_string(),
        auth_secret: "test-auth-secret-32-bytes-long!!!".to_string(),
        data_dir: data_dir.clone(),
        resend_api_key: None,
        email_from: "firma@test.local".to_string(),
        notify_webhook_url: None,
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .unwrap();

    let notifier = Arc::new(CountingNotifier::default());
    let state = AppState::with_collaborators(pool, config, channel, notifier.clone())
        .await
        .unwrap();

    TestEnv {
        state: Arc::new(state),
        channel: recorder,
        notifier,
        data_dir,
        _dir: dir,
    }
}

pub fn meta() -> ClientMeta {
    ClientMeta {
        ip: Some("203.0.113.7".to_string()),
        user_agent: Some("firma-tests/1.0".to_string()),
    }
}

pub fn create_params() -> CreateSignatureRequest {
    CreateSignatureRequest {
        document_type: DocumentType::Quote,
        document_title: "Preventivo #123".to_string(),
        document_url: "http://127.0.0.1:1/unreachable.pdf".to_string(),
        signer_name: "Anna Bianchi".to_string(),
        signer_email: "a@b.it".to_string(),
        signer_phone: None,
        signer_client_id: None,
        message: Some("Please review and sign".to_string()),
        expires_in_days: 7,
    }
}

/// Requester access token for the internal endpoints.
pub fn requester_token(env: &TestEnv, user_id: &str) -> String {
    env.state
        .auth_tokens
        .issue(user_id, chrono::Utc::now() + chrono::Duration::hours(1))
        .unwrap()
}
