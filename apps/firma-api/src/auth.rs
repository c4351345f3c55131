//! Request extractors: requester identity and client metadata

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use firma_core::TokenError;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract Bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    auth_header
        .filter(|h| h.starts_with("Bearer "))
        .map(|h| &h[7..])
}

/// Authenticated requester on the internal endpoints.
///
/// The access token is an HMAC capability token whose subject is the
/// requester's user id; the wider suite issues it at login.
#[derive(Debug, Clone)]
pub struct RequesterId(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequesterId {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = extract_bearer_token(header).ok_or(ApiError::TokenInvalid)?;

        match state.auth_tokens.verify(token) {
            Ok(subject) => Ok(RequesterId(subject)),
            Err(TokenError::Expired) => Err(ApiError::TokenExpired),
            Err(TokenError::Invalid) => Err(ApiError::TokenInvalid),
        }
    }
}

/// Client IP and user agent, recorded on every audit entry.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn ip_or_unknown(&self) -> String {
        self.ip.clone().unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Trust the proxy header first, fall back to the socket peer.
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(ClientMeta { ip, user_agent })
    }
}
