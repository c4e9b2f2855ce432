//! Shared-secret authentication for the internal API.
//!
//! The chat front end sends `Authorization: Bearer <token>` on every call.
//! Comparison is constant-time. When no token is configured the check is
//! disabled (configuration validation forbids that in production).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

use crate::adapters::http::internal::dto::ErrorResponse;
use crate::config::ServerConfig;

/// Expected bearer token, if any.
#[derive(Clone, Default)]
pub struct InternalToken(Option<Arc<Secret<String>>>);

impl InternalToken {
    pub fn new(token: Option<&str>) -> Self {
        Self(
            token
                .filter(|t| !t.trim().is_empty())
                .map(|t| Arc::new(Secret::new(t.to_string()))),
        )
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.internal_token())
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => bool::from(
                expected
                    .expose_secret()
                    .as_bytes()
                    .ct_eq(presented.as_bytes()),
            ),
            (Some(_), None) => false,
        }
    }
}

/// Rejects requests without the configured bearer token.
pub async fn internal_auth_middleware(
    State(token): State<InternalToken>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if token.accepts(presented) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected internal API call");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "UNAUTHORIZED",
            "Missing or invalid internal token",
        )),
    )
        .into_response()
}
