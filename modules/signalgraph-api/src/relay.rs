//! Inference relay: authenticate, validate, forward to the downstream responder.
//!
//! Downstream answers are passed through untouched (status, body, content type), failures
//! included. The body is streamed as it arrives so incremental replies reach the caller
//! before the downstream finishes. Only errors raised here are translated into status codes.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::AppState;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] jsonwebtoken::errors::Error),

    #[error("Request body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Relay upstream is not configured")]
    UpstreamUnconfigured,

    #[error("Relay upstream unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingCredential | RelayError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            RelayError::MalformedBody(_) | RelayError::MissingField(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Bearer token claims. Only the subject is used; `exp` is enforced by validation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ForwardedChat<'a> {
    message: &'a str,
    conversation_id: &'a str,
    user_id: &'a str,
}

pub struct Relay {
    decoding_key: DecodingKey,
    validation: Validation,
    upstream: Option<String>,
    http: reqwest::Client,
}

impl Relay {
    pub fn new(secret: &str, upstream: Option<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            upstream,
            http: reqwest::Client::new(),
        }
    }

    /// Verify the `Authorization: Bearer` credential and return the caller's user id.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<String, RelayError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RelayError::MissingCredential)?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        Ok(claims.sub)
    }

    /// Forward the request and hand back the downstream response as-is.
    pub async fn forward(
        &self,
        user_id: &str,
        message: &str,
        conversation_id: &str,
    ) -> Result<Response, RelayError> {
        let upstream = self.upstream.as_deref().ok_or(RelayError::UpstreamUnconfigured)?;

        let downstream = self
            .http
            .post(upstream)
            .json(&ForwardedChat {
                message,
                conversation_id,
                user_id,
            })
            .send()
            .await?;

        let status = StatusCode::from_u16(downstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = downstream
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok());

        if !status.is_success() {
            warn!(%status, user_id, "Relay downstream answered with failure, passing through");
        }

        let body = Body::from_stream(downstream.bytes_stream());
        let mut response = (status, body).into_response();
        response.headers_mut().remove(header::CONTENT_TYPE);
        if let Some(content_type) = content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        Ok(response)
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, RelayError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(RelayError::MissingField(field))
}

pub async fn api_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let user_id = state.relay.authenticate(&headers).inspect_err(|e| {
        warn!(error = %e, "Relay request rejected");
    })?;

    let request: ChatRequest = if body.is_empty() {
        ChatRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let message = required(&request.message, "message")?;
    let conversation_id = required(&request.conversation_id, "conversation_id")?;

    info!(user_id = %user_id, conversation_id, "Relaying chat message");
    state.relay.forward(&user_id, message, conversation_id).await
}
