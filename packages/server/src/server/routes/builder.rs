use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::domains::builder::{exchange_token, ExchangeError};
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct ExchangeResponse {
    pub success: bool,
    pub brand_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ExchangeErrorResponse {
    pub error: String,
    pub code: String,
}

/// Builder token exchange endpoint
///
/// Redeems the bearer token from the Authorization header: an initial token
/// is consumed and answered with a fresh session token; a session token is
/// validated and refreshes the session's activity.
pub async fn exchange_token_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<ExchangeResponse>, (StatusCode, Json<ExchangeErrorResponse>)> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(error_response(ExchangeError::InvalidSignature));
    };

    let grant = exchange_token(
        &state.deps.token_service,
        state.deps.sessions.as_ref(),
        token,
    )
    .await
    .map_err(error_response)?;

    let message = if grant.session_token.is_some() {
        "Initial token consumed. Use session_token for subsequent requests."
    } else {
        "Session token validated."
    };

    Ok(Json(ExchangeResponse {
        success: true,
        brand_id: grant.brand_id,
        user_id: grant.user_id,
        session_id: grant.session_id,
        session_token: grant.session_token,
        message: message.to_string(),
    }))
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers.get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    auth_str.strip_prefix("Bearer ")
}

fn error_response(error: ExchangeError) -> (StatusCode, Json<ExchangeErrorResponse>) {
    tracing::warn!("Token exchange failed: {}", error);

    (
        status_for(&error),
        Json(ExchangeErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
}

/// Distinct status per failure kind so the embedding page can tell "this
/// link was already used" from "this session expired" and "not found"
fn status_for(error: &ExchangeError) -> StatusCode {
    match error {
        ExchangeError::InitialTokenAlreadyUsed => StatusCode::FORBIDDEN,
        ExchangeError::SessionExpired | ExchangeError::InvalidSessionToken => {
            StatusCode::UNAUTHORIZED
        }
        ExchangeError::SessionNotFound => StatusCode::NOT_FOUND,
        ExchangeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ExchangeError::InvalidSignature
        | ExchangeError::MissingSessionReference
        | ExchangeError::InvalidTokenType => StatusCode::BAD_REQUEST,
    }
}
