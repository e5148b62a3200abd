//! One-time builder token exchange.
//!
//! State machine over a `BuilderSession`:
//!
//! ```text
//! Minted ──initial token──► Activated ──session token──► Active (repeatable)
//!    │                          │                           │
//!    └──────────────────── wall clock ──────────────────────┘
//!                               ▼
//!                            Expired (terminal)
//! ```
//!
//! The initial token is embedded in a generated URL and is not safe to
//! reuse if leaked via logs or referrers; consuming it immediately and
//! minting a fresh, shorter-lived session token limits the blast radius of
//! a leaked URL to a single activation.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domains::builder::jwt::{BuilderTokenService, TokenError, TokenKind};
use crate::kernel::BaseSessionStore;

/// Terminal failures of a single exchange request. Each maps to a distinct
/// user-facing message and HTTP status; none are retried internally.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Missing or invalid token signature")]
    InvalidSignature,

    #[error("Invalid token: missing session reference")]
    MissingSessionReference,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Initial token already used. URL can only be used once.")]
    InitialTokenAlreadyUsed,

    #[error("Invalid session token")]
    InvalidSessionToken,

    #[error("Invalid token type")]
    InvalidTokenType,

    #[error("Session store error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ExchangeError {
    /// Stable machine-readable code for the HTTP error body
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidSignature => "invalid_signature",
            ExchangeError::MissingSessionReference => "missing_session_reference",
            ExchangeError::SessionNotFound => "session_not_found",
            ExchangeError::SessionExpired => "session_expired",
            ExchangeError::InitialTokenAlreadyUsed => "initial_token_already_used",
            ExchangeError::InvalidSessionToken => "invalid_session_token",
            ExchangeError::InvalidTokenType => "invalid_token_type",
            ExchangeError::Internal(_) => "internal_error",
        }
    }
}

/// A successful exchange: the verified identity, plus a fresh session token
/// when an initial token was redeemed
#[derive(Debug, Serialize)]
pub struct ExchangeGrant {
    pub brand_id: Uuid,
    pub user_id: Option<String>,
    pub session_id: Uuid,
    pub session_token: Option<String>,
}

/// Exchange a bearer token against its session record.
///
/// Initial tokens are consumed exactly once: the flip of
/// `initial_token_used` happens through the store's conditional update, so
/// a concurrent redemption of the same token loses the race and fails with
/// `InitialTokenAlreadyUsed` rather than silently succeeding twice.
pub async fn exchange_token(
    signer: &BuilderTokenService,
    sessions: &dyn BaseSessionStore,
    token: &str,
) -> Result<ExchangeGrant, ExchangeError> {
    let claims = signer.verify_token(token).map_err(|e| match e {
        TokenError::Expired => ExchangeError::SessionExpired,
        TokenError::Invalid(_) => ExchangeError::InvalidSignature,
    })?;

    let session_id = claims.session_id.ok_or(ExchangeError::MissingSessionReference)?;

    let session = sessions
        .get(session_id)
        .await?
        .ok_or(ExchangeError::SessionNotFound)?;

    if session.is_expired(Utc::now()) {
        return Err(ExchangeError::SessionExpired);
    }

    let user_id = claims
        .sub
        .clone()
        .or_else(|| claims.user_id.map(|id| id.to_string()));

    match claims.kind() {
        Some(TokenKind::Initial) => {
            if session.initial_token_used {
                return Err(ExchangeError::InitialTokenAlreadyUsed);
            }

            let session_secret = Uuid::new_v4().to_string();
            let session_jwt = signer.issue_session_token(&claims, &session_secret)?;

            let activated = sessions.conditional_activate(session_id, &session_secret).await?;
            if !activated {
                // Lost the race against a concurrent redemption
                return Err(ExchangeError::InitialTokenAlreadyUsed);
            }

            tracing::info!("Builder session {} activated", session_id);

            Ok(ExchangeGrant {
                brand_id: claims.brand_id,
                user_id,
                session_id,
                session_token: Some(session_jwt),
            })
        }
        Some(TokenKind::Session) => {
            let presented = claims
                .session_token
                .as_deref()
                .ok_or(ExchangeError::InvalidSessionToken)?;

            if session.session_token.as_deref() != Some(presented) {
                return Err(ExchangeError::InvalidSessionToken);
            }

            sessions.touch(session_id).await?;

            Ok(ExchangeGrant {
                brand_id: claims.brand_id,
                user_id,
                session_id,
                session_token: None,
            })
        }
        None => Err(ExchangeError::InvalidTokenType),
    }
}
