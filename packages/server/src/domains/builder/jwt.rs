use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validity of a session-kind token, fixed from the moment of issuance and
/// independent of the initial token's expiry
pub const SESSION_TOKEN_TTL_HOURS: i64 = 2;

/// The two kinds of builder credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Delivered once inside a generated URL; valid for exactly one
    /// redemption
    Initial,
    /// Issued on redemption, tied to the stored session secret
    Session,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Initial => "initial",
            TokenKind::Session => "session",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(TokenKind::Initial),
            "session" => Some(TokenKind::Session),
            _ => None,
        }
    }
}

/// Builder JWT claims
///
/// `token_type` stays a plain string in the payload so an unrecognized kind
/// surfaces as a distinct error after signature verification instead of a
/// decode failure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BuilderClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // Subject (user id as string)
    pub brand_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>, // Session secret (kind `session` only)
    pub exp: i64, // Expiration timestamp
    pub iat: i64, // Issued at timestamp
    pub iss: String, // Issuer
}

impl BuilderClaims {
    /// Parsed token kind, or None for an unknown/missing kind
    pub fn kind(&self) -> Option<TokenKind> {
        self.token_type.as_deref().and_then(TokenKind::parse)
    }
}

/// Why a token failed verification. Expiry gets its own variant because the
/// exchange endpoint reports it differently from a bad signature.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Token verification failed: {0}")]
    Invalid(String),
}

/// Builder Token Service - creates and verifies signed builder tokens
#[derive(Clone)]
pub struct BuilderTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl BuilderTokenService {
    /// Create new token service with secret and issuer
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Sign an initial token for a freshly minted session
    pub fn issue_initial_token(
        &self,
        brand_id: Uuid,
        user_id: Option<Uuid>,
        session_id: Uuid,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();

        let claims = BuilderClaims {
            sub: user_id.map(|id| id.to_string()),
            brand_id,
            user_id,
            session_id: Some(session_id),
            token_type: Some(TokenKind::Initial.as_str().to_string()),
            session_token: None,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Sign a session token carrying the given session secret.
    ///
    /// Identity claims carry over from the redeemed initial token; the
    /// validity window restarts at 2 hours regardless of what remained on
    /// the original.
    pub fn issue_session_token(
        &self,
        claims: &BuilderClaims,
        session_secret: &str,
    ) -> Result<String> {
        let now = Utc::now();

        let session_claims = BuilderClaims {
            token_type: Some(TokenKind::Session.as_str().to_string()),
            session_token: Some(session_secret.to_string()),
            exp: (now + Duration::hours(SESSION_TOKEN_TTL_HOURS)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            ..claims.clone()
        };

        encode(&Header::default(), &session_claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a builder token
    pub fn verify_token(&self, token: &str) -> Result<BuilderClaims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<BuilderClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
