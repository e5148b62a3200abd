use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Server-side state behind a builder embed.
///
/// Minted out-of-band together with an initial URL token. The exchange
/// endpoint is the only writer here: it consumes the initial token once,
/// stores the session secret, and bumps activity on every session-token
/// exchange. Once `expires_at` passes the record is permanently invalid.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BuilderSession {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub user_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub initial_token_used: bool,
    pub session_token: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BuilderSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub async fn find(session_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let session = sqlx::query_as::<_, BuilderSession>(
            "SELECT * FROM builder_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Consume the initial token and store the session secret, but only if
    /// the token is still unconsumed.
    ///
    /// The `initial_token_used = false` guard is the enforcement point of
    /// the single-use invariant: concurrent redemptions of the same leaked
    /// URL race on this update and exactly one wins.
    pub async fn conditional_activate(
        session_id: Uuid,
        session_secret: &str,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE builder_sessions
             SET initial_token_used = true, session_token = $2, last_activity_at = NOW()
             WHERE id = $1 AND initial_token_used = false",
        )
        .bind(session_id)
        .bind(session_secret)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn touch(session_id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE builder_sessions SET last_activity_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Delete sessions that expired before `cutoff` (run periodically).
    /// Expiry itself is enforced at exchange time; this is hygiene.
    pub async fn sweep_expired(cutoff: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM builder_sessions WHERE expires_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
