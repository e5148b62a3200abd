use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Last inbound interaction per (trip, recipient) pair.
///
/// Written by the inbound-webhook subsystem; the dispatcher only reads it to
/// decide whether the 24-hour freeform window is open.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InteractionRecord {
    pub trip_id: Uuid,
    pub phone_number: String,
    pub last_inbound_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Most recent inbound timestamp for a (trip, recipient) pair
    pub async fn last_inbound(
        trip_id: Uuid,
        phone_number: &str,
        pool: &PgPool,
    ) -> Result<Option<DateTime<Utc>>> {
        let last = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT last_inbound_at FROM whatsapp_interactions
             WHERE trip_id = $1 AND phone_number = $2",
        )
        .bind(trip_id)
        .bind(phone_number)
        .fetch_optional(pool)
        .await?;

        Ok(last)
    }
}
