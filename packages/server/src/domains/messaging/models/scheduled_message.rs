use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A WhatsApp message scheduled by the trip-planning UI.
///
/// Eligible for dispatch only while `is_sent = false` and the scheduled
/// instant has passed. The dispatcher flips `is_sent` exactly once; rows are
/// never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub trip_id: Uuid,
    pub recipient_phone: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub template_name: Option<String>,
    pub template_variables: Option<serde_json::Value>,
    pub message_content: String,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A due message joined with the phone number of its trip, used as the
/// recipient fallback when the message has no explicit one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueMessage {
    #[sqlx(flatten)]
    pub message: ScheduledMessage,
    pub trip_phone: Option<String>,
}

impl ScheduledMessage {
    /// The exact instant this message becomes due. Scheduled date and time
    /// are stored as wall-clock values interpreted as UTC.
    pub fn due_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.scheduled_date.and_time(self.scheduled_time), Utc)
    }

    /// Unsent messages whose scheduled date has arrived, oldest first.
    ///
    /// The date-level filter matches the selection query of the original
    /// cron; same-day messages with a future time are skipped by the
    /// dispatcher after recomputing `due_at`.
    pub async fn find_due(now: DateTime<Utc>, limit: i64, pool: &PgPool) -> Result<Vec<DueMessage>> {
        let messages = sqlx::query_as::<_, DueMessage>(
            "SELECT m.*, t.phone_number AS trip_phone
             FROM scheduled_whatsapp_messages m
             LEFT JOIN travel_trips t ON t.id = m.trip_id
             WHERE m.is_sent = false AND m.scheduled_date <= $1
             ORDER BY m.scheduled_date ASC, m.scheduled_time ASC
             LIMIT $2",
        )
        .bind(now.date_naive())
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Mark a message as sent. Terminal: the row never becomes due again.
    pub async fn mark_sent(message_id: Uuid, sent_at: DateTime<Utc>, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_whatsapp_messages
             SET is_sent = true, sent_at = $2
             WHERE id = $1",
        )
        .bind(message_id)
        .bind(sent_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}
