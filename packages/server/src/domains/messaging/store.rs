//! Postgres-backed implementations of the messaging collaborator traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::messaging::models::{DueMessage, InteractionRecord, ScheduledMessage, TemplateDefinition};
use crate::kernel::{
    BaseInteractionStore, BaseScheduledMessageStore, BaseTemplateRegistry, ResolvedTemplate,
};

pub struct PostgresScheduledMessageStore {
    pool: PgPool,
}

impl PostgresScheduledMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseScheduledMessageStore for PostgresScheduledMessageStore {
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DueMessage>> {
        ScheduledMessage::find_due(now, limit, &self.pool).await
    }

    async fn mark_sent(&self, message_id: Uuid, sent_at: DateTime<Utc>) -> Result<()> {
        ScheduledMessage::mark_sent(message_id, sent_at, &self.pool).await
    }
}

pub struct PostgresTemplateRegistry {
    pool: PgPool,
}

impl PostgresTemplateRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseTemplateRegistry for PostgresTemplateRegistry {
    async fn lookup(&self, name: &str, brand_id: Uuid) -> Result<Option<ResolvedTemplate>> {
        let template = TemplateDefinition::resolve(name, brand_id, &self.pool).await?;

        Ok(template.map(|t| ResolvedTemplate {
            variable_slots: t.variable_slots(),
            content_sid: t.template_sid,
        }))
    }
}

pub struct PostgresInteractionStore {
    pool: PgPool,
}

impl PostgresInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseInteractionStore for PostgresInteractionStore {
    async fn last_interaction(
        &self,
        trip_id: Uuid,
        phone_number: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        InteractionRecord::last_inbound(trip_id, phone_number, &self.pool).await
    }
}
