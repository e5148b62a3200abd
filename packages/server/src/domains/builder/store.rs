//! Postgres-backed implementation of the builder session store.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::builder::models::BuilderSession;
use crate::kernel::BaseSessionStore;

pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseSessionStore for PostgresSessionStore {
    async fn get(&self, session_id: Uuid) -> Result<Option<BuilderSession>> {
        BuilderSession::find(session_id, &self.pool).await
    }

    async fn conditional_activate(&self, session_id: Uuid, session_secret: &str) -> Result<bool> {
        BuilderSession::conditional_activate(session_id, session_secret, &self.pool).await
    }

    async fn touch(&self, session_id: Uuid) -> Result<()> {
        BuilderSession::touch(session_id, &self.pool).await
    }
}
