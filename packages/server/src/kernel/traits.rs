// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "decide template vs freeform") should be domain
// functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMessagingGateway)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domains::builder::models::BuilderSession;
use crate::domains::messaging::models::DueMessage;

// =============================================================================
// Messaging Gateway Trait (Infrastructure - outbound WhatsApp)
// =============================================================================

/// What an outbound message carries: either a freeform body or a
/// provider-approved template reference with its variable values.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Body(String),
    Template {
        content_sid: String,
        variables: HashMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub brand_id: Uuid,
    pub to: String,
    pub content: MessageContent,
}

/// Provider acknowledgement for a dispatched message
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReceipt {
    pub message_sid: String,
}

#[async_trait]
pub trait BaseMessagingGateway: Send + Sync {
    /// Send one outbound WhatsApp message
    async fn send(&self, message: &OutboundMessage) -> Result<GatewayReceipt>;
}

// =============================================================================
// Template Registry Trait (Infrastructure)
// =============================================================================

/// A resolved template: provider identifier plus its declared variable slots
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub content_sid: String,
    pub variable_slots: Vec<String>,
}

#[async_trait]
pub trait BaseTemplateRegistry: Send + Sync {
    /// Look up an active template by name; a brand-scoped definition wins
    /// over a global one with the same name
    async fn lookup(&self, name: &str, brand_id: Uuid) -> Result<Option<ResolvedTemplate>>;
}

// =============================================================================
// Interaction History Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseInteractionStore: Send + Sync {
    /// Most recent inbound message timestamp for a (trip, recipient) pair
    async fn last_interaction(
        &self,
        trip_id: Uuid,
        phone_number: &str,
    ) -> Result<Option<DateTime<Utc>>>;
}

// =============================================================================
// Scheduled Message Store Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseScheduledMessageStore: Send + Sync {
    /// Unsent messages whose scheduled date has arrived, oldest first,
    /// bounded by `limit`
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DueMessage>>;

    /// Flip a message to sent. Called exactly once per message, including
    /// for failed sends under the mark-sent policy.
    async fn mark_sent(&self, message_id: Uuid, sent_at: DateTime<Utc>) -> Result<()>;
}

// =============================================================================
// Builder Session Store Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseSessionStore: Send + Sync {
    /// Fetch a session record by id
    async fn get(&self, session_id: Uuid) -> Result<Option<BuilderSession>>;

    /// Consume the initial token: store the session secret and flip
    /// `initial_token_used`, but only if it is still false. Returns whether
    /// this call won the flip.
    async fn conditional_activate(&self, session_id: Uuid, session_secret: &str) -> Result<bool>;

    /// Bump `last_activity_at`
    async fn touch(&self, session_id: Uuid) -> Result<()>;
}
