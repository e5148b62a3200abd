// Mock implementations of the collaborator traits for testing
//
// Provides in-memory services that can be injected into the dispatcher and
// the exchange procedure in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{
    BaseInteractionStore, BaseMessagingGateway, BaseScheduledMessageStore, BaseSessionStore,
    BaseTemplateRegistry, GatewayReceipt, OutboundMessage, ResolvedTemplate,
};
use crate::domains::builder::models::BuilderSession;
use crate::domains::messaging::models::{DueMessage, ScheduledMessage};

// =============================================================================
// Mock Messaging Gateway
// =============================================================================

pub struct MockMessagingGateway {
    failures: Arc<Mutex<Vec<String>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MockMessagingGateway {
    pub fn new() -> Self {
        Self {
            failures: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a failure for the next send call
    pub fn with_failure(self, error: &str) -> Self {
        self.failures.lock().unwrap().push(error.to_string());
        self
    }

    /// Get all messages that were sent
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Check if anything was sent to a recipient
    pub fn was_sent_to(&self, recipient: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|m| m.to == recipient)
    }
}

impl Default for MockMessagingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessagingGateway for MockMessagingGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<GatewayReceipt> {
        let mut failures = self.failures.lock().unwrap();
        if !failures.is_empty() {
            let error = failures.remove(0);
            return Err(anyhow::anyhow!("{}", error));
        }
        drop(failures);

        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());

        Ok(GatewayReceipt {
            message_sid: format!("SM{:032}", sent.len()),
        })
    }
}

// =============================================================================
// Mock Template Registry
// =============================================================================

pub struct MockTemplateRegistry {
    templates: Arc<Mutex<Vec<(String, Option<Uuid>, ResolvedTemplate)>>>,
    lookup_calls: Arc<Mutex<Vec<String>>>,
}

impl MockTemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(Mutex::new(Vec::new())),
            lookup_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a template; `brand_id = None` registers a global definition
    pub fn with_template(
        self,
        name: &str,
        brand_id: Option<Uuid>,
        content_sid: &str,
        variable_slots: Vec<&str>,
    ) -> Self {
        self.templates.lock().unwrap().push((
            name.to_string(),
            brand_id,
            ResolvedTemplate {
                content_sid: content_sid.to_string(),
                variable_slots: variable_slots.iter().map(|s| s.to_string()).collect(),
            },
        ));
        self
    }

    /// Get all template names that were looked up
    pub fn lookup_calls(&self) -> Vec<String> {
        self.lookup_calls.lock().unwrap().clone()
    }
}

impl Default for MockTemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseTemplateRegistry for MockTemplateRegistry {
    async fn lookup(&self, name: &str, brand_id: Uuid) -> Result<Option<ResolvedTemplate>> {
        self.lookup_calls.lock().unwrap().push(name.to_string());

        let templates = self.templates.lock().unwrap();

        // Brand-scoped match wins over global
        let brand_match = templates
            .iter()
            .find(|(n, b, _)| n == name && *b == Some(brand_id));
        let global_match = templates.iter().find(|(n, b, _)| n == name && b.is_none());

        Ok(brand_match.or(global_match).map(|(_, _, t)| t.clone()))
    }
}

// =============================================================================
// Mock Interaction Store
// =============================================================================

pub struct MockInteractionStore {
    interactions: Arc<Mutex<HashMap<(Uuid, String), DateTime<Utc>>>>,
}

impl MockInteractionStore {
    pub fn new() -> Self {
        Self {
            interactions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_interaction(self, trip_id: Uuid, phone_number: &str, at: DateTime<Utc>) -> Self {
        self.interactions
            .lock()
            .unwrap()
            .insert((trip_id, phone_number.to_string()), at);
        self
    }
}

impl Default for MockInteractionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseInteractionStore for MockInteractionStore {
    async fn last_interaction(
        &self,
        trip_id: Uuid,
        phone_number: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .interactions
            .lock()
            .unwrap()
            .get(&(trip_id, phone_number.to_string()))
            .copied())
    }
}

// =============================================================================
// Mock Scheduled Message Store
// =============================================================================

pub struct MockScheduledMessageStore {
    messages: Arc<Mutex<Vec<DueMessage>>>,
}

impl MockScheduledMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_message(self, message: DueMessage) -> Self {
        self.messages.lock().unwrap().push(message);
        self
    }

    /// Read back a message by id (sent flags included)
    pub fn message(&self, message_id: Uuid) -> Option<DueMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.message.id == message_id)
            .cloned()
    }

    pub fn unsent_count(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.message.is_sent)
            .count()
    }
}

impl Default for MockScheduledMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseScheduledMessageStore for MockScheduledMessageStore {
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DueMessage>> {
        let messages = self.messages.lock().unwrap();

        let mut due: Vec<DueMessage> = messages
            .iter()
            .filter(|m| !m.message.is_sent && m.message.scheduled_date <= now.date_naive())
            .cloned()
            .collect();

        due.sort_by_key(|m| (m.message.scheduled_date, m.message.scheduled_time));
        due.truncate(limit as usize);

        Ok(due)
    }

    async fn mark_sent(&self, message_id: Uuid, sent_at: DateTime<Utc>) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();

        if let Some(due) = messages.iter_mut().find(|m| m.message.id == message_id) {
            due.message.is_sent = true;
            due.message.sent_at = Some(sent_at);
        }

        Ok(())
    }
}

// =============================================================================
// Mock Session Store
// =============================================================================

pub struct MockSessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, BuilderSession>>>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_session(self, session: BuilderSession) -> Self {
        self.sessions.lock().unwrap().insert(session.id, session);
        self
    }

    pub fn session(&self, session_id: Uuid) -> Option<BuilderSession> {
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSessionStore for MockSessionStore {
    async fn get(&self, session_id: Uuid) -> Result<Option<BuilderSession>> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn conditional_activate(&self, session_id: Uuid, session_secret: &str) -> Result<bool> {
        let mut sessions = self.sessions.lock().unwrap();

        match sessions.get_mut(&session_id) {
            Some(session) if !session.initial_token_used => {
                session.initial_token_used = true;
                session.session_token = Some(session_secret.to_string());
                session.last_activity_at = Some(Utc::now());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn touch(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();

        if let Some(session) = sessions.get_mut(&session_id) {
            session.last_activity_at = Some(Utc::now());
        }

        Ok(())
    }
}

// =============================================================================
// Test fixtures
// =============================================================================

/// A due freeform message scheduled an hour in the past, with an explicit
/// recipient
pub fn due_message(brand_id: Uuid, trip_id: Uuid, recipient: &str) -> DueMessage {
    let scheduled = Utc::now() - chrono::Duration::hours(1);

    DueMessage {
        message: ScheduledMessage {
            id: Uuid::new_v4(),
            brand_id,
            trip_id,
            recipient_phone: Some(recipient.to_string()),
            scheduled_date: scheduled.date_naive(),
            scheduled_time: scheduled.time(),
            template_name: None,
            template_variables: None,
            message_content: "Hi!".to_string(),
            is_sent: false,
            sent_at: None,
            created_at: Utc::now(),
        },
        trip_phone: None,
    }
}

/// An unexpired, unactivated builder session
pub fn minted_session(brand_id: Uuid) -> BuilderSession {
    BuilderSession {
        id: Uuid::new_v4(),
        brand_id,
        user_id: None,
        expires_at: Utc::now() + chrono::Duration::hours(24),
        initial_token_used: false,
        session_token: None,
        last_activity_at: None,
        created_at: Utc::now(),
    }
}
