//! Server dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by the
//! dispatcher, the exchange endpoint and the scheduled tasks. All external
//! services use trait abstractions to enable testing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use twilio::{TwilioOptions, TwilioService};
use uuid::Uuid;

use crate::domains::builder::BuilderTokenService;
use crate::domains::messaging::models::BrandApiSettings;
use crate::domains::messaging::{Dispatcher, DispatcherPolicy};
use crate::kernel::token_cache::TokenCache;
use crate::kernel::{
    BaseInteractionStore, BaseMessagingGateway, BaseScheduledMessageStore, BaseSessionStore,
    BaseTemplateRegistry, GatewayReceipt, MessageContent, OutboundMessage,
};

// =============================================================================
// Twilio Gateway (implements BaseMessagingGateway trait)
// =============================================================================

/// WhatsApp gateway over Twilio with per-brand credentials.
///
/// A brand's own `api_settings` row wins over the system-wide sender from
/// the environment; resolved credentials are memoized per brand with a TTL
/// so the settings lookup doesn't run on every message.
pub struct TwilioGateway {
    pool: PgPool,
    system: TwilioOptions,
    credentials: TokenCache<Uuid, TwilioOptions>,
}

impl TwilioGateway {
    pub fn new(pool: PgPool, system: TwilioOptions, cache_ttl: Duration) -> Self {
        Self {
            pool,
            system,
            credentials: TokenCache::new(cache_ttl),
        }
    }

    async fn options_for_brand(&self, brand_id: Uuid) -> Result<TwilioOptions> {
        if let Some(cached) = self.credentials.get(&brand_id).await {
            return Ok(cached);
        }

        let settings = BrandApiSettings::find_for_brand(brand_id, &self.pool).await?;

        let options = settings
            .as_ref()
            .and_then(BrandApiSettings::twilio_credentials)
            .map(|(account_sid, auth_token, whatsapp_number)| TwilioOptions {
                account_sid,
                auth_token,
                whatsapp_number: whatsapp_number
                    .unwrap_or_else(|| self.system.whatsapp_number.clone()),
            })
            .unwrap_or_else(|| self.system.clone());

        self.credentials.insert(brand_id, options.clone()).await;
        Ok(options)
    }
}

#[async_trait]
impl BaseMessagingGateway for TwilioGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<GatewayReceipt> {
        let options = self.options_for_brand(message.brand_id).await?;
        let service = TwilioService::new(options);

        let response = match &message.content {
            MessageContent::Body(body) => service.send_message(&message.to, body).await,
            MessageContent::Template {
                content_sid,
                variables,
            } => service.send_template(&message.to, content_sid, variables).await,
        }
        .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(GatewayReceipt {
            message_sid: response.sid,
        })
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to routes and scheduled tasks
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub messages: Arc<dyn BaseScheduledMessageStore>,
    pub templates: Arc<dyn BaseTemplateRegistry>,
    pub interactions: Arc<dyn BaseInteractionStore>,
    pub gateway: Arc<dyn BaseMessagingGateway>,
    pub sessions: Arc<dyn BaseSessionStore>,
    /// Token service for builder session exchange
    pub token_service: Arc<BuilderTokenService>,
    pub dispatcher_policy: DispatcherPolicy,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        messages: Arc<dyn BaseScheduledMessageStore>,
        templates: Arc<dyn BaseTemplateRegistry>,
        interactions: Arc<dyn BaseInteractionStore>,
        gateway: Arc<dyn BaseMessagingGateway>,
        sessions: Arc<dyn BaseSessionStore>,
        token_service: Arc<BuilderTokenService>,
        dispatcher_policy: DispatcherPolicy,
    ) -> Self {
        Self {
            db_pool,
            messages,
            templates,
            interactions,
            gateway,
            sessions,
            token_service,
            dispatcher_policy,
        }
    }

    /// Dispatcher wired to this container's collaborators
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.messages.clone(),
            self.templates.clone(),
            self.interactions.clone(),
            self.gateway.clone(),
            self.dispatcher_policy.clone(),
        )
    }
}
