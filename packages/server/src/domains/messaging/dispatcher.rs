//! Scheduled message dispatch.
//!
//! Periodically invoked (cron or the internal HTTP trigger); walks the batch
//! of due messages one at a time, decides template vs. freeform per the
//! 24-hour interaction window, and dispatches via the messaging gateway.
//!
//! ```text
//! dispatch_due_messages()
//!     │
//!     └─► fetch_due (batch of 50, oldest first)
//!             └─► For each message → resolve recipient → check window
//!                     └─► send template or freeform → mark sent
//! ```
//!
//! A message is marked sent exactly once, including on failure under the
//! default policy: a failed dispatch is terminal, never re-attempted by a
//! later invocation. Exclusion between invocations comes from the single
//! in-process cron trigger; the dispatcher takes no row locks itself.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domains::messaging::models::DueMessage;
use crate::domains::messaging::sanitize::sanitize_variables;
use crate::kernel::{
    BaseInteractionStore, BaseMessagingGateway, BaseScheduledMessageStore, BaseTemplateRegistry,
    MessageContent, OutboundMessage,
};

/// Freeform sends are only accepted inside this window after the
/// recipient's last inbound message
pub const INTERACTION_WINDOW_HOURS: i64 = 24;

/// What happens to a message whose dispatch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Mark failed messages sent: never double-send, may drop
    #[default]
    MarkSent,
    /// Leave failed messages unsent so a later invocation retries them
    Retry,
}

#[derive(Debug, Error)]
#[error("Unknown failure policy: {0}")]
pub struct ParseFailurePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark-sent" => Ok(Self::MarkSent),
            "retry" => Ok(Self::Retry),
            other => Err(ParseFailurePolicyError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherPolicy {
    pub batch_limit: i64,
    pub default_template_name: String,
    pub on_failure: FailurePolicy,
}

impl Default for DispatcherPolicy {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            default_template_name: "scheduled_reminder".to_string(),
            on_failure: FailurePolicy::MarkSent,
        }
    }
}

/// Per-message dispatch failures. All are recorded in the report and are
/// non-fatal to the batch.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("No recipient phone number available")]
    MissingRecipient,

    #[error("No usable template outside the 24-hour interaction window")]
    TemplateRequiredButMissing,

    #[error("Gateway send failed: {0}")]
    GatewaySendFailed(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),
}

#[derive(Debug, Serialize)]
pub struct DispatchOutcome {
    pub id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct DispatchReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
}

enum Processed {
    /// Not yet due at processing time (clock skew between the selection
    /// query and this check); left untouched for a later invocation
    Skipped,
    Sent { message_sid: String },
}

pub struct Dispatcher {
    messages: Arc<dyn BaseScheduledMessageStore>,
    templates: Arc<dyn BaseTemplateRegistry>,
    interactions: Arc<dyn BaseInteractionStore>,
    gateway: Arc<dyn BaseMessagingGateway>,
    policy: DispatcherPolicy,
}

impl Dispatcher {
    pub fn new(
        messages: Arc<dyn BaseScheduledMessageStore>,
        templates: Arc<dyn BaseTemplateRegistry>,
        interactions: Arc<dyn BaseInteractionStore>,
        gateway: Arc<dyn BaseMessagingGateway>,
        policy: DispatcherPolicy,
    ) -> Self {
        Self {
            messages,
            templates,
            interactions,
            gateway,
            policy,
        }
    }

    /// Process the current batch of due messages.
    ///
    /// One message's failure never aborts the batch; every touched message
    /// is marked sent (success or failure alike under the default policy)
    /// before its outcome lands in the report.
    pub async fn dispatch_due_messages(&self) -> Result<DispatchReport> {
        let now = Utc::now();
        let due = self.messages.fetch_due(now, self.policy.batch_limit).await?;

        if due.is_empty() {
            return Ok(DispatchReport::default());
        }

        tracing::info!("Found {} scheduled messages to process", due.len());

        let mut report = DispatchReport::default();

        for due_message in &due {
            let message_id = due_message.message.id;

            match self.process_message(due_message, now).await {
                Ok(Processed::Skipped) => continue,
                Ok(Processed::Sent { message_sid }) => {
                    if let Err(e) = self.messages.mark_sent(message_id, now).await {
                        tracing::error!("Failed to mark message {} sent: {}", message_id, e);
                    }

                    tracing::info!("Message {} sent as {}", message_id, message_sid);
                    report.successful += 1;
                    report.results.push(DispatchOutcome {
                        id: message_id,
                        success: true,
                        error: None,
                    });
                }
                Err(failure) => {
                    tracing::error!("Failed to dispatch message {}: {}", message_id, failure);

                    if self.policy.on_failure == FailurePolicy::MarkSent {
                        if let Err(e) = self.messages.mark_sent(message_id, now).await {
                            tracing::error!(
                                "Failed to mark failed message {} sent: {}",
                                message_id,
                                e
                            );
                        }
                    }

                    report.failed += 1;
                    report.results.push(DispatchOutcome {
                        id: message_id,
                        success: false,
                        error: Some(failure.to_string()),
                    });
                }
            }
        }

        report.processed = report.successful + report.failed;
        Ok(report)
    }

    async fn process_message(
        &self,
        due: &DueMessage,
        now: DateTime<Utc>,
    ) -> Result<Processed, DispatchFailure> {
        let msg = &due.message;

        if msg.due_at() > now {
            tracing::debug!(
                "Message {} not yet due (scheduled for {})",
                msg.id,
                msg.due_at()
            );
            return Ok(Processed::Skipped);
        }

        let recipient = resolve_recipient(msg.recipient_phone.as_deref(), due.trip_phone.as_deref())
            .ok_or(DispatchFailure::MissingRecipient)?;

        let last_inbound = self
            .interactions
            .last_interaction(msg.trip_id, &recipient)
            .await
            .map_err(|e| DispatchFailure::LookupFailed(e.to_string()))?;

        let content = if within_interaction_window(last_inbound, now) {
            match &msg.template_name {
                Some(name) => match self.resolve_template(name, due).await? {
                    Some(content) => content,
                    None => {
                        // Window is open, so a freeform fallback is legal
                        tracing::warn!(
                            "Template \"{}\" not found for message {}, sending freeform",
                            name,
                            msg.id
                        );
                        MessageContent::Body(msg.message_content.clone())
                    }
                },
                None => MessageContent::Body(msg.message_content.clone()),
            }
        } else {
            // Outside the window the gateway rejects freeform bodies
            let name = msg
                .template_name
                .clone()
                .unwrap_or_else(|| self.policy.default_template_name.clone());

            self.resolve_template(&name, due)
                .await?
                .ok_or(DispatchFailure::TemplateRequiredButMissing)?
        };

        let receipt = self
            .gateway
            .send(&OutboundMessage {
                brand_id: msg.brand_id,
                to: recipient,
                content,
            })
            .await
            .map_err(|e| DispatchFailure::GatewaySendFailed(e.to_string()))?;

        Ok(Processed::Sent {
            message_sid: receipt.message_sid,
        })
    }

    async fn resolve_template(
        &self,
        name: &str,
        due: &DueMessage,
    ) -> Result<Option<MessageContent>, DispatchFailure> {
        let template = self
            .templates
            .lookup(name, due.message.brand_id)
            .await
            .map_err(|e| DispatchFailure::LookupFailed(e.to_string()))?;

        Ok(template.map(|template| {
            let mut variables = sanitize_variables(due.message.template_variables.as_ref());

            // The registry declares the template's variable schema; values
            // outside it would be rejected by the provider.
            if !template.variable_slots.is_empty() {
                variables.retain(|slot, _| template.variable_slots.iter().any(|s| s == slot));
            }

            MessageContent::Template {
                content_sid: template.content_sid,
                variables,
            }
        }))
    }
}

fn resolve_recipient(explicit: Option<&str>, trip_phone: Option<&str>) -> Option<String> {
    explicit
        .filter(|p| !p.trim().is_empty())
        .or(trip_phone.filter(|p| !p.trim().is_empty()))
        .map(str::to_string)
}

fn within_interaction_window(last_inbound: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_inbound {
        Some(at) => now.signed_duration_since(at) < Duration::hours(INTERACTION_WINDOW_HOURS),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_recipient_wins_over_trip_phone() {
        assert_eq!(
            resolve_recipient(Some("+31611111111"), Some("+31622222222")),
            Some("+31611111111".to_string())
        );
    }

    #[test]
    fn blank_recipient_falls_back_to_trip_phone() {
        assert_eq!(
            resolve_recipient(Some("  "), Some("+31622222222")),
            Some("+31622222222".to_string())
        );
        assert_eq!(resolve_recipient(None, None), None);
    }

    #[test]
    fn window_boundary_is_exclusive_at_24h() {
        let now = Utc::now();

        let just_outside = now - Duration::hours(24) - Duration::seconds(1);
        assert!(!within_interaction_window(Some(just_outside), now));

        let exactly = now - Duration::hours(24);
        assert!(!within_interaction_window(Some(exactly), now));

        let just_inside = now - Duration::hours(23) - Duration::minutes(59);
        assert!(within_interaction_window(Some(just_inside), now));

        assert!(!within_interaction_window(None, now));
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!(
            "mark-sent".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::MarkSent
        );
        assert_eq!(
            "retry".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Retry
        );
        assert!("never".parse::<FailurePolicy>().is_err());
    }
}
