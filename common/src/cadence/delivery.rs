// Inbound delivery-event processing.
//
// Provider webhooks report what happened to a message after it left the
// system. Transitions are applied forward-only, and reply / bounce /
// complaint events also stop the lead, guarded so an already-terminal
// lead is never clobbered.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::db::repositories::{LeadRepository, MessageRepository};
use crate::db::DbPool;
use crate::errors::WebhookError;
use crate::models::{Channel, DeliveryEvent, DeliveryEventKind, LeadStatus, MessageStatus};
use crate::telemetry;

/// The message status a provider event maps to.
pub fn message_status_for(kind: DeliveryEventKind) -> MessageStatus {
    match kind {
        DeliveryEventKind::Sent => MessageStatus::Sent,
        DeliveryEventKind::Delivered => MessageStatus::Delivered,
        DeliveryEventKind::Opened => MessageStatus::Read,
        DeliveryEventKind::Replied => MessageStatus::Replied,
        DeliveryEventKind::Bounced => MessageStatus::Bounced,
        DeliveryEventKind::Complained => MessageStatus::Bounced,
    }
}

/// The lead stop status an event implies, when any. Reply, bounce and
/// complaint are reactive stop conditions for the whole cadence.
pub fn lead_status_for(kind: DeliveryEventKind) -> Option<LeadStatus> {
    match kind {
        DeliveryEventKind::Replied => Some(LeadStatus::Replied),
        DeliveryEventKind::Bounced => Some(LeadStatus::Bounced),
        DeliveryEventKind::Complained => Some(LeadStatus::OptedOut),
        _ => None,
    }
}

/// What happened to an accepted delivery event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The transition was applied.
    Applied { message_status: MessageStatus },
    /// The event arrived late or duplicated; current state wins.
    Ignored { current_status: MessageStatus },
}

/// Applies provider events to messages and leads.
pub struct DeliveryProcessor {
    messages: MessageRepository,
    leads: LeadRepository,
}

impl DeliveryProcessor {
    pub fn new(pool: DbPool) -> Self {
        Self {
            messages: MessageRepository::new(pool.clone()),
            leads: LeadRepository::new(pool),
        }
    }

    /// Apply one event, keyed by the provider message id.
    #[instrument(skip(self, event), fields(provider_message_id = %event.provider_message_id))]
    pub async fn apply(
        &self,
        channel: Channel,
        event: &DeliveryEvent,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let message = self
            .messages
            .find_by_provider_id(channel, &event.provider_message_id)
            .await?
            .ok_or_else(|| WebhookError::UnknownMessage(event.provider_message_id.clone()))?;

        let target = message_status_for(event.event);
        telemetry::record_delivery_event(&target.to_string());

        if !message.status.can_transition_to(target) {
            warn!(
                message_id = %message.id,
                current = %message.status,
                target = %target,
                "Delivery event ignored, transition not allowed"
            );
            return Ok(DeliveryOutcome::Ignored {
                current_status: message.status,
            });
        }

        let at = event.occurred_at.unwrap_or_else(Utc::now);
        self.messages
            .apply_delivery_status(message.id, target, at)
            .await?;

        if let Some(lead_status) = lead_status_for(event.event) {
            self.leads.stop(message.lead_id, lead_status, at).await?;
        }

        info!(
            message_id = %message.id,
            lead_id = %message.lead_id,
            status = %target,
            "Delivery event applied"
        );
        Ok(DeliveryOutcome::Applied {
            message_status: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_to_message_status_mapping() {
        assert_eq!(
            message_status_for(DeliveryEventKind::Delivered),
            MessageStatus::Delivered
        );
        assert_eq!(
            message_status_for(DeliveryEventKind::Opened),
            MessageStatus::Read
        );
        assert_eq!(
            message_status_for(DeliveryEventKind::Replied),
            MessageStatus::Replied
        );
        assert_eq!(
            message_status_for(DeliveryEventKind::Complained),
            MessageStatus::Bounced
        );
    }

    #[test]
    fn test_stop_events_map_to_lead_status() {
        assert_eq!(
            lead_status_for(DeliveryEventKind::Replied),
            Some(LeadStatus::Replied)
        );
        assert_eq!(
            lead_status_for(DeliveryEventKind::Bounced),
            Some(LeadStatus::Bounced)
        );
        assert_eq!(
            lead_status_for(DeliveryEventKind::Complained),
            Some(LeadStatus::OptedOut)
        );
        assert_eq!(lead_status_for(DeliveryEventKind::Delivered), None);
        assert_eq!(lead_status_for(DeliveryEventKind::Sent), None);
    }

    #[test]
    fn test_late_event_would_be_ignored_by_guard() {
        // The processor consults the same forward-only guard the models
        // define: a delivered event after a reply changes nothing
        assert!(!MessageStatus::Replied.can_transition_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Bounced.can_transition_to(MessageStatus::Read));
    }
}
