// Email channel: async SMTP sending via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ChannelAdapter, SendReceipt};
use crate::cadence::window::BusinessHours;
use crate::config::EmailChannelConfig;
use crate::errors::TransportError;
use crate::models::{CadenceSettings, Channel, Lead, OutboundMessage};

/// Email adapter backed by an async SMTP relay.
pub struct EmailAdapter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailAdapter {
    pub fn new(config: &EmailChannelConfig) -> Result<Self, TransportError> {
        let address = config
            .from_address
            .parse()
            .map_err(|e| TransportError::NotConfigured(format!("invalid from_address: {}", e)))?;
        let from = Mailbox::new(config.from_name.clone(), address);

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| TransportError::NotConfigured(format!("SMTP relay: {}", e)))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn daily_limit(&self, settings: &CadenceSettings) -> i32 {
        settings.email_daily_limit
    }

    fn business_hours(&self, settings: &CadenceSettings) -> BusinessHours {
        BusinessHours::new(
            settings.email_hour_start.max(0) as u32,
            settings.email_hour_end.max(0) as u32,
        )
    }

    fn destination(&self, lead: &Lead) -> Option<String> {
        lead.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    #[instrument(skip(self, message), fields(message_id = %message.id, sequence = message.sequence_number))]
    async fn send(
        &self,
        destination: &str,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, TransportError> {
        let to: Mailbox =
            destination
                .parse()
                .map_err(|e| TransportError::InvalidDestination {
                    destination: destination.to_string(),
                    reason: format!("{}", e),
                })?;

        // Pin the Message-ID ourselves so the send log and delivery
        // webhooks share a stable provider key
        let provider_message_id = format!("<{}@leadflow>", Uuid::new_v4());

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone().unwrap_or_default())
            .message_id(Some(provider_message_id.clone()))
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| TransportError::Rejected(format!("message build failed: {}", e)))?;

        self.transport.send(email).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::Rejected(e.to_string())
            } else {
                TransportError::ConnectionFailed(e.to_string())
            }
        })?;

        debug!(provider_message_id = %provider_message_id, to = %destination, "Email sent");
        Ok(SendReceipt {
            provider_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CadenceKind, LeadStatus};
    use chrono::Utc;

    fn config() -> EmailChannelConfig {
        EmailChannelConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "user".to_string(),
            smtp_password: "pass".to_string(),
            from_address: "outreach@example.com".to_string(),
            from_name: Some("Outreach".to_string()),
        }
    }

    fn lead_with_email(email: Option<&str>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            full_name: None,
            company: None,
            email: email.map(str::to_string),
            phone: None,
            status: LeadStatus::Enriched,
            cadence_kind: CadenceKind::EmailOnly,
            replied_at: None,
            opted_out_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_adapter_settings_selection() {
        let adapter = EmailAdapter::new(&config()).unwrap();
        let settings = CadenceSettings {
            user_id: Uuid::new_v4(),
            email_daily_limit: 30,
            whatsapp_daily_limit: Some(20),
            email_hour_start: 9,
            email_hour_end: 18,
            whatsapp_hour_start: 10,
            whatsapp_hour_end: 17,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(adapter.channel(), Channel::Email);
        assert_eq!(adapter.daily_limit(&settings), 30);
        assert_eq!(adapter.business_hours(&settings), BusinessHours::new(9, 18));
        assert_eq!(adapter.lead_status_for_step(2), LeadStatus::Email2Sent);
    }

    #[tokio::test]
    async fn test_destination_trims_and_rejects_empty() {
        let adapter = EmailAdapter::new(&config()).unwrap();

        assert_eq!(
            adapter.destination(&lead_with_email(Some("  a@b.com  "))),
            Some("a@b.com".to_string())
        );
        assert_eq!(adapter.destination(&lead_with_email(Some("   "))), None);
        assert_eq!(adapter.destination(&lead_with_email(None)), None);
    }

    #[tokio::test]
    async fn test_invalid_from_address_rejected() {
        let mut cfg = config();
        cfg.from_address = "not an address".to_string();
        assert!(matches!(
            EmailAdapter::new(&cfg),
            Err(TransportError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_unparseable_destination_fails_before_connecting() {
        let adapter = EmailAdapter::new(&config()).unwrap();
        let message = OutboundMessage::new_pending(
            Uuid::new_v4(),
            Channel::Email,
            1,
            Some("Hi".to_string()),
            "Body".to_string(),
            None,
        );

        let result = adapter.send("definitely not an email", &message).await;
        assert!(matches!(
            result,
            Err(TransportError::InvalidDestination { .. })
        ));
    }
}
