// WhatsApp channel: Business Cloud API (Graph API) text messages.
//
// Requires an access token and phone number id from Meta Business Suite.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ChannelAdapter, SendReceipt};
use crate::cadence::window::BusinessHours;
use crate::config::WhatsappChannelConfig;
use crate::errors::TransportError;
use crate::models::{CadenceSettings, Channel, Lead, OutboundMessage};

/// WhatsApp adapter speaking the Cloud API over HTTPS.
pub struct WhatsAppAdapter {
    config: WhatsappChannelConfig,
    client: reqwest::Client,
}

impl WhatsAppAdapter {
    pub fn new(config: WhatsappChannelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppAdapter {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    fn daily_limit(&self, settings: &CadenceSettings) -> i32 {
        // No fallback to the email limit: an unset WhatsApp limit disables
        // the channel
        settings.whatsapp_daily_limit.unwrap_or(0)
    }

    fn business_hours(&self, settings: &CadenceSettings) -> BusinessHours {
        BusinessHours::new(
            settings.whatsapp_hour_start.max(0) as u32,
            settings.whatsapp_hour_end.max(0) as u32,
        )
    }

    fn destination(&self, lead: &Lead) -> Option<String> {
        lead.phone
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
        if self.config.access_token.is_empty() || self.config.phone_number_id.is_empty() {
            return Err(TransportError::NotConfigured(
                "WhatsApp access_token or phone_number_id not configured".to_string(),
            ));
        }

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": destination,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": message.body
            }
        });

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("WhatsApp API request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected(format!(
                "WhatsApp API error {}: {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        let provider_message_id = result["messages"][0]["id"]
            .as_str()
            .ok_or_else(|| {
                TransportError::MalformedResponse("response has no messages[0].id".to_string())
            })?
            .to_string();

        debug!(provider_message_id = %provider_message_id, to = %destination, "WhatsApp message sent");
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
    use uuid::Uuid;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: String) -> WhatsappChannelConfig {
        WhatsappChannelConfig {
            api_base,
            access_token: "test-token".to_string(),
            phone_number_id: "123456".to_string(),
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::new_pending(
            Uuid::new_v4(),
            Channel::Whatsapp,
            1,
            None,
            "Hi there".to_string(),
            Some("+4915112345678".to_string()),
        )
    }

    fn settings(limit: Option<i32>) -> CadenceSettings {
        CadenceSettings {
            user_id: Uuid::new_v4(),
            email_daily_limit: 30,
            whatsapp_daily_limit: limit,
            email_hour_start: 9,
            email_hour_end: 18,
            whatsapp_hour_start: 10,
            whatsapp_hour_end: 17,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unset_limit_disables_channel_without_email_fallback() {
        let adapter = WhatsAppAdapter::new(config("http://localhost".to_string()));
        assert_eq!(adapter.daily_limit(&settings(None)), 0);
        assert_eq!(adapter.daily_limit(&settings(Some(20))), 20);
    }

    #[test]
    fn test_destination_comes_from_phone() {
        let adapter = WhatsAppAdapter::new(config("http://localhost".to_string()));
        let lead = Lead {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            full_name: None,
            company: None,
            email: Some("x@example.com".to_string()),
            phone: Some(" +4915112345678 ".to_string()),
            status: LeadStatus::Enriched,
            cadence_kind: CadenceKind::WhatsappOnly,
            replied_at: None,
            opted_out_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            adapter.destination(&lead),
            Some("+4915112345678".to_string())
        );
        assert_eq!(adapter.lead_status_for_step(1), LeadStatus::Whatsapp1Sent);
    }

    #[tokio::test]
    async fn test_send_posts_to_cloud_api_and_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/123456/messages"))
            .and(bearer_token("test-token"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "+4915112345678"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "wamid.TEST123" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri()));
        let receipt = adapter.send("+4915112345678", &message()).await.unwrap();
        assert_eq!(receipt.provider_message_id, "wamid.TEST123");
    }

    #[tokio::test]
    async fn test_send_surfaces_api_errors_as_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri()));
        let result = adapter.send("+4915112345678", &message()).await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_send_rejects_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri()));
        let result = adapter.send("+4915112345678", &message()).await;
        assert!(matches!(result, Err(TransportError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_adapter_refuses_to_send() {
        let adapter = WhatsAppAdapter::new(WhatsappChannelConfig {
            api_base: "http://localhost".to_string(),
            access_token: String::new(),
            phone_number_id: String::new(),
        });

        let result = adapter.send("+4915112345678", &message()).await;
        assert!(matches!(result, Err(TransportError::NotConfigured(_))));
    }
}
