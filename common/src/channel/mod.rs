// Channel adapters: one shared cadence engine, two concrete channels.
//
// The adapter carries everything channel-specific: daily limit and
// business-hour selection from settings, destination extraction, the
// per-step lead status mapping, and the transport call itself.

pub mod email;
pub mod whatsapp;

use async_trait::async_trait;

use crate::cadence::window::BusinessHours;
use crate::errors::TransportError;
use crate::models::{CadenceSettings, Channel, Lead, LeadStatus, OutboundMessage};

pub use email::EmailAdapter;
pub use whatsapp::WhatsAppAdapter;

/// Provider acknowledgement for a successful send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub provider_message_id: String,
}

/// Channel-specific behavior consumed by the cadence engine.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// The channel's daily cap from settings. Non-positive disables the
    /// channel.
    fn daily_limit(&self, settings: &CadenceSettings) -> i32;

    /// The channel's business-hour bounds from settings.
    fn business_hours(&self, settings: &CadenceSettings) -> BusinessHours;

    /// The lead's destination on this channel (email address or phone).
    fn destination(&self, lead: &Lead) -> Option<String>;

    /// The lead status marker for a completed step on this channel.
    fn lead_status_for_step(&self, sequence: i16) -> LeadStatus {
        LeadStatus::for_step(self.channel(), sequence)
    }

    /// Deliver the message. Implementations must not retry internally; a
    /// failed send is terminal for the message.
    async fn send(
        &self,
        destination: &str,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, TransportError>;
}
