use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Channel
// ============================================================================

/// Outbound channel. Each channel has its own daily cap, business hours,
/// and send log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Channel::Email),
            "whatsapp" => Ok(Channel::Whatsapp),
            _ => Err(format!("Invalid channel: {}", s)),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

// ============================================================================
// Lead Models
// ============================================================================

/// Lead lifecycle status. The status only advances forward through the
/// cadence sequence; REPLIED, OPTED_OUT and BOUNCED are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Extracted,
    Enriched,
    Email1Sent,
    Email2Sent,
    Email3Sent,
    Whatsapp1Sent,
    Whatsapp2Sent,
    Whatsapp3Sent,
    Replied,
    OptedOut,
    Bounced,
}

impl LeadStatus {
    /// Absorbing states: once reached, no further step transition may occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeadStatus::Replied | LeadStatus::OptedOut | LeadStatus::Bounced
        )
    }

    /// The per-step marker status a lead advances to after a successful send.
    pub fn for_step(channel: Channel, sequence: i16) -> LeadStatus {
        match (channel, sequence) {
            (Channel::Email, 1) => LeadStatus::Email1Sent,
            (Channel::Email, 2) => LeadStatus::Email2Sent,
            (Channel::Email, _) => LeadStatus::Email3Sent,
            (Channel::Whatsapp, 1) => LeadStatus::Whatsapp1Sent,
            (Channel::Whatsapp, 2) => LeadStatus::Whatsapp2Sent,
            (Channel::Whatsapp, _) => LeadStatus::Whatsapp3Sent,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeadStatus::Extracted => "extracted",
            LeadStatus::Enriched => "enriched",
            LeadStatus::Email1Sent => "email_1_sent",
            LeadStatus::Email2Sent => "email_2_sent",
            LeadStatus::Email3Sent => "email_3_sent",
            LeadStatus::Whatsapp1Sent => "whatsapp_1_sent",
            LeadStatus::Whatsapp2Sent => "whatsapp_2_sent",
            LeadStatus::Whatsapp3Sent => "whatsapp_3_sent",
            LeadStatus::Replied => "replied",
            LeadStatus::OptedOut => "opted_out",
            LeadStatus::Bounced => "bounced",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(LeadStatus::Extracted),
            "enriched" => Ok(LeadStatus::Enriched),
            "email_1_sent" => Ok(LeadStatus::Email1Sent),
            "email_2_sent" => Ok(LeadStatus::Email2Sent),
            "email_3_sent" => Ok(LeadStatus::Email3Sent),
            "whatsapp_1_sent" => Ok(LeadStatus::Whatsapp1Sent),
            "whatsapp_2_sent" => Ok(LeadStatus::Whatsapp2Sent),
            "whatsapp_3_sent" => Ok(LeadStatus::Whatsapp3Sent),
            "replied" => Ok(LeadStatus::Replied),
            "opted_out" => Ok(LeadStatus::OptedOut),
            "bounced" => Ok(LeadStatus::Bounced),
            _ => Err(format!("Invalid lead status: {}", s)),
        }
    }
}

impl TryFrom<String> for LeadStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Which channels a lead's cadence runs on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CadenceKind {
    EmailOnly,
    WhatsappOnly,
    Hybrid,
}

impl CadenceKind {
    /// Whether this cadence runs messages on the given channel.
    pub fn allows(&self, channel: Channel) -> bool {
        match self {
            CadenceKind::EmailOnly => channel == Channel::Email,
            CadenceKind::WhatsappOnly => channel == Channel::Whatsapp,
            CadenceKind::Hybrid => true,
        }
    }
}

impl std::fmt::Display for CadenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CadenceKind::EmailOnly => "email_only",
            CadenceKind::WhatsappOnly => "whatsapp_only",
            CadenceKind::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CadenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_only" => Ok(CadenceKind::EmailOnly),
            "whatsapp_only" => Ok(CadenceKind::WhatsappOnly),
            "hybrid" => Ok(CadenceKind::Hybrid),
            _ => Err(format!("Invalid cadence kind: {}", s)),
        }
    }
}

impl TryFrom<String> for CadenceKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Lead represents a prospect owned by a campaign. Created at extraction,
/// mutated by enrichment and by the cadence engine, never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: LeadStatus,
    #[sqlx(try_from = "String")]
    pub cadence_kind: CadenceKind,
    pub replied_at: Option<DateTime<Utc>>,
    pub opted_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// A stopped lead receives no further sends on any channel. Checked at
    /// lead level so a reply on one channel of a hybrid cadence also stops
    /// the other channel.
    pub fn is_stopped(&self) -> bool {
        self.status.is_terminal() || self.replied_at.is_some() || self.opted_out_at.is_some()
    }
}

// ============================================================================
// OutboundMessage Models
// ============================================================================

/// Message delivery status. Transitions run strictly forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Replied,
    Failed,
    Bounced,
}

impl MessageStatus {
    /// Forward-transition guard. Delivery webhooks and the cadence engine
    /// both go through this check so a late `delivered` event can never
    /// clobber a `replied` or `bounced` message.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        match self {
            Pending => matches!(next, Sent | Failed),
            Sent => matches!(next, Delivered | Read | Replied | Bounced | Failed),
            Delivered => matches!(next, Read | Replied | Bounced),
            Read => matches!(next, Replied | Bounced),
            Replied | Failed | Bounced => false,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Replied => "replied",
            MessageStatus::Failed => "failed",
            MessageStatus::Bounced => "bounced",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "replied" => Ok(MessageStatus::Replied),
            "failed" => Ok(MessageStatus::Failed),
            "bounced" => Ok(MessageStatus::Bounced),
            _ => Err(format!("Invalid message status: {}", s)),
        }
    }
}

impl TryFrom<String> for MessageStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// One outbound message per (lead, channel, sequence). Created when
/// enrichment finishes generating cadence content; mutated by the cadence
/// engine on send and by inbound delivery webhooks afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub lead_id: Uuid,
    #[sqlx(try_from = "String")]
    pub channel: Channel,
    pub sequence_number: i16,
    #[sqlx(try_from = "String")]
    pub status: MessageStatus,
    pub subject: Option<String>,
    pub body: String,
    pub destination: Option<String>,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Create a new pending message for a cadence step.
    pub fn new_pending(
        lead_id: Uuid,
        channel: Channel,
        sequence_number: i16,
        subject: Option<String>,
        body: String,
        destination: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            channel,
            sequence_number,
            status: MessageStatus::Pending,
            subject,
            body,
            destination,
            provider_message_id: None,
            error: None,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            replied_at: None,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Send Log & Settings
// ============================================================================

/// Durable throttle record, one per (user, channel). `next_allowed_at` is
/// always >= `last_sent_at`; the engine never sends before it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChannelSendLog {
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub channel: Channel,
    pub last_sent_at: DateTime<Utc>,
    pub next_allowed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user cadence configuration: daily limits and business-hour bounds
/// per channel. Read-only to the scheduler; managed elsewhere.
///
/// A NULL (or non-positive) WhatsApp daily limit disables the WhatsApp
/// channel entirely; it does not fall back to the email limit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CadenceSettings {
    pub user_id: Uuid,
    pub email_daily_limit: i32,
    pub whatsapp_daily_limit: Option<i32>,
    pub email_hour_start: i32,
    pub email_hour_end: i32,
    pub whatsapp_hour_start: i32,
    pub whatsapp_hour_end: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-step sent-today counts for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
    pub seq1: i64,
    pub seq2: i64,
    pub seq3: i64,
}

impl StepCounts {
    pub fn total(&self) -> i64 {
        self.seq1 + self.seq2 + self.seq3
    }

    pub fn get(&self, sequence: i16) -> i64 {
        match sequence {
            1 => self.seq1,
            2 => self.seq2,
            3 => self.seq3,
            _ => 0,
        }
    }

    pub fn record(&mut self, sequence: i16) {
        match sequence {
            1 => self.seq1 += 1,
            2 => self.seq2 += 1,
            3 => self.seq3 += 1,
            _ => {}
        }
    }
}

// ============================================================================
// Delivery Events
// ============================================================================

/// Inbound delivery webhook event kinds, as reported by the providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventKind {
    Sent,
    Delivered,
    #[serde(alias = "read")]
    Opened,
    Replied,
    Bounced,
    #[serde(alias = "opted_out")]
    Complained,
}

/// An inbound delivery event, keyed by the provider's message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub provider_message_id: String,
    pub event: DeliveryEventKind,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}
