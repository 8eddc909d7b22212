// Per-candidate readiness check combining message state, lead state,
// step-delay gating, business hours, and destination validity.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use super::window::{self, BusinessHours};
use crate::models::{Lead, MessageStatus, OutboundMessage};

/// Minimum delays gating steps 2 and 3 behind the previous step's send
/// time. Step 1 has zero delay.
#[derive(Debug, Clone, Copy)]
pub struct StepDelays {
    pub step2_days: i64,
    pub step3_days: i64,
}

impl StepDelays {
    pub fn for_sequence(&self, sequence: i16) -> Duration {
        match sequence {
            2 => Duration::days(self.step2_days),
            3 => Duration::days(self.step3_days),
            _ => Duration::zero(),
        }
    }
}

impl Default for StepDelays {
    fn default() -> Self {
        Self {
            step2_days: 3,
            step3_days: 7,
        }
    }
}

/// Why a candidate cannot send right now. The message stays PENDING and is
/// reconsidered on a future tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyReason {
    NotPending,
    LeadStopped,
    PreviousStepUnsent,
    MinimumDelay { ready_at: DateTime<Utc> },
    OutsideBusinessHours,
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::NotPending => write!(f, "message is not pending"),
            NotReadyReason::LeadStopped => write!(f, "lead replied, opted out, or bounced"),
            NotReadyReason::PreviousStepUnsent => write!(f, "previous step has not been sent"),
            NotReadyReason::MinimumDelay { ready_at } => {
                write!(f, "minimum step delay not elapsed, ready at {}", ready_at)
            }
            NotReadyReason::OutsideBusinessHours => write!(f, "outside business hours"),
        }
    }
}

/// Outcome of the eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Send it now.
    Ready,
    /// Not now; leave the message PENDING.
    NotReady(NotReadyReason),
    /// Never sendable; the engine marks the message FAILED so it cannot
    /// loop forever.
    Unsendable(String),
}

/// Evaluate a single candidate. `previous_step_sent_at` is the send time
/// of the same lead's previous step on the same channel, when any.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    message: &OutboundMessage,
    lead: &Lead,
    previous_step_sent_at: Option<DateTime<Utc>>,
    destination: Option<&str>,
    now: DateTime<Utc>,
    tz: Tz,
    hours: &BusinessHours,
    delays: &StepDelays,
) -> Eligibility {
    if message.status != MessageStatus::Pending {
        return Eligibility::NotReady(NotReadyReason::NotPending);
    }

    // Lead-level stop state covers both channels of a hybrid cadence
    if lead.is_stopped() {
        return Eligibility::NotReady(NotReadyReason::LeadStopped);
    }

    if message.sequence_number > 1 {
        match previous_step_sent_at {
            None => return Eligibility::NotReady(NotReadyReason::PreviousStepUnsent),
            Some(sent_at) => {
                let ready_at = sent_at + delays.for_sequence(message.sequence_number);
                if now < ready_at {
                    return Eligibility::NotReady(NotReadyReason::MinimumDelay { ready_at });
                }
            }
        }
    }

    if !window::is_within_business_hours(now, tz, hours) {
        return Eligibility::NotReady(NotReadyReason::OutsideBusinessHours);
    }

    match destination {
        Some(dest) if !dest.trim().is_empty() => Eligibility::Ready,
        _ => Eligibility::Unsendable("missing destination address".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CadenceKind, Channel, LeadStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            full_name: Some("Jamie Doe".to_string()),
            company: None,
            email: Some("jamie@example.com".to_string()),
            phone: Some("+4915112345678".to_string()),
            status,
            cadence_kind: CadenceKind::Hybrid,
            replied_at: None,
            opted_out_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(sequence: i16) -> OutboundMessage {
        OutboundMessage::new_pending(
            Uuid::new_v4(),
            Channel::Email,
            sequence,
            Some("Hello".to_string()),
            "Body".to_string(),
            Some("jamie@example.com".to_string()),
        )
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    fn hours() -> BusinessHours {
        BusinessHours::new(9, 18)
    }

    #[test]
    fn test_step_one_ready_immediately() {
        let result = evaluate(
            &message(1),
            &lead(LeadStatus::Enriched),
            None,
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(result, Eligibility::Ready);
    }

    #[test]
    fn test_non_pending_message_not_ready() {
        let mut msg = message(1);
        msg.status = MessageStatus::Sent;

        let result = evaluate(
            &msg,
            &lead(LeadStatus::Email1Sent),
            None,
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(result, Eligibility::NotReady(NotReadyReason::NotPending));
    }

    #[test]
    fn test_terminal_lead_not_ready() {
        for status in [LeadStatus::Replied, LeadStatus::OptedOut, LeadStatus::Bounced] {
            let result = evaluate(
                &message(1),
                &lead(status),
                None,
                Some("jamie@example.com"),
                noon(),
                chrono_tz::UTC,
                &hours(),
                &StepDelays::default(),
            );
            assert_eq!(result, Eligibility::NotReady(NotReadyReason::LeadStopped));
        }
    }

    #[test]
    fn test_cross_channel_reply_stops_hybrid_lead() {
        // Status marker is still a step status, but the reply timestamp is
        // set: a WhatsApp reply must stop pending email steps
        let mut l = lead(LeadStatus::Whatsapp1Sent);
        l.replied_at = Some(noon() - Duration::hours(1));

        let result = evaluate(
            &message(2),
            &l,
            Some(noon() - Duration::days(10)),
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(result, Eligibility::NotReady(NotReadyReason::LeadStopped));
    }

    #[test]
    fn test_step_two_gated_behind_delay() {
        let sent_at = noon() - Duration::hours(1);

        let result = evaluate(
            &message(2),
            &lead(LeadStatus::Email1Sent),
            Some(sent_at),
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(
            result,
            Eligibility::NotReady(NotReadyReason::MinimumDelay {
                ready_at: sent_at + Duration::days(3)
            })
        );
    }

    #[test]
    fn test_step_two_ready_after_delay() {
        let result = evaluate(
            &message(2),
            &lead(LeadStatus::Email1Sent),
            Some(noon() - Duration::days(3) - Duration::hours(1)),
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(result, Eligibility::Ready);
    }

    #[test]
    fn test_step_three_uses_its_own_delay() {
        let sent_at = noon() - Duration::days(5);

        let result = evaluate(
            &message(3),
            &lead(LeadStatus::Email2Sent),
            Some(sent_at),
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(
            result,
            Eligibility::NotReady(NotReadyReason::MinimumDelay {
                ready_at: sent_at + Duration::days(7)
            })
        );
    }

    #[test]
    fn test_step_two_blocked_when_previous_unsent() {
        let result = evaluate(
            &message(2),
            &lead(LeadStatus::Enriched),
            None,
            Some("jamie@example.com"),
            noon(),
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(
            result,
            Eligibility::NotReady(NotReadyReason::PreviousStepUnsent)
        );
    }

    #[test]
    fn test_outside_business_hours_not_ready() {
        let late = Utc.with_ymd_and_hms(2024, 6, 3, 22, 0, 0).unwrap();

        let result = evaluate(
            &message(1),
            &lead(LeadStatus::Enriched),
            None,
            Some("jamie@example.com"),
            late,
            chrono_tz::UTC,
            &hours(),
            &StepDelays::default(),
        );
        assert_eq!(
            result,
            Eligibility::NotReady(NotReadyReason::OutsideBusinessHours)
        );
    }

    #[test]
    fn test_missing_destination_is_unsendable() {
        for dest in [None, Some(""), Some("   ")] {
            let result = evaluate(
                &message(1),
                &lead(LeadStatus::Enriched),
                None,
                dest,
                noon(),
                chrono_tz::UTC,
                &hours(),
                &StepDelays::default(),
            );
            assert!(matches!(result, Eligibility::Unsendable(_)));
        }
    }
}
