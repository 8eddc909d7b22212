// Cadence engine: the per-tick orchestrator.
//
// One invocation per channel, externally triggered. Every tick
// reconstructs intent from persisted state, sends at most one message,
// and writes at most one message status, one lead status, and one
// send-log upsert.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::balancer;
use super::budget;
use super::eligibility::{self, Eligibility, StepDelays};
use super::store::CadenceStore;
use super::window;
use crate::channel::ChannelAdapter;
use crate::config::CadenceConfig;
use crate::errors::CadenceError;
use crate::lock::{channel_resource, DistributedLock};
use crate::telemetry;

/// Engine tunables, derived from application configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub delays: StepDelays,
    pub lock_ttl: Duration,
}

impl EngineConfig {
    pub fn from_settings(config: &CadenceConfig) -> Self {
        Self {
            timezone: config.timezone,
            delays: StepDelays {
                step2_days: config.step2_delay_days,
                step3_days: config.step3_delay_days,
            },
            lock_ttl: Duration::from_secs(config.lock_ttl_seconds),
        }
    }
}

/// Terminal outcome of one tick. Everything except `Sent` and `Failed` is
/// a no-op; no cross-tick memory exists beyond the persisted records.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Another invocation of this channel holds the tick lock.
    Busy,
    /// The channel's daily cap is exhausted (or the channel is disabled).
    LimitReached { sent_today: i64, daily_limit: i32 },
    /// The minimum inter-send spacing has not elapsed.
    WaitingWindow { next_allowed_at: DateTime<Utc> },
    /// No pending message exists for the balanced step.
    NoPending { sequence: i16 },
    /// A candidate exists but is not ready; it stays PENDING.
    SkippedNotReady { sequence: i16, reason: String },
    /// One message was sent and persisted.
    Sent { message_id: Uuid, sequence: i16 },
    /// The candidate was marked FAILED (transport error or unusable).
    Failed { message_id: Uuid, error: String },
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Busy => "busy",
            TickOutcome::LimitReached { .. } => "limit_reached",
            TickOutcome::WaitingWindow { .. } => "waiting_window",
            TickOutcome::NoPending { .. } => "no_pending",
            TickOutcome::SkippedNotReady { .. } => "skipped_not_ready",
            TickOutcome::Sent { .. } => "sent",
            TickOutcome::Failed { .. } => "failed",
        }
    }
}

/// One engine instance per channel, sharing the generic tick state machine
/// and delegating channel specifics to the adapter.
pub struct CadenceEngine {
    config: EngineConfig,
    store: Arc<dyn CadenceStore>,
    lock: Arc<dyn DistributedLock>,
    adapter: Arc<dyn ChannelAdapter>,
}

impl CadenceEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CadenceStore>,
        lock: Arc<dyn DistributedLock>,
        adapter: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            config,
            store,
            lock,
            adapter,
        }
    }

    pub fn channel(&self) -> crate::models::Channel {
        self.adapter.channel()
    }

    /// Run one tick at the current time.
    pub async fn run_tick(&self) -> Result<TickOutcome, CadenceError> {
        self.run_tick_at(Utc::now()).await
    }

    /// Run one tick at an explicit instant.
    #[instrument(skip(self), fields(channel = %self.adapter.channel()))]
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, CadenceError> {
        let channel = self.adapter.channel();
        let result = self.tick_inner(now).await;

        match &result {
            Ok(outcome) => {
                telemetry::record_tick_outcome(channel, outcome.label());
                info!(channel = %channel, outcome = outcome.label(), "Tick completed");
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Tick failed");
            }
        }

        result
    }

    async fn tick_inner(&self, now: DateTime<Utc>) -> Result<TickOutcome, CadenceError> {
        let channel = self.adapter.channel();
        let tz = self.config.timezone;

        // Serialize the read-decide-write sequence per channel. Without
        // this, two overlapping ticks could both pass the budget and
        // spacing checks before either writes.
        let resource = channel_resource(channel);
        let Some(_lease) = self.lock.try_acquire(&resource, self.config.lock_ttl).await? else {
            warn!(channel = %channel, "Tick lock already held, skipping");
            return Ok(TickOutcome::Busy);
        };

        // Misconfiguration is fatal for the tick; the next trigger retries
        let settings = self
            .store
            .load_settings()
            .await?
            .ok_or(CadenceError::MissingSettings)?;

        let daily_limit = self.adapter.daily_limit(&settings);
        let hours = self.adapter.business_hours(&settings);
        if daily_limit > 0 && !hours.is_valid() {
            return Err(CadenceError::InvalidBusinessHours {
                start: hours.start_hour,
                end: hours.end_hour,
            });
        }

        let (day_start, day_end) = budget::local_day_bounds(now, tz);
        let counts = self.store.sent_counts(channel, day_start, day_end).await?;
        if !budget::can_send_more_today(counts.total(), daily_limit) {
            return Ok(TickOutcome::LimitReached {
                sent_today: counts.total(),
                daily_limit,
            });
        }

        if let Some(send_log) = self.store.load_send_log(channel).await? {
            if !budget::can_send_now(now, Some(send_log.next_allowed_at)) {
                return Ok(TickOutcome::WaitingWindow {
                    next_allowed_at: send_log.next_allowed_at,
                });
            }
        }

        let sequence = balancer::next_sequence(&counts, daily_limit);

        let Some(candidate) = self.store.next_pending(channel, sequence).await? else {
            return Ok(TickOutcome::NoPending { sequence });
        };
        let message = &candidate.message;
        let lead = &candidate.lead;

        let previous_sent_at = if message.sequence_number > 1 {
            self.store
                .previous_step_sent_at(lead.id, channel, message.sequence_number)
                .await?
        } else {
            None
        };

        // Prefer the destination captured on the message; fall back to the
        // lead's current contact field
        let destination = message
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.adapter.destination(lead));

        match eligibility::evaluate(
            message,
            lead,
            previous_sent_at,
            destination.as_deref(),
            now,
            tz,
            &hours,
            &self.config.delays,
        ) {
            Eligibility::NotReady(reason) => {
                // At most one send attempt per tick: no second candidate
                Ok(TickOutcome::SkippedNotReady {
                    sequence,
                    reason: reason.to_string(),
                })
            }
            Eligibility::Unsendable(reason) => {
                self.store.mark_failed(message.id, &reason).await?;
                telemetry::record_send_failed(channel);
                warn!(
                    channel = %channel,
                    message_id = %message.id,
                    reason = %reason,
                    "Message unusable, marked failed"
                );
                Ok(TickOutcome::Failed {
                    message_id: message.id,
                    error: reason,
                })
            }
            Eligibility::Ready => {
                // Ready implies a non-empty destination
                let dest = destination.unwrap_or_default();
                self.dispatch(&settings.user_id, message, &dest, daily_limit, &hours, now)
                    .await
            }
        }
    }

    /// Invoke the transport and persist the resulting state transitions.
    async fn dispatch(
        &self,
        user_id: &Uuid,
        message: &crate::models::OutboundMessage,
        destination: &str,
        daily_limit: i32,
        hours: &window::BusinessHours,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, CadenceError> {
        let channel = self.adapter.channel();

        match self.adapter.send(destination, message).await {
            Ok(receipt) => {
                self.store
                    .mark_sent(message.id, &receipt.provider_message_id, now)
                    .await?;

                let lead_status = self.adapter.lead_status_for_step(message.sequence_number);
                self.store
                    .advance_lead_status(message.lead_id, lead_status)
                    .await?;

                if let Some(next_allowed_at) =
                    window::next_allowed_send_time(now, self.config.timezone, hours, daily_limit)
                {
                    self.store
                        .upsert_send_log(*user_id, channel, now, next_allowed_at)
                        .await?;
                }

                telemetry::record_message_sent(channel, message.sequence_number);
                info!(
                    channel = %channel,
                    message_id = %message.id,
                    sequence = message.sequence_number,
                    provider_message_id = %receipt.provider_message_id,
                    "Message sent"
                );
                Ok(TickOutcome::Sent {
                    message_id: message.id,
                    sequence: message.sequence_number,
                })
            }
            Err(e) => {
                // Terminal for this message only; the tick itself succeeds
                let error_text = e.to_string();
                self.store.mark_failed(message.id, &error_text).await?;
                telemetry::record_send_failed(channel);
                warn!(
                    channel = %channel,
                    message_id = %message.id,
                    error = %error_text,
                    "Transport send failed, message marked failed"
                );
                Ok(TickOutcome::Failed {
                    message_id: message.id,
                    error: error_text,
                })
            }
        }
    }
}
