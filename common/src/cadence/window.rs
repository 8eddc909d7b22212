// Send-window policy: business-hour checks and minimum inter-send spacing.
//
// All calendar math happens in the configured business timezone and is
// converted back to UTC instants for storage and comparison.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Local-clock hour-of-day bounds for a channel, e.g. 9..18. The window
/// covers [start_hour, end_hour); an empty or inverted window makes the
/// channel permanently ineligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl BusinessHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        self.is_valid() && hour >= self.start_hour && hour < self.end_hour
    }

    /// Window length in seconds.
    pub fn window_seconds(&self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        i64::from(self.end_hour - self.start_hour) * 3600
    }
}

/// Whether `now` falls inside the channel's business hours, evaluated on
/// the local clock of the business timezone.
pub fn is_within_business_hours(now: DateTime<Utc>, tz: Tz, hours: &BusinessHours) -> bool {
    hours.contains_hour(now.with_timezone(&tz).hour())
}

/// Minimum spacing between consecutive sends, derived from spreading
/// `daily_limit` sends evenly across the window. Returns `None` when the
/// limit is zero or negative (channel disabled) or the window is empty,
/// so the division below can never see a zero divisor.
pub fn spacing_seconds(hours: &BusinessHours, daily_limit: i32) -> Option<i64> {
    if daily_limit <= 0 {
        return None;
    }
    let window = hours.window_seconds();
    if window <= 0 {
        return None;
    }
    Some((window / i64::from(daily_limit)).max(1))
}

/// The earliest instant the next send is permitted: `now + spacing`,
/// rolled to the next window opening whenever the candidate lands outside
/// today's window. `None` means the channel is disabled.
pub fn next_allowed_send_time(
    now: DateTime<Utc>,
    tz: Tz,
    hours: &BusinessHours,
    daily_limit: i32,
) -> Option<DateTime<Utc>> {
    let spacing = spacing_seconds(hours, daily_limit)?;
    let candidate = now + Duration::seconds(spacing);

    let local = candidate.with_timezone(&tz);
    if hours.contains_hour(local.hour()) {
        return Some(candidate);
    }

    // Past the close: start of the next business day. Before the open
    // (a candidate that crossed midnight): start of that same day.
    let date = if local.hour() < hours.start_hour {
        local.date_naive()
    } else {
        local.date_naive() + Days::new(1)
    };
    let opening = date.and_time(
        NaiveTime::from_hms_opt(hours.start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
    );

    Some(resolve_local(tz, opening))
}

/// Resolve a local wall-clock time to a UTC instant, tolerating DST
/// ambiguity (earliest wins) and gaps (shift forward an hour).
pub(crate) fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => Utc.from_utc_datetime(&naive),
        },
    }
}
