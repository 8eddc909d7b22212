// Daily budget tracking: per-channel caps and the local-day boundary.

use chrono::{DateTime, Days, NaiveTime, Utc};
use chrono_tz::Tz;

use super::window::resolve_local;

/// Whether the channel may send another message today. A non-positive
/// daily limit means the channel is disabled.
pub fn can_send_more_today(sent_today: i64, daily_limit: i32) -> bool {
    daily_limit > 0 && sent_today < i64::from(daily_limit)
}

/// Whether the minimum inter-send spacing has elapsed. Vacuously true when
/// no send log exists yet (first send on the channel).
pub fn can_send_now(now: DateTime<Utc>, next_allowed_at: Option<DateTime<Utc>>) -> bool {
    match next_allowed_at {
        Some(next) => now >= next,
        None => true,
    }
}

/// The [00:00, 24:00) local calendar day containing `now`, as UTC
/// instants. "Sent today" counts are taken over this half-open interval.
pub fn local_day_bounds(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = now.with_timezone(&tz).date_naive();
    let start = resolve_local(tz, local_date.and_time(NaiveTime::MIN));
    let end = resolve_local(tz, (local_date + Days::new(1)).and_time(NaiveTime::MIN));
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_can_send_more_today() {
        assert!(can_send_more_today(0, 30));
        assert!(can_send_more_today(29, 30));
        assert!(!can_send_more_today(30, 30));
        assert!(!can_send_more_today(31, 30));
    }

    #[test]
    fn test_zero_or_negative_limit_disables_channel() {
        assert!(!can_send_more_today(0, 0));
        assert!(!can_send_more_today(0, -1));
    }

    #[test]
    fn test_can_send_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();

        assert!(can_send_now(now, None));
        assert!(can_send_now(now, Some(now)));
        assert!(can_send_now(now, Some(now - chrono::Duration::minutes(1))));
        assert!(!can_send_now(now, Some(now + chrono::Duration::seconds(1))));
    }

    #[test]
    fn test_local_day_bounds_in_business_timezone() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        // 23:30 UTC on June 3rd is already June 4th in Berlin
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 23, 30, 0).unwrap();

        let (start, end) = local_day_bounds(now, tz);
        // Berlin midnight June 4th = 22:00 UTC June 3rd
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 3, 22, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 4, 22, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }

    #[test]
    fn test_local_day_bounds_utc() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();

        let (start, end) = local_day_bounds(now, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap());
    }
}
