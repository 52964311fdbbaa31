//! Staleness policy for cached expiration dates.
//!
//! A domain far from its expiration need not be re-queried every run. One
//! within the warning window is re-verified on every run, since a renewal
//! can take a while to show up in WHOIS.

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days from `now` until `expiration`, rounded toward negative infinity.
///
/// An expiration twelve hours in the past is `-1`, not `0`.
pub fn days_remaining(expiration: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiration - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Returns true when a cached expiration is inside the warning window and
/// must be looked up again.
///
/// Exactly `warning_days` remaining is still fresh.
pub fn needs_refresh(cached: DateTime<Utc>, now: DateTime<Utc>, warning_days: i64) -> bool {
    days_remaining(cached, now) < warning_days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_remaining_floors() {
        let now = now();
        assert_eq!(days_remaining(now + Duration::days(10), now), 10);
        assert_eq!(days_remaining(now + Duration::days(10) - Duration::seconds(1), now), 9);
        assert_eq!(days_remaining(now - Duration::hours(12), now), -1);
        assert_eq!(days_remaining(now, now), 0);
    }

    #[test]
    fn test_needs_refresh_boundary() {
        let now = now();
        // exactly W days left is fresh
        assert!(!needs_refresh(now + Duration::days(15), now, 15));
        assert!(needs_refresh(now + Duration::days(15) - Duration::seconds(1), now, 15));
        assert!(needs_refresh(now + Duration::days(3), now, 15));
        assert!(!needs_refresh(now + Duration::days(300), now, 15));
    }

    #[test]
    fn test_needs_refresh_already_expired() {
        let now = now();
        assert!(needs_refresh(now - Duration::days(2), now, 15));
    }
}
