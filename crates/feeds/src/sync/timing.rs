//! Auto-sync interval checks
//!
//! Pure functions so the metadata refresh decision can be tested without a
//! clock-driven worker.

use chrono::{DateTime, Utc};

/// Whether at least `interval_secs` have passed since `last_sync_at`
///
/// A feed list that was never refreshed is always due.
pub fn cooldown_elapsed(last_sync_at: Option<DateTime<Utc>>, interval_secs: u64) -> bool {
    seconds_until_due(last_sync_at, interval_secs) == 0
}

/// Seconds left before the next automatic metadata refresh
pub fn seconds_until_due(last_sync_at: Option<DateTime<Utc>>, interval_secs: u64) -> u64 {
    let Some(last) = last_sync_at else {
        return 0;
    };
    let elapsed = (Utc::now() - last).num_seconds().max(0) as u64;
    interval_secs.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_never_synced_is_due() {
        assert!(cooldown_elapsed(None, 900));
        assert_eq!(seconds_until_due(None, 900), 0);
    }

    #[test]
    fn test_recent_refresh_not_due() {
        let last = Utc::now() - Duration::seconds(60);
        assert!(!cooldown_elapsed(Some(last), 900));
        let left = seconds_until_due(Some(last), 900);
        assert!(left > 800 && left <= 840);
    }

    #[test]
    fn test_old_refresh_due() {
        let last = Utc::now() - Duration::minutes(20);
        assert!(cooldown_elapsed(Some(last), 900));

        // Exactly at the boundary counts as due
        let last = Utc::now() - Duration::seconds(900);
        assert!(cooldown_elapsed(Some(last), 900));
    }

    #[test]
    fn test_zero_interval_always_due() {
        assert!(cooldown_elapsed(Some(Utc::now()), 0));
    }
}
