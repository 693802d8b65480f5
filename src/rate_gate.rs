use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_INTERVAL_MINUTES: i64 = 10;
pub const DEFAULT_DAILY_POST_CAP: u32 = 30;

/// Snapshot of the gate's mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateState {
    pub last_post_time: Option<DateTime<Utc>>,
    pub daily_count: u32,
    pub daily_reset_date: NaiveDate,
}

/// Admission control for publishing: a minimum gap between posts plus a
/// per-day cap (UTC calendar days).
/// - First post always allowed (if the cap is non-zero).
/// - State changes only through `record_post*`, after a confirmed publish.
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    daily_post_cap: u32,
    state: RateState,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL_MINUTES, DEFAULT_DAILY_POST_CAP)
    }
}

impl RateGate {
    /// `min_interval_minutes` < 0 is treated as 0 (no spacing).
    pub fn new(min_interval_minutes: i64, daily_post_cap: u32) -> Self {
        Self::starting_at(min_interval_minutes, daily_post_cap, Utc::now())
    }

    pub fn starting_at(min_interval_minutes: i64, daily_post_cap: u32, now: DateTime<Utc>) -> Self {
        Self {
            min_interval: Duration::minutes(min_interval_minutes.max(0)),
            daily_post_cap,
            state: RateState {
                last_post_time: None,
                daily_count: 0,
                daily_reset_date: now.date_naive(),
            },
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn daily_post_cap(&self) -> u32 {
        self.daily_post_cap
    }

    pub fn state(&self) -> &RateState {
        &self.state
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today > self.state.daily_reset_date {
            tracing::info!(
                previous = self.state.daily_count,
                date = %today,
                "daily post count reset"
            );
            self.state.daily_count = 0;
            self.state.daily_reset_date = today;
        }
    }

    pub fn can_post_now(&mut self) -> bool {
        self.can_post_at(Utc::now())
    }

    /// Check whether a post may go out at `now`. Only the date rollover
    /// mutates state here.
    pub fn can_post_at(&mut self, now: DateTime<Utc>) -> bool {
        self.roll_over(now);

        if self.state.daily_count >= self.daily_post_cap {
            tracing::debug!(daily_count = self.state.daily_count, "daily post cap reached");
            return false;
        }
        match self.state.last_post_time {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.min_interval,
        }
    }

    /// Earliest time the interval rule allows another post. Ignores the cap.
    pub fn next_allowed_at(&self) -> Option<DateTime<Utc>> {
        self.state.last_post_time.map(|t| t + self.min_interval)
    }

    pub fn record_post(&mut self) {
        self.record_post_at(Utc::now());
    }

    /// Charge one post at `now`. Call only after the publisher confirmed.
    pub fn record_post_at(&mut self, now: DateTime<Utc>) {
        self.roll_over(now);
        self.state.daily_count = self.state.daily_count.saturating_add(1);
        self.state.last_post_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn first_post_passes() {
        let mut g = RateGate::starting_at(10, 30, t0());
        assert!(g.can_post_at(t0()));
    }

    #[test]
    fn inside_interval_blocked() {
        let mut g = RateGate::starting_at(10, 30, t0());
        g.record_post_at(t0());
        assert!(!g.can_post_at(t0() + Duration::minutes(5)));
        assert!(g.can_post_at(t0() + Duration::minutes(10)));
    }

    #[test]
    fn zero_cap_never_posts() {
        let mut g = RateGate::starting_at(0, 0, t0());
        assert!(!g.can_post_at(t0()));
    }

    #[test]
    fn next_allowed_tracks_last_post() {
        let mut g = RateGate::starting_at(15, 30, t0());
        assert_eq!(g.next_allowed_at(), None);
        g.record_post_at(t0());
        assert_eq!(g.next_allowed_at(), Some(t0() + Duration::minutes(15)));
    }

    #[test]
    fn record_after_midnight_starts_new_day() {
        let mut g = RateGate::starting_at(0, 5, t0());
        g.record_post_at(t0());
        g.record_post_at(t0());
        g.record_post_at(t0() + Duration::days(1));
        assert_eq!(g.state().daily_count, 1);
        assert_eq!(
            g.state().daily_reset_date,
            (t0() + Duration::days(1)).date_naive()
        );
    }
}
