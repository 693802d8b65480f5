// tests/rate_gate.rs
use chrono::{Duration, TimeZone, Utc};
use football_news_relay::rate_gate::RateGate;

#[test]
fn interval_blocks_then_allows() {
    let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
    let mut gate = RateGate::starting_at(10, 30, t0);

    assert!(gate.can_post_at(t0));
    gate.record_post_at(t0);

    assert!(!gate.can_post_at(t0 + Duration::minutes(5)));
    assert!(gate.can_post_at(t0 + Duration::minutes(10)));
    assert!(gate.can_post_at(t0 + Duration::minutes(11)));
    assert_eq!(gate.next_allowed_at(), Some(t0 + Duration::minutes(10)));
}

#[test]
fn daily_cap_holds_until_utc_midnight() {
    let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 20, 0, 0).unwrap();
    let mut gate = RateGate::starting_at(0, 3, t0);

    for i in 0..3 {
        let at = t0 + Duration::minutes(i);
        assert!(gate.can_post_at(at));
        gate.record_post_at(at);
    }
    assert!(!gate.can_post_at(t0 + Duration::hours(3)));
    assert_eq!(gate.state().daily_count, 3);

    let next_day = Utc.with_ymd_and_hms(2025, 9, 7, 0, 0, 1).unwrap();
    assert!(gate.can_post_at(next_day));
    assert_eq!(gate.state().daily_count, 0);
    assert_eq!(gate.state().daily_reset_date, next_day.date_naive());
}

#[test]
fn checks_alone_never_charge() {
    let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 8, 0, 0).unwrap();
    let mut gate = RateGate::starting_at(10, 1, t0);
    for _ in 0..5 {
        assert!(gate.can_post_at(t0));
    }
    assert_eq!(gate.state().daily_count, 0);
    assert!(gate.state().last_post_time.is_none());
}

#[test]
fn zero_cap_never_allows() {
    let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 8, 0, 0).unwrap();
    let mut gate = RateGate::starting_at(0, 0, t0);
    assert!(!gate.can_post_at(t0));
}
