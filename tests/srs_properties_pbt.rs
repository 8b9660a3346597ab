//! Property-Based Tests for SM-2 scheduling and streak counting
//!
//! Tests the following invariants:
//! - Ease factor never drops below 1.3
//! - Failing answers reset repetitions and interval
//! - Passing answers follow the 1 -> 6 -> round(interval * EF) ladder
//! - next_review_at is always now + interval days
//! - Streak count only grows by one per consecutive day

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use danci_core::storage::{DAY_MS, MIN_EASE_FACTOR};
use danci_core::streak::next_streak;
use danci_core::{sm2_step, SrsRecord, StreakState};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_quality() -> impl Strategy<Value = i32> {
    1i32..=5i32
}

fn arb_record() -> impl Strategy<Value = SrsRecord> {
    (
        1u32..=365u32,                                  // interval
        (130u32..=350u32).prop_map(|v| v as f64 / 100.0), // ease_factor
        0u32..=20u32,                                   // repetitions
        0i64..=4_000_000_000_000i64,                    // next_review_at
    )
        .prop_map(|(interval, ease_factor, repetitions, next_review_at)| SrsRecord {
            item_id: "w".to_string(),
            next_review_at,
            interval,
            ease_factor,
            repetitions,
        })
}

fn arb_now() -> impl Strategy<Value = i64> {
    0i64..=4_000_000_000_000i64
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..=20_000i64).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(offset)
    })
}

// ============================================================================
// SM-2
// ============================================================================

proptest! {
    #[test]
    fn prop_ease_factor_has_floor(record in arb_record(), quality in arb_quality(), now in arb_now()) {
        let next = sm2_step(&record, quality, now);
        prop_assert!(next.ease_factor >= MIN_EASE_FACTOR);
    }

    #[test]
    fn prop_next_review_is_interval_days_ahead(record in arb_record(), quality in arb_quality(), now in arb_now()) {
        let next = sm2_step(&record, quality, now);
        prop_assert_eq!(next.next_review_at, now + next.interval as i64 * DAY_MS);
        prop_assert!(next.interval >= 1);
    }

    #[test]
    fn prop_failing_answer_resets(record in arb_record(), quality in 1i32..=2i32, now in arb_now()) {
        let next = sm2_step(&record, quality, now);
        prop_assert_eq!(next.repetitions, 0);
        prop_assert_eq!(next.interval, 1);
        prop_assert!(next.ease_factor <= record.ease_factor);
    }

    #[test]
    fn prop_passing_answer_follows_ladder(record in arb_record(), quality in 3i32..=5i32, now in arb_now()) {
        let next = sm2_step(&record, quality, now);
        prop_assert_eq!(next.repetitions, record.repetitions + 1);

        let expected = match record.repetitions {
            0 => 1,
            1 => 6,
            _ => (record.interval as f64 * record.ease_factor).round() as u32,
        };
        prop_assert_eq!(next.interval, expected);
    }

    #[test]
    fn prop_perfect_answer_raises_ease(record in arb_record(), now in arb_now()) {
        let next = sm2_step(&record, 5, now);
        prop_assert!((next.ease_factor - (record.ease_factor + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn prop_item_id_is_preserved(record in arb_record(), quality in arb_quality(), now in arb_now()) {
        let next = sm2_step(&record, quality, now);
        prop_assert_eq!(next.item_id, record.item_id);
    }
}

// ============================================================================
// Streak
// ============================================================================

proptest! {
    #[test]
    fn prop_same_day_is_noop(count in 1u32..=1000u32, today in arb_date()) {
        let state = StreakState {
            streak_count: count,
            last_activity_date: Some(today),
            last_sync_at: None,
        };
        prop_assert_eq!(next_streak(&state, today), None);
    }

    #[test]
    fn prop_consecutive_day_increments(count in 0u32..=1000u32, last in arb_date()) {
        let state = StreakState {
            streak_count: count,
            last_activity_date: Some(last),
            last_sync_at: None,
        };
        prop_assert_eq!(next_streak(&state, last + Duration::days(1)), Some(count + 1));
    }

    #[test]
    fn prop_gap_or_backward_resets(count in 0u32..=1000u32, last in arb_date(), gap in 2i64..=400i64, backward in any::<bool>()) {
        let state = StreakState {
            streak_count: count,
            last_activity_date: Some(last),
            last_sync_at: None,
        };
        let today = if backward { last - Duration::days(gap) } else { last + Duration::days(gap) };
        prop_assert_eq!(next_streak(&state, today), Some(1));
    }
}

#[test]
fn test_first_activity_starts_streak() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    assert_eq!(next_streak(&StreakState::default(), today), Some(1));
}
