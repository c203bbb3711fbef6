//! Property-based tests for the upsert rule, backoff and fetch windows.

use chrono::{Duration as ChronoDuration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

use quotesync_core::quotes::{
    decide_upsert, fetch_window, BackoffPolicy, Quote, UpsertDecision,
};

// =============================================================================
// Helpers
// =============================================================================

fn day0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Writes `incoming` over `stored` the way the store does.
fn apply(
    stored: Option<Quote>,
    incoming: &Quote,
    priorities: &HashMap<String, i32>,
) -> Option<Quote> {
    match decide_upsert(stored.as_ref(), incoming, |id| priorities.get(id).copied()) {
        UpsertDecision::Insert | UpsertDecision::Replace => Some(incoming.clone()),
        UpsertDecision::Unchanged | UpsertDecision::Reject => stored,
    }
}

fn arb_quote(source: &'static str) -> impl Strategy<Value = Quote> {
    (1i64..1_000_000).prop_map(move |cents| {
        Quote::single_value("asset-1", day0(), Decimal::new(cents, 2), "VND", source)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The row kept for a date comes from the preferred source whatever the
    /// write order.
    #[test]
    fn prop_preferred_source_wins_in_any_order(
        a in arb_quote("VN_MARKET"),
        b in arb_quote("YAHOO"),
        pa in 0i32..50,
        pb in 50i32..100,
        a_known in any::<bool>(),
    ) {
        let mut priorities = HashMap::from([("YAHOO".to_string(), pb)]);
        if a_known {
            priorities.insert("VN_MARKET".to_string(), pa);
        }
        let winner = if a_known { &a } else { &b };

        let ab = apply(apply(None, &a, &priorities), &b, &priorities);
        let ba = apply(apply(None, &b, &priorities), &a, &priorities);
        prop_assert_eq!(ab.as_ref(), Some(winner));
        prop_assert_eq!(ba.as_ref(), Some(winner));
    }

    /// Writing the same batch twice leaves the first result in place.
    #[test]
    fn prop_rewrite_is_unchanged(q in arb_quote("YAHOO")) {
        let priorities = HashMap::from([("YAHOO".to_string(), 2)]);
        let stored = apply(None, &q, &priorities);
        prop_assert_eq!(
            decide_upsert(stored.as_ref(), &q, |id| priorities.get(id).copied()),
            UpsertDecision::Unchanged
        );
    }

    /// Delays never shrink as failures accumulate and never pass the cap
    /// plus jitter.
    #[test]
    fn prop_backoff_is_monotonic_and_capped(
        base_secs in 1u64..600,
        cap_secs in 600u64..200_000,
        failures in 0i32..64,
    ) {
        let policy = BackoffPolicy {
            base: Duration::from_secs(base_secs),
            cap: Duration::from_secs(cap_secs),
            jitter_ratio: 0.1,
            degraded_threshold: 5,
        };
        let current = policy.delay(failures);
        prop_assert!(policy.delay(failures + 1) >= current);
        prop_assert!(current <= policy.cap);

        let jittered = policy.delay_with_jitter(failures);
        prop_assert!(jittered >= current);
        prop_assert!(jittered <= current + current / 10 + Duration::from_millis(1));
    }

    /// The window starts right after the last synced day, respects the
    /// lookback and never extends past today.
    #[test]
    fn prop_fetch_window_bounds(
        last_offset in proptest::option::of(0i64..400),
        lookback in proptest::option::of(1i64..400),
        default_days in 1i64..730,
    ) {
        let today = day0() + ChronoDuration::days(400);
        let last = last_offset.map(|o| day0() + ChronoDuration::days(o));

        match fetch_window(last, today, default_days, lookback) {
            Some((start, end)) => {
                prop_assert_eq!(end, today);
                prop_assert!(start <= end);
                if let Some(last) = last {
                    prop_assert!(start > last);
                }
                if let Some(lookback) = lookback {
                    prop_assert!(start >= today - ChronoDuration::days(lookback));
                }
            }
            None => prop_assert_eq!(last, Some(today)),
        }
    }
}
