//! Counter-to-rate normalization.
//!
//! Kernel and hardware counters are cumulative: bytes since boot, ticks since
//! boot, operations since boot. Differencing two observations of such a
//! counter has two failure modes that must never reach consumers: a counter
//! that reset or wrapped would produce a huge bogus delta, and a degenerate
//! elapsed interval would divide by zero. Both are absorbed here.

/// Convert two observations of a cumulative counter into a per-second rate.
///
/// Returns 0 whenever `current <= previous`: a counter that did not advance
/// has either stalled, reset, or wrapped, and the only honest rate for that
/// interval is zero. An `elapsed_secs` of zero or less is treated as one
/// second so a clock anomaly degrades the rate instead of dividing by zero.
/// The result is floored.
pub fn per_second(current: u64, previous: u64, elapsed_secs: f64) -> u64 {
    if current <= previous {
        return 0;
    }
    let elapsed = if elapsed_secs <= 0.0 { 1.0 } else { elapsed_secs };
    ((current - previous) as f64 / elapsed) as u64
}

/// Saturating counter delta: 0 when the counter moved backwards.
pub fn delta(current: u64, previous: u64) -> u64 {
    current.saturating_sub(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counter_progress_becomes_rate() {
        assert_eq!(per_second(1_000, 400, 2.0), 300);
    }

    #[test]
    fn reset_or_wraparound_yields_zero() {
        assert_eq!(per_second(100, 200, 1.0), 0);
        assert_eq!(per_second(0, u64::MAX, 1.0), 0);
    }

    #[test]
    fn equal_counters_yield_zero() {
        assert_eq!(per_second(500, 500, 1.0), 0);
    }

    #[test]
    fn degenerate_elapsed_treated_as_one_second() {
        assert_eq!(per_second(700, 200, 0.0), 500);
        assert_eq!(per_second(700, 200, -3.0), 500);
    }

    #[test]
    fn fractional_result_floors() {
        assert_eq!(per_second(10, 0, 3.0), 3);
    }

    #[test]
    fn delta_saturates_on_backwards_counter() {
        assert_eq!(delta(5, 10), 0);
        assert_eq!(delta(10, 5), 5);
    }

    proptest! {
        #[test]
        fn rate_zero_whenever_counter_not_above_previous(
            a in any::<u64>(),
            b in any::<u64>(),
            t in 0.001f64..3600.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert_eq!(per_second(low, high, t), 0);
        }

        #[test]
        fn rate_never_exceeds_delta_for_intervals_of_a_second_or_more(
            c in 0u64..(1 << 53),
            p in 0u64..(1 << 53),
            t in 1.0f64..3600.0,
        ) {
            prop_assert!(per_second(c, p, t) <= c.saturating_sub(p));
        }

        #[test]
        fn rate_non_increasing_as_elapsed_grows(
            p in 0u64..1_000_000,
            d in 1u64..1_000_000,
            t in 0.001f64..100.0,
        ) {
            let c = p + d;
            prop_assert!(per_second(c, p, t * 2.0) <= per_second(c, p, t));
        }
    }
}
