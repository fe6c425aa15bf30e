//! Per-core CPU percentage derivation.

use crate::probe::CoreTicks;
use crate::rate;
use crate::snapshot::CpuCoreSample;

/// Derive per-core percentages from two tick observations.
///
/// Returns one sample per core in `current`. Cores without a previous
/// observation to diff against (a grown core count, or an empty baseline)
/// get a neutral sample this tick. `prior` supplies the published sample to
/// retain for any core whose counters did not advance at all, so a stalled
/// counter never turns into a divide-by-zero or a fake 0%.
pub fn derive_cores(
    previous: &[CoreTicks],
    current: &[CoreTicks],
    prior: &[CpuCoreSample],
) -> Vec<CpuCoreSample> {
    let aligned = previous.len().min(current.len());
    current
        .iter()
        .enumerate()
        .map(|(idx, ticks)| {
            if idx < aligned {
                derive_one(&previous[idx], ticks, prior.get(idx))
            } else {
                CpuCoreSample::default()
            }
        })
        .collect()
}

fn derive_one(
    previous: &CoreTicks,
    current: &CoreTicks,
    prior: Option<&CpuCoreSample>,
) -> CpuCoreSample {
    let d_user = rate::delta(current.user, previous.user);
    let d_system = rate::delta(current.system, previous.system);
    let d_idle = rate::delta(current.idle, previous.idle);
    let d_nice = rate::delta(current.nice, previous.nice);
    // Each delta can reach u64::MAX on its own, so summing four of them
    // in u64 can overflow. Widen so the bucket shares stay exact.
    let d_total = d_user as u128 + d_system as u128 + d_idle as u128 + d_nice as u128;
    if d_total == 0 {
        return prior.copied().unwrap_or_default();
    }

    let total = d_total as f64;
    let used = d_user as u128 + d_system as u128 + d_nice as u128;
    CpuCoreSample {
        user_pct: 100.0 * d_user as f64 / total,
        system_pct: 100.0 * d_system as f64 / total,
        idle_pct: 100.0 * d_idle as f64 / total,
        total_pct: 100.0 * used as f64 / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ticks(user: u64, system: u64, idle: u64, nice: u64) -> CoreTicks {
        CoreTicks {
            user,
            system,
            idle,
            nice,
        }
    }

    #[test]
    fn percentages_follow_tick_deltas() {
        let previous = [ticks(100, 100, 100, 0)];
        let current = [ticks(130, 120, 150, 0)];

        let cores = derive_cores(&previous, &current, &[]);
        assert_eq!(cores.len(), 1);
        let core = cores[0];
        assert!((core.user_pct - 30.0).abs() < 1e-9);
        assert!((core.system_pct - 20.0).abs() < 1e-9);
        assert!((core.idle_pct - 50.0).abs() < 1e-9);
        assert!((core.total_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn nice_ticks_count_toward_total_only() {
        let previous = [ticks(0, 0, 0, 0)];
        let current = [ticks(10, 10, 60, 20)];

        let core = derive_cores(&previous, &current, &[])[0];
        assert!((core.user_pct - 10.0).abs() < 1e-9);
        assert!((core.system_pct - 10.0).abs() < 1e-9);
        assert!((core.idle_pct - 60.0).abs() < 1e-9);
        assert!((core.total_pct - 40.0).abs() < 1e-9);
    }

    #[test]
    fn stalled_counters_keep_the_prior_sample() {
        let unchanged = [ticks(500, 500, 500, 0)];
        let prior = [CpuCoreSample {
            user_pct: 33.0,
            system_pct: 17.0,
            idle_pct: 50.0,
            total_pct: 50.0,
        }];

        let cores = derive_cores(&unchanged, &unchanged, &prior);
        assert_eq!(cores[0], prior[0]);

        // With no prior either, the sample is neutral rather than NaN.
        let cores = derive_cores(&unchanged, &unchanged, &[]);
        assert_eq!(cores[0], CpuCoreSample::default());
    }

    #[test]
    fn grown_core_count_publishes_neutral_new_cores() {
        let previous = [ticks(0, 0, 0, 0)];
        let current = [ticks(50, 0, 50, 0), ticks(900, 0, 100, 0)];

        let cores = derive_cores(&previous, &current, &[]);
        assert_eq!(cores.len(), 2);
        assert!((cores[0].user_pct - 50.0).abs() < 1e-9);
        // The new core has no baseline; guessing from absolute counters
        // would fabricate a 90% reading here.
        assert_eq!(cores[1], CpuCoreSample::default());
    }

    #[test]
    fn shrunk_core_count_keeps_aligned_prefix() {
        let previous = [ticks(0, 0, 0, 0), ticks(0, 0, 0, 0)];
        let current = [ticks(25, 25, 50, 0)];

        let cores = derive_cores(&previous, &current, &[]);
        assert_eq!(cores.len(), 1);
        assert!((cores[0].total_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn backwards_ticks_are_treated_as_no_progress() {
        let previous = [ticks(100, 100, 100, 0)];
        let current = [ticks(50, 50, 50, 0)];

        let cores = derive_cores(&previous, &current, &[]);
        assert_eq!(cores[0], CpuCoreSample::default());
    }

    #[test]
    fn maximal_tick_deltas_keep_percentages_in_range() {
        // Two buckets jumping the full u64 range would wrap a 64-bit total.
        let previous = [ticks(0, 0, 0, 0)];
        let current = [ticks(u64::MAX, u64::MAX, 0, 0)];

        let core = derive_cores(&previous, &current, &[])[0];
        assert!((core.user_pct - 50.0).abs() < 1e-6);
        assert!((core.system_pct - 50.0).abs() < 1e-6);
        assert!(core.idle_pct.abs() < 1e-6);
        assert!((core.total_pct - 100.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn percentages_sum_to_one_hundred_when_ticks_advance(
            base in proptest::array::uniform4(0u64..1_000_000),
            delta in proptest::array::uniform4(0u64..100_000),
        ) {
            prop_assume!(delta.iter().sum::<u64>() > 0);
            let previous = [ticks(base[0], base[1], base[2], base[3])];
            let current = [ticks(
                base[0] + delta[0],
                base[1] + delta[1],
                base[2] + delta[2],
                base[3] + delta[3],
            )];

            let core = derive_cores(&previous, &current, &[])[0];
            let sum = core.user_pct + core.system_pct + core.idle_pct;
            // nice share is in neither user nor system but is part of the
            // bucket total, so user+system+idle can fall short by exactly
            // the nice share.
            let nice_share = 100.0 * delta[3] as f64 / delta.iter().sum::<u64>() as f64;
            prop_assert!((sum + nice_share - 100.0).abs() < 1e-6);
            prop_assert!((core.total_pct - (100.0 - core.idle_pct)).abs() < 1e-6);
        }

        #[test]
        fn percentages_stay_bounded_for_any_counter_pair(
            prev in proptest::array::uniform4(any::<u64>()),
            cur in proptest::array::uniform4(any::<u64>()),
        ) {
            let previous = [ticks(prev[0], prev[1], prev[2], prev[3])];
            let current = [ticks(cur[0], cur[1], cur[2], cur[3])];

            let core = derive_cores(&previous, &current, &[])[0];
            if cur.iter().zip(prev.iter()).any(|(c, p)| c > p) {
                for pct in [core.user_pct, core.system_pct, core.idle_pct, core.total_pct] {
                    prop_assert!(pct.is_finite());
                    prop_assert!((0.0..=100.0).contains(&pct));
                }
                prop_assert!((core.total_pct - (100.0 - core.idle_pct)).abs() < 1e-6);
            } else {
                prop_assert_eq!(core, CpuCoreSample::default());
            }
        }
    }
}
