//! Capacity planning.
//!
//! CVS throttles writes per allocated GiB, so a volume of size `S` can fill
//! at most at `S * throughput`. Dynamic mode picks the allocation `N` such
//! that, writing at full speed for `duration` minutes at the throughput `N`
//! itself grants, plus `margin` percent, the volume still does not fill:
//!
//! ```text
//! N = -used / ( duration * 60 * throughput / 1024² * (1 + margin / 100) - 1 )
//! ```
//!
//! Static-margin mode ignores throughput and targets "used is
//! `100 - margin` percent of the allocation".

use tracing::debug;

use crate::error::{CapacityError, Result};
use crate::policy::{MAX_MARGIN_PERCENT, Policy, SizingMode};
use crate::tier::throughput_for;

/// One GiB in bytes.
pub const GIB: u64 = 1 << 30;

/// One TiB in bytes.
pub const TIB: u64 = 1 << 40;

/// Largest volume CVS supports.
pub const MAX_VOLUME_BYTES: u64 = 100 * TIB;

const KIB_PER_GIB: f64 = 1024.0 * 1024.0;

// Largest GiB-aligned u64, the saturation point of the rounding helpers.
const MAX_ALIGNED: u64 = u64::MAX / GIB * GIB;

fn check_margin(margin_percent: u32) -> Result<()> {
    if margin_percent > MAX_MARGIN_PERCENT {
        return Err(CapacityError::invalid_policy(format!(
            "margin must be between 0 and {MAX_MARGIN_PERCENT}, got {margin_percent}"
        )));
    }
    Ok(())
}

/// Rounds up to the next whole GiB, always adding at least one byte of
/// headroom: `(floor(bytes / GiB) + 1) * GiB`.
#[must_use]
pub const fn next_gib(bytes: u64) -> u64 {
    match (bytes / GIB + 1).checked_mul(GIB) {
        Some(rounded) => rounded,
        None => MAX_ALIGNED,
    }
}

/// Exact ceiling to a whole GiB.
#[must_use]
pub const fn ceil_gib(bytes: u64) -> u64 {
    match bytes.div_ceil(GIB).checked_mul(GIB) {
        Some(rounded) => rounded,
        None => MAX_ALIGNED,
    }
}

/// Recommended size for `used_bytes` on `tier` if the next run is
/// `duration_minutes` away, with `margin_percent` extra headroom.
///
/// # Errors
///
/// Returns [`CapacityError::CapacityModel`] if growth over the interval is
/// unbounded (the formula's denominator is not negative), and
/// [`CapacityError::InvalidPolicy`] for a margin above 99.
pub fn calculate_new_capacity(
    used_bytes: u64,
    tier: &str,
    duration_minutes: u32,
    margin_percent: u32,
) -> Result<u64> {
    check_margin(margin_percent)?;
    let throughput = f64::from(throughput_for(tier));
    let growth = f64::from(duration_minutes) * 60.0 * throughput / KIB_PER_GIB
        * (1.0 + f64::from(margin_percent) / 100.0);
    let denominator = growth - 1.0;

    if denominator >= 0.0 || !denominator.is_finite() {
        return Err(CapacityError::capacity_model(format!(
            "{tier} volumes can grow {growth:.3}x their size in {duration_minutes} minutes \
             at {margin_percent}% margin; no finite size keeps up"
        )));
    }

    let new_size = -(used_bytes as f64) / denominator;
    if !new_size.is_finite() || new_size < 0.0 {
        return Err(CapacityError::capacity_model(format!(
            "sizing formula produced {new_size} for {used_bytes} used bytes"
        )));
    }

    let rounded = next_gib(new_size.trunc() as u64);
    debug!(used_bytes, tier, duration_minutes, margin_percent, rounded, "dynamic capacity");
    Ok(rounded)
}

/// Size that leaves `margin_percent` of the allocation free.
///
/// # Errors
///
/// Returns [`CapacityError::InvalidPolicy`] for a margin of 100 or more.
pub fn static_margin_capacity(used_bytes: u64, margin_percent: u32) -> Result<u64> {
    if margin_percent >= 100 {
        return Err(CapacityError::invalid_policy(format!(
            "static margin of {margin_percent}% leaves no room for data"
        )));
    }
    check_margin(margin_percent)?;

    // Exact byte target first, so only one rounding step remains.
    let target = (u128::from(used_bytes) * 100).div_ceil(u128::from(100 - margin_percent));
    let sized = u64::try_from(target).map_or(MAX_ALIGNED, ceil_gib);
    debug!(used_bytes, margin_percent, sized, "static capacity");
    Ok(sized)
}

/// Recommended size under `policy`, dispatching on its sizing mode.
///
/// # Errors
///
/// Propagates the errors of [`calculate_new_capacity`] and
/// [`static_margin_capacity`].
pub fn plan_capacity(used_bytes: u64, tier: &str, policy: &Policy) -> Result<u64> {
    match policy.mode() {
        SizingMode::StaticMargin => static_margin_capacity(used_bytes, policy.margin_percent()),
        SizingMode::Dynamic { duration_minutes } => {
            calculate_new_capacity(used_bytes, tier, duration_minutes, policy.margin_percent())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::ServiceLevel;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn static_margin_of_twenty_percent_is_exact() {
        assert_eq!(static_margin_capacity(80 * GIB, 20).expect("size"), 100 * GIB);
    }

    #[test_case(0, 20, 0 ; "empty volume")]
    #[test_case(1, 0, GIB ; "one byte rounds up")]
    #[test_case(GIB, 0, GIB ; "exact gib at zero margin")]
    #[test_case(GIB + 1, 0, 2 * GIB ; "one byte over")]
    #[test_case(50 * GIB, 50, 100 * GIB ; "half margin doubles")]
    fn static_margin_cases(used: u64, margin: u32, expected: u64) {
        assert_eq!(static_margin_capacity(used, margin).expect("size"), expected);
    }

    #[test]
    fn static_margin_saturates_to_a_whole_gib() {
        assert_eq!(static_margin_capacity(u64::MAX, 0).expect("size"), MAX_ALIGNED);
        assert_eq!(static_margin_capacity(u64::MAX / 2, 60).expect("size"), MAX_ALIGNED);
    }

    #[test]
    fn static_margin_of_hundred_is_invalid_policy() {
        let err = static_margin_capacity(GIB, 100).expect_err("should fail");
        assert!(matches!(err, CapacityError::InvalidPolicy { .. }));
    }

    #[test]
    fn dynamic_basic_hour_matches_formula() {
        // 60 min * 60 s * 16 KiB/s / 1024² * 1.2 = 0.06591796875
        let used = 100 * GIB;
        let expected_raw = (used as f64) / (1.0 - 0.065_917_968_75);
        let expected = next_gib(expected_raw.trunc() as u64);
        assert_eq!(
            calculate_new_capacity(used, "basic", 60, 20).expect("size"),
            expected
        );
        assert_eq!(expected, 108 * GIB);
    }

    #[test]
    fn dynamic_zero_usage_is_one_gib() {
        assert_eq!(calculate_new_capacity(0, "extreme", 60, 20).expect("size"), GIB);
    }

    #[test]
    fn dynamic_unknown_tier_uses_extreme() {
        assert_eq!(
            calculate_new_capacity(10 * GIB, "mystery", 30, 10).expect("size"),
            calculate_new_capacity(10 * GIB, "extreme", 30, 10).expect("size"),
        );
    }

    #[test]
    fn dynamic_unbounded_growth_is_model_error() {
        // extreme: 24h * 60 * 60 * 128 / 1024² ≈ 10.5x growth
        let err = calculate_new_capacity(GIB, "extreme", 24 * 60, 20).expect_err("should fail");
        assert!(matches!(err, CapacityError::CapacityModel { .. }));
    }

    #[test]
    fn dynamic_rejects_margin_over_bound() {
        let err = calculate_new_capacity(GIB, "basic", 60, 100).expect_err("should fail");
        assert!(matches!(err, CapacityError::InvalidPolicy { .. }));
    }

    #[test]
    fn plan_capacity_dispatches_on_mode() {
        let static_policy = Policy::new(0, 20, false).expect("policy");
        assert_eq!(plan_capacity(80 * GIB, "extreme", &static_policy).expect("size"), 100 * GIB);

        let dynamic_policy = Policy::new(60, 20, false).expect("policy");
        assert_eq!(
            plan_capacity(100 * GIB, "basic", &dynamic_policy).expect("size"),
            108 * GIB
        );
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(next_gib(0), GIB);
        assert_eq!(next_gib(GIB), 2 * GIB);
        assert_eq!(ceil_gib(0), 0);
        assert_eq!(ceil_gib(GIB), GIB);
        assert_eq!(ceil_gib(GIB + 1), 2 * GIB);
        assert_eq!(next_gib(u64::MAX) % GIB, 0);
    }

    fn arb_tier() -> impl Strategy<Value = ServiceLevel> {
        prop::sample::select(ServiceLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_dynamic_size_is_gib_aligned_and_covers_usage(
            used in 1u64..(50 * TIB),
            tier in arb_tier(),
            duration in 1u32..240,
            margin in 0u32..100,
        ) {
            let growth = f64::from(duration) * 60.0 * f64::from(tier.throughput_kib_per_gib())
                / KIB_PER_GIB * (1.0 + f64::from(margin) / 100.0);
            let result = calculate_new_capacity(used, tier.api_label(), duration, margin);
            if growth < 1.0 {
                let size = result.expect("non-degenerate input");
                prop_assert_eq!(size % GIB, 0);
                prop_assert!(size >= used);
            } else {
                let unbounded = matches!(result, Err(CapacityError::CapacityModel { .. }));
                prop_assert!(unbounded);
            }
        }

        #[test]
        fn prop_dynamic_is_deterministic(
            used in 0u64..(100 * TIB),
            tier in arb_tier(),
            duration in 1u32..120,
            margin in 0u32..100,
        ) {
            let a = calculate_new_capacity(used, tier.api_label(), duration, margin);
            let b = calculate_new_capacity(used, tier.api_label(), duration, margin);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_static_leaves_requested_margin(
            used in 0u64..(100 * TIB),
            margin in 0u32..100,
        ) {
            let size = static_margin_capacity(used, margin).expect("valid margin");
            prop_assert_eq!(size % GIB, 0);
            // used <= (100 - margin)% of size
            prop_assert!(u128::from(used) * 100 <= u128::from(size) * u128::from(100 - margin));
        }
    }
}
