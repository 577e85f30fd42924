//! Pure control laws for the memory-limit controllers.
//!
//! Every function in this module is:
//! - **Pure**: no side effects beyond the return value.
//! - **Deterministic**: same inputs always produce the same outputs.
//! - **Assertion-guarded**: `debug_assert!` postconditions on the
//!   functions that publish a limit.
//!
//! Step functions work on signed limits so that a proposal may undershoot
//! 1 before [`clamp_limit`] brings it back into `[1, total]`.
//!
//! # Mapping to `squeezer.rs`
//!
//! | Function               | Used by                          |
//! |------------------------|----------------------------------|
//! | [`clamp_limit`]        | every variant                    |
//! | [`simple_step`]        | `SqueezeLaw::Simple`             |
//! | [`mk1_step`]           | `SqueezeLaw::Mk1`                |
//! | [`proportional_step`]  | `SqueezeLaw::Mk2`, `Mk3`         |
//! | [`window_mean`]        | `SqueezeLaw::Mk2`                |
//! | [`ewma`]               | `SqueezeLaw::Mk4`                |
//! | [`smoothed_step`]      | `SqueezeLaw::Mk4`                |
//! | [`work_rate`]          | `SqueezeSeries`                  |

/// Maximum number of proposals averaged by the moving-average law.
pub const MOVING_AVERAGE_WINDOW: usize = 10;

/// Smoothing factor of the exponentially-weighted fault estimate.
pub const EWMA_ALPHA: f64 = 0.6;

/// Step size of the Mk1 law when major faults are off target.
pub const MK1_MAJOR_STEP: i64 = 2;

const _: () = assert!(MOVING_AVERAGE_WINDOW > 0);
const _: () = assert!(MK1_MAJOR_STEP > 1);

/// Clamp a proposed limit into `[1, total]`.
///
/// `total` must be at least 1.
pub fn clamp_limit(proposed: i64, total: usize) -> usize {
    debug_assert!(total >= 1, "clamp_limit: capacity must be positive");
    let total_i = i64::try_from(total).unwrap_or(i64::MAX);
    let result = proposed.clamp(1, total_i) as usize;

    debug_assert!(
        (1..=total).contains(&result),
        "clamp_limit: result {result} outside [1, {total}]"
    );
    result
}

/// Clamp a fractional limit estimate into `[1, total]`.
pub fn clamp_estimate(proposed: f64, total: usize) -> f64 {
    debug_assert!(total >= 1, "clamp_estimate: capacity must be positive");
    if proposed.is_nan() {
        return total as f64;
    }
    proposed.clamp(1.0, total as f64)
}

/// Bang-bang step of one page.
///
/// Shrinks the limit by one when major faults are below `threshold`,
/// grows it by one when above, and holds when exactly on target.
pub fn simple_step(limit: i64, major: u64, threshold: u64) -> i64 {
    match major.cmp(&threshold) {
        std::cmp::Ordering::Less => limit - 1,
        std::cmp::Ordering::Greater => limit + 1,
        std::cmp::Ordering::Equal => limit,
    }
}

/// Two-level bang-bang step.
///
/// Major faults off target move the limit by [`MK1_MAJOR_STEP`].  When
/// major faults sit exactly on target, minor faults decide a one-page
/// adjustment.
pub fn mk1_step(
    limit: i64,
    major: u64,
    minor: u64,
    major_threshold: u64,
    minor_threshold: u64,
) -> i64 {
    if major < major_threshold {
        limit - MK1_MAJOR_STEP
    } else if major > major_threshold {
        limit + MK1_MAJOR_STEP
    } else if minor < minor_threshold {
        limit - 1
    } else if minor > minor_threshold {
        limit + 1
    } else {
        limit
    }
}

/// Proportional step.
///
/// Below target the limit shrinks by the shortfall `threshold - major`;
/// above target it grows by the full fault count.
pub fn proportional_step(limit: i64, major: u64, threshold: u64) -> i64 {
    let major_i = i64::try_from(major).unwrap_or(i64::MAX);
    let threshold_i = i64::try_from(threshold).unwrap_or(i64::MAX);
    if major < threshold {
        limit - (threshold_i - major_i)
    } else if major > threshold {
        limit.saturating_add(major_i)
    } else {
        limit
    }
}

/// Floor of the arithmetic mean of `window`.
///
/// Returns `None` for an empty window.
pub fn window_mean(window: &[usize]) -> Option<usize> {
    if window.is_empty() {
        return None;
    }
    let sum: u128 = window.iter().map(|&v| v as u128).sum();
    let mean = (sum / window.len() as u128) as usize;

    debug_assert!(
        window.iter().any(|&v| v <= mean) && window.iter().any(|&v| v >= mean),
        "window_mean: mean must lie within the sample range"
    );
    Some(mean)
}

/// One step of an exponentially-weighted moving average.
pub fn ewma(previous: f64, sample: f64, alpha: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&alpha), "ewma: alpha outside [0, 1]");
    alpha * sample + (1.0 - alpha) * previous
}

/// Step driven by a smoothed fault estimate.
///
/// Below target the limit shrinks by `threshold - smoothed / 2`; above
/// target it grows by `smoothed / 2`.
pub fn smoothed_step(limit: f64, smoothed: f64, threshold: u64) -> f64 {
    let threshold = threshold as f64;
    if smoothed < threshold {
        limit - (threshold - smoothed / 2.0)
    } else if smoothed > threshold {
        limit + smoothed / 2.0
    } else {
        limit
    }
}

/// Fraction of `ticks` that completed a unit of work.
///
/// A zero-length interval has no meaningful rate and yields `0.0`.
pub fn work_rate(work: u64, ticks: u64) -> f64 {
    if ticks == 0 {
        return 0.0;
    }
    work as f64 / ticks as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(-5, 10), 1);
        assert_eq!(clamp_limit(0, 10), 1);
        assert_eq!(clamp_limit(7, 10), 7);
        assert_eq!(clamp_limit(11, 10), 10);
        assert_eq!(clamp_limit(i64::MAX, 1), 1);
    }

    #[test]
    fn clamp_estimate_bounds() {
        assert_eq!(clamp_estimate(0.25, 10), 1.0);
        assert_eq!(clamp_estimate(3.5, 10), 3.5);
        assert_eq!(clamp_estimate(99.0, 10), 10.0);
        assert_eq!(clamp_estimate(f64::NAN, 10), 10.0);
    }

    #[test]
    fn simple_step_directions() {
        assert_eq!(simple_step(10, 0, 2), 9);
        assert_eq!(simple_step(10, 2, 2), 10);
        assert_eq!(simple_step(10, 3, 2), 11);
    }

    #[test]
    fn mk1_major_faults_dominate() {
        assert_eq!(mk1_step(10, 0, 100, 2, 5), 8);
        assert_eq!(mk1_step(10, 9, 0, 2, 5), 12);
    }

    #[test]
    fn mk1_minor_faults_break_ties() {
        assert_eq!(mk1_step(10, 2, 0, 2, 5), 9);
        assert_eq!(mk1_step(10, 2, 6, 2, 5), 11);
        assert_eq!(mk1_step(10, 2, 5, 2, 5), 10);
    }

    #[test]
    fn proportional_step_is_asymmetric() {
        // Shortfall of 2 below target.
        assert_eq!(proportional_step(20, 0, 2), 18);
        // Shortfall of 1.
        assert_eq!(proportional_step(20, 1, 2), 19);
        assert_eq!(proportional_step(20, 2, 2), 20);
        // Above target grows by the whole fault count.
        assert_eq!(proportional_step(20, 7, 2), 27);
    }

    #[test]
    fn window_mean_floors() {
        assert_eq!(window_mean(&[]), None);
        assert_eq!(window_mean(&[5]), Some(5));
        assert_eq!(window_mean(&[4, 5]), Some(4));
        assert_eq!(window_mean(&[10, 20, 30]), Some(20));
    }

    #[test]
    fn ewma_weights_new_sample() {
        let v = ewma(0.0, 10.0, EWMA_ALPHA);
        assert!((v - 6.0).abs() < 1e-9);
        let v = ewma(v, 0.0, EWMA_ALPHA);
        assert!((v - 2.4).abs() < 1e-9);
    }

    #[test]
    fn smoothed_step_directions() {
        assert!((smoothed_step(10.0, 0.0, 2) - 8.0).abs() < 1e-9);
        assert!((smoothed_step(10.0, 1.0, 2) - 8.5).abs() < 1e-9);
        assert!((smoothed_step(10.0, 2.0, 2) - 10.0).abs() < 1e-9);
        assert!((smoothed_step(10.0, 6.0, 2) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn work_rate_guards_zero_interval() {
        assert_eq!(work_rate(5, 0), 0.0);
        assert_eq!(work_rate(500, 1000), 0.5);
    }
}
