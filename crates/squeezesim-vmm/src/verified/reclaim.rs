//! Pure predicates for aging, reclaim and delayed swap-out.
//!
//! # Mapping to `memory.rs`
//!
//! | Function            | Used by                  |
//! |---------------------|--------------------------|
//! | [`should_age`]      | `Memory::age()`          |
//! | [`over_limit`]      | `Memory::reclaim()`      |
//! | [`pageout_due`]     | `Memory::swap_write()`   |
//! | [`fault_delta`]     | `FaultBaseline::count()` |

/// Whether aging should demote another page.
///
/// Aging keeps at least `min_inactive` pages on the inactive list and
/// stops before the active list drops below `min_active`.
pub fn should_age(
    inactive_len: usize,
    active_len: usize,
    min_inactive: usize,
    min_active: usize,
) -> bool {
    inactive_len < min_inactive && active_len >= min_active && active_len > 0
}

/// Whether the resident set exceeds the limit.
#[inline]
pub fn over_limit(allocated: usize, limit: usize) -> bool {
    allocated > limit
}

/// Whether a page unmapped at `unmapped_at` is due for pageout at `now`.
pub fn pageout_due(now: u64, unmapped_at: u64, pageout_time: u64) -> bool {
    debug_assert!(now >= unmapped_at, "pageout_due: unmap lies in the future");
    now.saturating_sub(unmapped_at) >= pageout_time
}

/// Faults counted since `baseline`.
#[inline]
pub fn fault_delta(current: u64, baseline: u64) -> u64 {
    debug_assert!(current >= baseline, "fault counters are monotonic");
    current.saturating_sub(baseline)
}
