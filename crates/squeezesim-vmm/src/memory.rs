//! Guest memory: page array, aging lists, reclaim and delayed swap-out.
//!
//! [`Memory`] exclusively owns every [`Page`] and the three PFN queues
//! that order them:
//!
//! ```text
//!            age()                 reclaim()              swap_write()
//!  active ──────────► inactive ──────────────► swap_queue ────────────► (paged)
//!    ▲   oldest first   │      unmap, counted    FIFO by unmap tick
//!    │                  │      as free at once
//!    └──── accessed ────┘ (second chance: re-queued at the tail)
//! ```
//!
//! # Membership invariant
//!
//! At every instant each PFN is in at most one queue, determined by its
//! state:
//!
//! | state      | queue                   |
//! |------------|-------------------------|
//! | `Free`     | none                    |
//! | `Mapped`   | `active` or `inactive`  |
//! | `Unmapped` | `swap_queue`            |
//! | `Paged`    | none                    |
//!
//! and `allocated == active.len() + inactive.len()`.
//! [`Memory::check_invariants`] verifies this.
//!
//! # Soft limit
//!
//! Reclaim only unmaps pages that aging has moved to the inactive list,
//! and aging refuses to shrink the active list below `min_active`.  A
//! limit below what the floors allow is therefore approached over
//! successive scans rather than enforced at once; [`ScanStats::exhausted`]
//! reports a scan that ran out of candidates while still over the limit.

use crate::config::SimConfig;
use crate::events::{EventSink, SimEvent};
use crate::page::{Page, PageState};
use crate::verified::reclaim::{over_limit, pageout_due, should_age};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use thiserror::Error;

/// Violations of the membership invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("pfn {pfn} appears in more than one queue")]
    DuplicateMembership { pfn: usize },

    #[error("pfn {pfn} in state {state} is on the {queue} queue")]
    StateMismatch {
        pfn: usize,
        state: PageState,
        queue: &'static str,
    },

    #[error("allocated counter {allocated} != {resident} resident pages")]
    AllocatedMismatch { allocated: usize, resident: usize },

    #[error("limit {limit} outside [1, {total}]")]
    LimitOutOfRange { limit: usize, total: usize },
}

/// Timing and floor parameters of the reclaim engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryParams {
    pub minor_delay: u32,
    pub major_delay: u32,
    pub pageout_time: u64,
    pub min_inactive: usize,
    pub min_active: usize,
}

impl From<&SimConfig> for MemoryParams {
    fn from(config: &SimConfig) -> Self {
        Self {
            minor_delay: config.minor_delay,
            major_delay: config.major_delay,
            pageout_time: config.pageout_time,
            min_inactive: config.min_inactive,
            min_active: config.min_active,
        }
    }
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}

/// Result of a single page access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The access completed this tick.
    Completed,
    /// The accessor must wait for the page; poll with
    /// [`Memory::poll_blocked`].
    Blocked,
}

/// What one aging/reclaim scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Pages demoted from active to inactive.
    pub aged: usize,
    /// Pages unmapped by reclaim.
    pub reclaimed: usize,
    /// Reclaim stopped with `allocated > limit` for lack of candidates.
    pub exhausted: bool,
}

/// What one [`Memory::age`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgePass {
    /// Pages moved to the inactive list.
    pub demoted: usize,
    /// Pages whose accessed bit was cleared and kept active.
    pub cleared: usize,
}

impl AgePass {
    /// Nothing demoted and no bit cleared: another pass cannot help.
    pub fn is_idle(&self) -> bool {
        self.demoted == 0 && self.cleared == 0
    }
}

/// The guest's physical memory as seen by the hypervisor.
#[derive(Debug, Clone)]
pub struct Memory {
    pages: Vec<Page>,
    /// Recently used pages, oldest at the front.
    active: VecDeque<usize>,
    /// Eviction candidates, oldest at the front.
    inactive: VecDeque<usize>,
    /// Unmapped pages awaiting pageout, ordered by unmap tick.
    swap_queue: VecDeque<usize>,
    allocated: usize,
    limit: usize,
    major_faults: u64,
    minor_faults: u64,
    params: MemoryParams,
}

impl Memory {
    /// Create `total` free pages with the limit set to full capacity.
    pub fn new(total: usize, params: MemoryParams) -> Self {
        assert!(total > 0, "memory needs at least one page");
        assert!(params.min_inactive > 0, "min_inactive must be positive");
        Self {
            pages: vec![Page::new(); total],
            active: VecDeque::with_capacity(total),
            inactive: VecDeque::with_capacity(total),
            swap_queue: VecDeque::with_capacity(total),
            allocated: 0,
            limit: total,
            major_faults: 0,
            minor_faults: 0,
            params,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────

    #[inline]
    pub fn total(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    #[inline]
    pub fn major_faults(&self) -> u64 {
        self.major_faults
    }

    #[inline]
    pub fn minor_faults(&self) -> u64 {
        self.minor_faults
    }

    #[inline]
    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    /// The page record for `pfn`.
    pub fn page(&self, pfn: usize) -> &Page {
        &self.pages[pfn]
    }

    pub fn active(&self) -> &VecDeque<usize> {
        &self.active
    }

    pub fn inactive(&self) -> &VecDeque<usize> {
        &self.inactive
    }

    pub fn swap_queue(&self) -> &VecDeque<usize> {
        &self.swap_queue
    }

    /// Total completed accesses per PFN.
    pub fn access_counts(&self) -> Vec<u64> {
        self.pages.iter().map(Page::access_count).collect()
    }

    /// Publish a new limit.
    ///
    /// # Panics
    ///
    /// If `limit` is outside `[1, total]`; that is a controller bug.
    pub fn set_limit(&mut self, limit: usize) {
        assert!(
            (1..=self.total()).contains(&limit),
            "limit {} outside [1, {}]",
            limit,
            self.total()
        );
        self.limit = limit;
    }

    // ─── Page transitions ────────────────────────────────────────────

    /// Access `pfn` on behalf of the vCPU at tick `now`.
    ///
    /// | state      | fault | outcome                          |
    /// |------------|-------|----------------------------------|
    /// | `Free`     | minor | allocated and mapped, completes  |
    /// | `Mapped`   | —     | completes                        |
    /// | `Unmapped` | minor | blocks for `minor_delay` ticks   |
    /// | `Paged`    | major | blocks for `major_delay` ticks   |
    ///
    /// # Panics
    ///
    /// If `pfn` is out of range; that is a workload bug.
    pub fn access(&mut self, pfn: usize, now: u64, sink: &mut dyn EventSink) -> AccessOutcome {
        assert!(
            pfn < self.total(),
            "pfn {} out of range (total {})",
            pfn,
            self.total()
        );

        match self.pages[pfn].state() {
            PageState::Free => {
                self.minor_faults += 1;
                self.map(pfn, now, sink);
                self.pages[pfn].mark_accessed();
                AccessOutcome::Completed
            }
            PageState::Mapped => {
                self.pages[pfn].mark_accessed();
                AccessOutcome::Completed
            }
            PageState::Unmapped => {
                self.minor_faults += 1;
                self.pages[pfn].begin_block(self.params.minor_delay);
                AccessOutcome::Blocked
            }
            PageState::Paged => {
                self.major_faults += 1;
                self.pages[pfn].begin_block(self.params.major_delay);
                AccessOutcome::Blocked
            }
        }
    }

    /// Poll a page the vCPU is blocked on.
    ///
    /// Returns `true` if the page is mapped.  Otherwise advances the
    /// page's block countdown and maps it when the countdown expires.
    pub fn poll_blocked(&mut self, pfn: usize, now: u64, sink: &mut dyn EventSink) -> bool {
        if self.pages[pfn].is_mapped() {
            return true;
        }
        if self.pages[pfn].tick_block() {
            self.map(pfn, now, sink);
        }
        self.pages[pfn].is_mapped()
    }

    /// Make `pfn` resident and put it at the tail of the active list.
    ///
    /// Mapping an already-mapped page is a no-op.
    pub fn map(&mut self, pfn: usize, now: u64, sink: &mut dyn EventSink) {
        if self.pages[pfn].is_mapped() {
            return;
        }
        let from = self.pages[pfn].map();
        if from == PageState::Unmapped {
            // Re-activated before pageout: leave the swap queue.
            if let Some(pos) = self.swap_queue.iter().position(|&p| p == pfn) {
                self.swap_queue.remove(pos);
            }
        }
        self.allocated += 1;
        self.active.push_back(pfn);
        trace!("tick {}: map pfn {} from {}", now, pfn, from);
        sink.record(now, SimEvent::Map { pfn, from });
    }

    /// Unmap the page at the head of the inactive list.
    ///
    /// The page counts as free immediately, before it is written out.
    fn unmap_oldest_inactive(&mut self, now: u64, sink: &mut dyn EventSink) -> Option<usize> {
        let pfn = self.inactive.pop_front()?;
        self.pages[pfn].unmap(now);
        self.allocated -= 1;
        self.swap_queue.push_back(pfn);
        trace!("tick {}: unmap pfn {}", now, pfn);
        sink.record(now, SimEvent::Unmap { pfn });
        Some(pfn)
    }

    // ─── Aging and reclaim ───────────────────────────────────────────

    /// Run one aging pass followed by reclaim.
    pub fn scan(&mut self, now: u64, sink: &mut dyn EventSink) -> ScanStats {
        let mut stats = ScanStats {
            aged: self.age().demoted,
            ..Default::default()
        };
        let (reclaimed, aged, exhausted) = self.reclaim(now, sink);
        stats.reclaimed = reclaimed;
        stats.aged += aged;
        stats.exhausted = exhausted;

        debug!(
            "tick {}: scan aged={} reclaimed={} allocated={} limit={} active={} inactive={} swapq={}",
            now,
            stats.aged,
            stats.reclaimed,
            self.allocated,
            self.limit,
            self.active.len(),
            self.inactive.len(),
            self.swap_queue.len()
        );
        stats
    }

    /// One clock pass over the active list, oldest first.
    ///
    /// A page accessed since the previous pass has its bit cleared and
    /// goes back to the tail of the active list; an untouched page moves
    /// to the tail of the inactive list.  Each page present at entry is
    /// visited at most once, so a page re-queued here cannot be demoted
    /// by the same call.  Stops early once the inactive list holds
    /// `min_inactive` pages or the active list would drop below
    /// `min_active`.
    pub fn age(&mut self) -> AgePass {
        let mut pass = AgePass::default();
        for _ in 0..self.active.len() {
            if !should_age(
                self.inactive.len(),
                self.active.len(),
                self.params.min_inactive,
                self.params.min_active,
            ) {
                break;
            }
            let Some(pfn) = self.active.pop_front() else {
                break;
            };
            if self.pages[pfn].test_and_clear_accessed() {
                self.active.push_back(pfn);
                pass.cleared += 1;
            } else {
                self.inactive.push_back(pfn);
                pass.demoted += 1;
            }
        }
        pass
    }

    /// Unmap inactive pages, oldest first, until `allocated <= limit`.
    ///
    /// Refills the inactive list by aging when it runs dry.  Gives up
    /// only when an aging pass neither demotes a page nor clears an
    /// accessed bit.  Returns `(reclaimed, aged, exhausted)`.
    fn reclaim(&mut self, now: u64, sink: &mut dyn EventSink) -> (usize, usize, bool) {
        let mut reclaimed = 0;
        let mut aged = 0;

        while over_limit(self.allocated, self.limit) {
            if self.unmap_oldest_inactive(now, sink).is_some() {
                reclaimed += 1;
                continue;
            }
            let pass = self.age();
            if pass.is_idle() {
                warn!(
                    "tick {}: reclaim exhausted with {} pages over limit {} (active={})",
                    now,
                    self.allocated - self.limit,
                    self.limit,
                    self.active.len()
                );
                return (reclaimed, aged, true);
            }
            aged += pass.demoted;
        }
        (reclaimed, aged, false)
    }

    /// Write out unmapped pages whose pageout delay has elapsed.
    ///
    /// The swap queue is ordered by unmap tick, so draining stops at the
    /// first page still inside its delay.  Returns the number paged out.
    pub fn swap_write(&mut self, now: u64, sink: &mut dyn EventSink) -> usize {
        let mut written = 0;
        while let Some(&pfn) = self.swap_queue.front() {
            let page = &self.pages[pfn];
            if !pageout_due(now, page.unmap_timestamp(), self.params.pageout_time) {
                break;
            }
            self.swap_queue.pop_front();
            if self.pages[pfn].pageout() {
                trace!("tick {}: pageout pfn {}", now, pfn);
                sink.record(now, SimEvent::Pageout { pfn });
                written += 1;
            }
        }
        written
    }

    // ─── Invariants ──────────────────────────────────────────────────

    /// Verify the membership invariant described in the module docs.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if !(1..=self.total()).contains(&self.limit) {
            return Err(InvariantViolation::LimitOutOfRange {
                limit: self.limit,
                total: self.total(),
            });
        }

        let mut seen = vec![false; self.total()];
        let queues: [(&VecDeque<usize>, &'static str, PageState); 3] = [
            (&self.active, "active", PageState::Mapped),
            (&self.inactive, "inactive", PageState::Mapped),
            (&self.swap_queue, "swap", PageState::Unmapped),
        ];
        for (queue, name, expected) in queues {
            for &pfn in queue {
                if std::mem::replace(&mut seen[pfn], true) {
                    return Err(InvariantViolation::DuplicateMembership { pfn });
                }
                let state = self.pages[pfn].state();
                if state != expected {
                    return Err(InvariantViolation::StateMismatch {
                        pfn,
                        state,
                        queue: name,
                    });
                }
            }
        }

        for (pfn, page) in self.pages.iter().enumerate() {
            let queued = seen[pfn];
            let should_be_queued = matches!(page.state(), PageState::Mapped | PageState::Unmapped);
            if queued != should_be_queued {
                return Err(InvariantViolation::StateMismatch {
                    pfn,
                    state: page.state(),
                    queue: "none",
                });
            }
        }

        let resident = self.active.len() + self.inactive.len();
        if self.allocated != resident {
            return Err(InvariantViolation::AllocatedMismatch {
                allocated: self.allocated,
                resident,
            });
        }
        Ok(())
    }
}
