//! Per-frame page record and its state machine.
//!
//! A [`Page`] is a plain value owned by [`Memory`](crate::memory::Memory)
//! and addressed by PFN.  It never refers back to its owner: every
//! transition that touches allocation accounting or the aging lists is a
//! `Memory` method, and the methods here only update the record itself.
//!
//! ```text
//!            access (minor, no delay)
//!   FREE ──────────────────────────────► MAPPED ◄─────────┐
//!                                          │              │ map() after
//!                                  unmap() │              │ MINOR_DELAY /
//!                                          ▼              │ MAJOR_DELAY
//!                                      UNMAPPED ──────────┤
//!                                          │              │
//!                  pageout() after         │              │
//!                  PAGEOUT_TIME            ▼              │
//!                                        PAGED ───────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Residency state of a page frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageState {
    /// Never allocated.
    Free,
    /// Resident and usable without a fault.
    Mapped,
    /// Reclaimed but not yet written to backing store.
    Unmapped,
    /// Evicted to backing store.
    Paged,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Mapped => write!(f, "mapped"),
            Self::Unmapped => write!(f, "unmapped"),
            Self::Paged => write!(f, "paged"),
        }
    }
}

/// State and access history of one page frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    state: PageState,
    /// Set on every completed access, cleared by aging.
    accessed: bool,
    access_count: u64,
    /// Ticks left before a blocked access completes (0 = not blocked).
    block_delay: u32,
    /// Tick of the most recent unmap.
    unmap_timestamp: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            state: PageState::Free,
            accessed: false,
            access_count: 0,
            block_delay: 0,
            unmap_timestamp: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> PageState {
        self.state
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.state == PageState::Mapped
    }

    #[inline]
    pub fn is_paged(&self) -> bool {
        self.state == PageState::Paged
    }

    #[inline]
    pub fn accessed(&self) -> bool {
        self.accessed
    }

    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    #[inline]
    pub fn block_delay(&self) -> u32 {
        self.block_delay
    }

    #[inline]
    pub fn unmap_timestamp(&self) -> u64 {
        self.unmap_timestamp
    }

    /// Record a completed access.
    pub fn mark_accessed(&mut self) {
        self.accessed = true;
        self.access_count += 1;
    }

    /// Return the accessed bit and clear it.
    pub fn test_and_clear_accessed(&mut self) -> bool {
        std::mem::replace(&mut self.accessed, false)
    }

    /// Start the countdown for a blocked access.
    pub fn begin_block(&mut self, delay: u32) {
        debug_assert!(delay > 0, "a zero delay would never expire");
        debug_assert!(!self.is_mapped(), "mapped pages never block");
        self.block_delay = delay;
    }

    /// Advance the block countdown by one tick.
    ///
    /// Returns `true` when the countdown reaches zero on this call.
    pub fn tick_block(&mut self) -> bool {
        if self.block_delay == 0 {
            return false;
        }
        self.block_delay -= 1;
        self.block_delay == 0
    }

    /// Make the page resident.  Returns the previous state.
    ///
    /// Clears any pending block countdown.  Mapping an already-mapped page
    /// changes nothing.
    pub fn map(&mut self) -> PageState {
        let prev = self.state;
        self.state = PageState::Mapped;
        self.block_delay = 0;
        prev
    }

    /// Take the page out of use at tick `now`.
    pub fn unmap(&mut self, now: u64) {
        debug_assert!(self.is_mapped(), "only mapped pages are unmapped");
        self.state = PageState::Unmapped;
        self.unmap_timestamp = now;
    }

    /// Finish writing the page to backing store.
    ///
    /// No-op unless the page is still unmapped; returns whether the
    /// transition happened.
    pub fn pageout(&mut self) -> bool {
        if self.state != PageState::Unmapped {
            return false;
        }
        self.state = PageState::Paged;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_free() {
        let page = Page::new();
        assert_eq!(page.state(), PageState::Free);
        assert!(!page.accessed());
        assert_eq!(page.access_count(), 0);
        assert_eq!(page.block_delay(), 0);
    }

    #[test]
    fn map_returns_previous_state() {
        let mut page = Page::new();
        assert_eq!(page.map(), PageState::Free);
        assert_eq!(page.map(), PageState::Mapped);
        assert!(page.is_mapped());
    }

    #[test]
    fn unmap_records_timestamp() {
        let mut page = Page::new();
        page.map();
        page.unmap(100);
        assert_eq!(page.state(), PageState::Unmapped);
        assert_eq!(page.unmap_timestamp(), 100);
    }

    #[test]
    fn pageout_only_from_unmapped() {
        let mut page = Page::new();
        assert!(!page.pageout());
        assert_eq!(page.state(), PageState::Free);

        page.map();
        assert!(!page.pageout());
        assert!(page.is_mapped());

        page.unmap(0);
        assert!(page.pageout());
        assert!(page.is_paged());
        assert!(!page.pageout());
    }

    #[test]
    fn block_countdown_expires_once() {
        let mut page = Page::new();
        page.map();
        page.unmap(0);
        page.pageout();
        page.begin_block(3);
        assert!(!page.tick_block());
        assert!(!page.tick_block());
        assert!(page.tick_block());
        assert!(!page.tick_block());
    }

    #[test]
    fn map_clears_block_countdown() {
        let mut page = Page::new();
        page.map();
        page.unmap(0);
        page.begin_block(32);
        page.tick_block();
        page.map();
        assert_eq!(page.block_delay(), 0);
    }

    #[test]
    fn accessed_bit_is_test_and_clear() {
        let mut page = Page::new();
        page.mark_accessed();
        page.mark_accessed();
        assert_eq!(page.access_count(), 2);
        assert!(page.test_and_clear_accessed());
        assert!(!page.test_and_clear_accessed());
        assert_eq!(page.access_count(), 2);
    }
}
