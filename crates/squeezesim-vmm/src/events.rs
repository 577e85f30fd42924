//! Per-tick simulation events and the sinks that observe them.
//!
//! Components emit a [`SimEvent`] for every observable step (scan,
//! squeeze, page transition, vCPU outcome) into a caller-supplied
//! [`EventSink`].  The default [`NullSink`] discards everything, so a run
//! without an observer pays only for a virtual call.
//!
//! [`ActivityLog`] renders the classic one-character-per-event activity
//! stream:
//!
//! ```text
//! /|A.A.A.A.M..._______________________________P.....U..F
//! ```
//!
//! | char | event                           |
//! |------|---------------------------------|
//! | `/`  | aging/reclaim scan              |
//! | `\|` | controller invocation           |
//! | `A`  | first allocation of a free page |
//! | `P`  | paged-out page swapped back in  |
//! | `M`  | unmapped page re-mapped         |
//! | `U`  | page unmapped by reclaim        |
//! | `F`  | page written to backing store   |
//! | `.`  | unit of work completed          |
//! | ` `  | idle tick                       |
//! | `_`  | vCPU blocked on a fault         |

use crate::page::PageState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Characters per line in the activity stream.
pub const ACTIVITY_LINE_WIDTH: usize = 64;

/// A single observable step of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Aging and reclaim ran.
    Scan,
    /// The controller ran and published `limit`.
    Squeeze { limit: usize },
    /// A page became resident; `from` is its previous state.
    Map { pfn: usize, from: PageState },
    /// Reclaim unmapped a page.
    Unmap { pfn: usize },
    /// An unmapped page reached backing store.
    Pageout { pfn: usize },
    /// The vCPU completed a unit of work.
    Work,
    /// The vCPU had nothing to do.
    Idle,
    /// The vCPU is (still) waiting for a page.
    Block { pfn: usize },
}

impl SimEvent {
    /// The activity-stream character for this event.
    pub fn symbol(&self) -> char {
        match self {
            Self::Scan => '/',
            Self::Squeeze { .. } => '|',
            Self::Map { from: PageState::Free, .. } => 'A',
            Self::Map { from: PageState::Paged, .. } => 'P',
            Self::Map { .. } => 'M',
            Self::Unmap { .. } => 'U',
            Self::Pageout { .. } => 'F',
            Self::Work => '.',
            Self::Idle => ' ',
            Self::Block { .. } => '_',
        }
    }
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Squeeze { limit } => write!(f, "squeeze limit={}", limit),
            Self::Map { pfn, from } => write!(f, "map pfn={} from={}", pfn, from),
            Self::Unmap { pfn } => write!(f, "unmap pfn={}", pfn),
            Self::Pageout { pfn } => write!(f, "pageout pfn={}", pfn),
            Self::Work => write!(f, "work"),
            Self::Idle => write!(f, "idle"),
            Self::Block { pfn } => write!(f, "block pfn={}", pfn),
        }
    }
}

/// Receiver of simulation events.
pub trait EventSink {
    /// Observe `event`, emitted during tick `tick`.
    fn record(&mut self, tick: u64, event: SimEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    #[inline]
    fn record(&mut self, _tick: u64, _event: SimEvent) {}
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Vec<(u64, SimEvent)>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `(tick, event)` pairs in emission order.
    pub fn events(&self) -> &[(u64, SimEvent)] {
        &self.events
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.events.iter().filter(|(_, e)| pred(e)).count()
    }

    /// Take ownership of the recorded events, leaving the recorder empty.
    pub fn drain(&mut self) -> Vec<(u64, SimEvent)> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for EventRecorder {
    fn record(&mut self, tick: u64, event: SimEvent) {
        self.events.push((tick, event));
    }
}

/// Sink that writes the one-character activity stream to `W`.
///
/// Write errors are logged once and then ignored; an activity log must
/// never abort a run.
pub struct ActivityLog<W: Write> {
    out: W,
    column: usize,
    failed: bool,
}

impl<W: Write> ActivityLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            column: 0,
            failed: false,
        }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> W {
        let _ = self.out.flush();
        self.out
    }

    fn put(&mut self, c: char) -> std::io::Result<()> {
        write!(self.out, "{}", c)?;
        self.column += 1;
        if self.column >= ACTIVITY_LINE_WIDTH {
            self.column = 0;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

impl<W: Write> EventSink for ActivityLog<W> {
    fn record(&mut self, _tick: u64, event: SimEvent) {
        if self.failed {
            return;
        }
        if let Err(e) = self.put(event.symbol()) {
            log::warn!("activity log disabled after write error: {}", e);
            self.failed = true;
        }
    }
}
