//! The single simulated vCPU.
//!
//! Each tick the vCPU may receive one unit of work, then does exactly one
//! of:
//!
//! 1. **Retry** — it is blocked and the page it waits for just became
//!    resident; the faulting access is replayed and completes.
//! 2. **Wait** — it is blocked and the page is still in flight.
//! 3. **Run** — it has pending work; the [`Workload`] picks a page and
//!    accesses it through a [`VcpuPort`].
//! 4. **Idle** — nothing to do.
//!
//! Blocking is an explicit countdown on the page, polled once per tick;
//! nothing is ever suspended.

use crate::events::{EventSink, SimEvent};
use crate::memory::{AccessOutcome, Memory};
use crate::rng;
use crate::workload::Workload;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

/// Work accounting shared between the vCPU and the port it lends out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VcpuCore {
    /// Work units received but not yet completed.
    work_pending: u64,
    /// Work units completed.
    work_done: u64,
    /// PFN of the page the vCPU is waiting for.
    blocked: Option<usize>,
    busy_ticks: u64,
    idle_ticks: u64,
    blocked_ticks: u64,
}

impl VcpuCore {
    fn access(&mut self, pfn: usize, mm: &mut Memory, now: u64, sink: &mut dyn EventSink) {
        match mm.access(pfn, now, sink) {
            AccessOutcome::Completed => {
                self.work_pending = self.work_pending.saturating_sub(1);
                self.work_done += 1;
                self.busy_ticks += 1;
                sink.record(now, SimEvent::Work);
            }
            AccessOutcome::Blocked => {
                self.blocked = Some(pfn);
                self.blocked_ticks += 1;
                sink.record(now, SimEvent::Block { pfn });
            }
        }
    }

    fn idle(&mut self, now: u64, sink: &mut dyn EventSink) {
        self.idle_ticks += 1;
        sink.record(now, SimEvent::Idle);
    }
}

/// The capability a [`Workload`] receives for one tick.
///
/// A workload calls [`access`](Self::access) or [`idle`](Self::idle) at
/// most once; returning without calling either counts as idle.
pub struct VcpuPort<'a> {
    core: &'a mut VcpuCore,
    mm: &'a mut Memory,
    sink: &'a mut dyn EventSink,
    now: u64,
    acted: bool,
}

impl VcpuPort<'_> {
    /// Number of page frames; valid PFNs are `0..total_pages()`.
    pub fn total_pages(&self) -> usize {
        self.mm.total()
    }

    /// Current simulation tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Access `pfn` for the pending unit of work.
    pub fn access(&mut self, pfn: usize) {
        debug_assert!(!self.acted, "workload acted twice in one tick");
        self.acted = true;
        self.core.access(pfn, self.mm, self.now, self.sink);
    }

    /// Decline to act this tick.
    pub fn idle(&mut self) {
        debug_assert!(!self.acted, "workload acted twice in one tick");
        self.acted = true;
        self.core.idle(self.now, self.sink);
    }
}

/// A single virtual CPU driven by a workload.
pub struct Vcpu {
    core: VcpuCore,
    workload: Box<dyn Workload>,
    rng: ChaCha20Rng,
    work_probability: f64,
}

impl Vcpu {
    /// Create a vCPU whose work arrives with `work_probability` per tick.
    pub fn new(workload: Box<dyn Workload>, work_probability: f64, seed: u64) -> Self {
        debug_assert!((0.0..=1.0).contains(&work_probability));
        Self {
            core: VcpuCore::default(),
            workload,
            rng: rng::derive(seed, rng::DOMAIN_VCPU),
            work_probability,
        }
    }

    #[inline]
    pub fn work_pending(&self) -> u64 {
        self.core.work_pending
    }

    #[inline]
    pub fn work_done(&self) -> u64 {
        self.core.work_done
    }

    /// PFN the vCPU is waiting for, if any.
    #[inline]
    pub fn blocked_on(&self) -> Option<usize> {
        self.core.blocked
    }

    /// Ticks that completed a unit of work.
    pub fn busy_ticks(&self) -> u64 {
        self.core.busy_ticks
    }

    /// Ticks with nothing to do.
    pub fn idle_ticks(&self) -> u64 {
        self.core.idle_ticks
    }

    /// Ticks spent waiting on a fault.
    pub fn blocked_ticks(&self) -> u64 {
        self.core.blocked_ticks
    }

    /// Name of the workload driving this vCPU.
    pub fn workload_name(&self) -> &'static str {
        self.workload.name()
    }

    /// Run one tick.
    pub fn tick(&mut self, mm: &mut Memory, now: u64, sink: &mut dyn EventSink) {
        // Work accumulates while blocked.
        if self.rng.gen_bool(self.work_probability) {
            self.core.work_pending += 1;
        }

        if let Some(pfn) = self.core.blocked {
            if mm.poll_blocked(pfn, now, sink) {
                self.core.blocked = None;
                self.core.access(pfn, mm, now, sink);
            } else {
                self.core.blocked_ticks += 1;
                sink.record(now, SimEvent::Block { pfn });
            }
            return;
        }

        if self.core.work_pending == 0 {
            self.core.idle(now, sink);
            return;
        }

        let mut port = VcpuPort {
            core: &mut self.core,
            mm,
            sink,
            now,
            acted: false,
        };
        self.workload.tick(&mut port);
        if !port.acted {
            port.idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventRecorder, NullSink};
    use crate::memory::MemoryParams;
    use crate::page::PageState;

    /// Accesses a fixed sequence of PFNs, then idles.
    struct Script {
        pfns: Vec<usize>,
        next: usize,
    }

    impl Workload for Script {
        fn name(&self) -> &'static str {
            "script"
        }

        fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
            if let Some(&pfn) = self.pfns.get(self.next) {
                self.next += 1;
                vcpu.access(pfn);
            }
        }
    }

    fn script(pfns: &[usize]) -> Box<dyn Workload> {
        Box::new(Script {
            pfns: pfns.to_vec(),
            next: 0,
        })
    }

    #[test]
    fn completed_access_does_work() {
        let mut mm = Memory::new(4, MemoryParams::default());
        let mut vcpu = Vcpu::new(script(&[0, 1]), 1.0, 0);
        vcpu.tick(&mut mm, 0, &mut NullSink);
        vcpu.tick(&mut mm, 1, &mut NullSink);
        assert_eq!(vcpu.work_done(), 2);
        assert_eq!(vcpu.work_pending(), 0);
        assert_eq!(vcpu.busy_ticks(), 2);
    }

    #[test]
    fn silent_workload_counts_as_idle() {
        let mut mm = Memory::new(4, MemoryParams::default());
        let mut vcpu = Vcpu::new(script(&[]), 1.0, 0);
        let mut rec = EventRecorder::new();
        vcpu.tick(&mut mm, 0, &mut rec);
        assert_eq!(vcpu.idle_ticks(), 1);
        assert_eq!(vcpu.work_pending(), 1);
        assert_eq!(rec.events(), &[(0, SimEvent::Idle)]);
    }

    #[test]
    fn no_work_means_idle() {
        let mut mm = Memory::new(4, MemoryParams::default());
        let mut vcpu = Vcpu::new(script(&[0]), 0.0, 0);
        for t in 0..5 {
            vcpu.tick(&mut mm, t, &mut NullSink);
        }
        assert_eq!(vcpu.idle_ticks(), 5);
        assert_eq!(vcpu.work_done(), 0);
        assert_eq!(mm.allocated(), 0);
    }

    #[test]
    fn blocked_vcpu_waits_then_retries() {
        let params = MemoryParams {
            min_inactive: 1,
            min_active: 1,
            major_delay: 4,
            pageout_time: 0,
            ..Default::default()
        };
        let mut mm = Memory::new(2, params);
        // Touch 0 and 1, evict 0 to backing store, then touch 0 again.
        let mut vcpu = Vcpu::new(script(&[0, 1, 0]), 1.0, 0);
        vcpu.tick(&mut mm, 0, &mut NullSink);
        vcpu.tick(&mut mm, 1, &mut NullSink);
        mm.set_limit(1);
        mm.scan(2, &mut NullSink);
        mm.swap_write(2, &mut NullSink);
        assert_eq!(mm.page(0).state(), PageState::Paged);

        let mut rec = EventRecorder::new();
        vcpu.tick(&mut mm, 2, &mut rec);
        assert_eq!(vcpu.blocked_on(), Some(0));
        assert_eq!(mm.major_faults(), 1);

        // Three more polls keep it blocked; the fourth maps and retries.
        for t in 3..6 {
            vcpu.tick(&mut mm, t, &mut rec);
            assert_eq!(vcpu.blocked_on(), Some(0));
        }
        vcpu.tick(&mut mm, 6, &mut rec);
        assert_eq!(vcpu.blocked_on(), None);
        assert_eq!(vcpu.work_done(), 3);
        assert_eq!(mm.major_faults(), 1);
        assert_eq!(vcpu.blocked_ticks(), 4);
        // Work arrived on every tick, including while blocked.
        assert_eq!(vcpu.work_pending(), 7 - 3);
        assert_eq!(rec.count(|e| matches!(e, SimEvent::Block { pfn: 0 })), 4);
        assert_eq!(rec.count(|e| matches!(e, SimEvent::Map { from: PageState::Paged, .. })), 1);
        assert!(mm.check_invariants().is_ok());
    }
}
