//! The host: owns memory, the vCPU and the controller, and drives the
//! simulated clock.
//!
//! # Tick order
//!
//! ```text
//! tick % scan_interval == 0     →  Memory::scan()
//! tick % squeeze_interval == 0  →  Squeezer::squeeze()
//!                                  Vcpu::tick()
//!                                  Memory::swap_write()
//! tick += 1
//! ```
//!
//! Scan and squeeze both fire on tick 0.  The squeeze there only sets the
//! fault baseline for telemetry; the control law itself still runs.

use crate::config::{ConfigError, SimConfig, SqueezerKind, WorkloadKind};
use crate::events::{EventSink, NullSink, SimEvent};
use crate::memory::{Memory, MemoryParams};
use crate::squeezer::{SqueezeLaw, Squeezer};
use crate::vcpu::Vcpu;
use crate::verified::squeeze::work_rate;
use crate::workload::{self, Workload};
use log::info;

/// A complete single-vCPU simulation.
pub struct Host {
    config: SimConfig,
    tick: u64,
    mm: Memory,
    vcpu: Vcpu,
    squeezer: Squeezer,
    scans: u64,
    exhausted_scans: u64,
}

impl Host {
    /// Validate `config` and assemble a host.
    ///
    /// Nothing runs until [`run`](Self::run) or [`step`](Self::step).
    pub fn new(
        config: SimConfig,
        squeezer: Squeezer,
        workload: Box<dyn Workload>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let SqueezeLaw::Static { limit } = squeezer.law() {
            if *limit > config.total_pages {
                return Err(ConfigError::LimitOutOfRange {
                    limit: *limit,
                    total: config.total_pages,
                });
            }
        }

        info!(
            "Host: {} pages, {} ticks, squeezer {}, workload {}, seed {}",
            config.total_pages,
            config.ticks,
            squeezer.name(),
            workload.name(),
            config.seed
        );

        let mm = Memory::new(config.total_pages, MemoryParams::from(&config));
        let vcpu = Vcpu::new(workload, config.work_probability, config.seed);
        Ok(Self {
            config,
            tick: 0,
            mm,
            vcpu,
            squeezer,
            scans: 0,
            exhausted_scans: 0,
        })
    }

    /// Build a host from controller and workload selections.
    pub fn with_kinds(
        config: SimConfig,
        squeezer: SqueezerKind,
        param: Option<u64>,
        workload: WorkloadKind,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let squeezer = Squeezer::new(squeezer, param, &config)?;
        let workload = workload::build(workload, config.total_pages, config.seed);
        Self::new(config, squeezer, workload)
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current tick; equals the number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn memory(&self) -> &Memory {
        &self.mm
    }

    pub fn vcpu(&self) -> &Vcpu {
        &self.vcpu
    }

    pub fn squeezer(&self) -> &Squeezer {
        &self.squeezer
    }

    /// Number of scans run so far.
    pub fn scans(&self) -> u64 {
        self.scans
    }

    /// Scans that ended still over the limit with no candidates left.
    pub fn exhausted_scans(&self) -> u64 {
        self.exhausted_scans
    }

    /// Fraction of elapsed ticks that completed a unit of work.
    pub fn work_ratio(&self) -> f64 {
        work_rate(self.vcpu.work_done(), self.tick)
    }

    pub fn is_finished(&self) -> bool {
        self.tick >= self.config.ticks
    }

    // ─── Execution ───────────────────────────────────────────────────

    /// Run to the configured tick count without observing events.
    pub fn run(&mut self) {
        self.run_observed(&mut NullSink);
    }

    /// Run to the configured tick count, emitting every event to `sink`.
    pub fn run_observed(&mut self, sink: &mut dyn EventSink) {
        info!(
            "Running simulation for {} ticks (tick {}→{})",
            self.config.ticks.saturating_sub(self.tick),
            self.tick,
            self.config.ticks
        );

        while !self.is_finished() {
            self.step(sink);
        }

        info!(
            "Simulation finished at tick {}: work {} ({:.2} %), limit {}, faults major={} minor={}",
            self.tick,
            self.vcpu.work_done(),
            self.work_ratio() * 100.0,
            self.mm.limit(),
            self.mm.major_faults(),
            self.mm.minor_faults()
        );
    }

    /// Execute exactly one tick.
    pub fn step(&mut self, sink: &mut dyn EventSink) {
        let now = self.tick;

        if now % self.config.scan_interval == 0 {
            sink.record(now, SimEvent::Scan);
            let stats = self.mm.scan(now, sink);
            self.scans += 1;
            if stats.exhausted {
                self.exhausted_scans += 1;
            }
        }

        if now % self.config.squeeze_interval == 0 {
            let limit = self.squeezer.squeeze(&mut self.mm, self.vcpu.work_done(), now);
            sink.record(now, SimEvent::Squeeze { limit });
        }

        self.vcpu.tick(&mut self.mm, now, sink);
        self.mm.swap_write(now, sink);
        self.tick += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecorder;
    use crate::page::PageState;
    use crate::vcpu::VcpuPort;
    use std::collections::HashMap;

    /// Touches PFNs 0, 1, 2, ... in order, wrapping at capacity.
    struct Sweep {
        next: usize,
    }

    impl Workload for Sweep {
        fn name(&self) -> &'static str {
            "sweep"
        }

        fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
            let pfn = self.next % vcpu.total_pages();
            self.next += 1;
            vcpu.access(pfn);
        }
    }

    fn small_config() -> SimConfig {
        SimConfig {
            total_pages: 16,
            ticks: 3000,
            scan_interval: 16,
            squeeze_interval: 100,
            pageout_time: 8,
            major_delay: 8,
            min_inactive: 2,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_invalid_config_before_running() {
        let zero = SimConfig {
            total_pages: 0,
            ..Default::default()
        };
        assert_eq!(
            Host::with_kinds(zero, SqueezerKind::Mk2, None, WorkloadKind::Idle).err(),
            Some(ConfigError::ZeroCapacity)
        );

        let no_ticks = SimConfig {
            ticks: 0,
            ..Default::default()
        };
        assert_eq!(
            Host::with_kinds(no_ticks, SqueezerKind::Mk2, None, WorkloadKind::Idle).err(),
            Some(ConfigError::ZeroTicks)
        );
    }

    #[test]
    fn rejects_static_limit_above_capacity() {
        let big = SimConfig {
            total_pages: 128,
            ..Default::default()
        };
        let squeezer = Squeezer::new(SqueezerKind::Static, Some(100), &big).unwrap();
        let result = Host::new(SimConfig::default(), squeezer, Box::new(Sweep { next: 0 }));
        assert_eq!(
            result.err(),
            Some(ConfigError::LimitOutOfRange {
                limit: 100,
                total: 64
            })
        );
    }

    #[test]
    fn scan_and_squeeze_fire_on_tick_zero() {
        let mut host =
            Host::with_kinds(small_config(), SqueezerKind::Simple, None, WorkloadKind::Idle)
                .unwrap();
        let mut rec = EventRecorder::new();
        host.step(&mut rec);

        let events = rec.events();
        assert_eq!(events[0], (0, SimEvent::Scan));
        assert!(matches!(events[1], (0, SimEvent::Squeeze { .. })));
        assert_eq!(host.tick(), 1);
        assert_eq!(host.scans(), 1);
        assert!(host.squeezer().series().is_empty());
    }

    #[test]
    fn runs_exactly_the_configured_ticks() {
        let mut host = Host::with_kinds(
            SimConfig {
                ticks: 1234,
                ..small_config()
            },
            SqueezerKind::Mk3,
            None,
            WorkloadKind::Uniform,
        )
        .unwrap();
        host.run();
        assert_eq!(host.tick(), 1234);
        assert!(host.is_finished());
        // Scans on 0, 16, ..., 1232.
        assert_eq!(host.scans(), 78);
        // Squeezes on 0, 100, ..., 1200; tick 0 is not recorded.
        assert_eq!(host.squeezer().series().len(), 12);
    }

    #[test]
    fn four_page_reclaim_scenario() {
        let config = SimConfig {
            total_pages: 4,
            ticks: 4,
            min_inactive: 2,
            min_active: 1,
            ..Default::default()
        };
        let squeezer = Squeezer::new(SqueezerKind::Static, Some(4), &config).unwrap();
        let mut host = Host::new(config, squeezer, Box::new(Sweep { next: 0 })).unwrap();
        host.run();

        assert_eq!(host.memory().allocated(), 4);
        assert_eq!(host.memory().minor_faults(), 4);
        assert_eq!(host.memory().major_faults(), 0);

        let now = host.tick();
        host.mm.set_limit(2);
        let stats = host.mm.scan(now, &mut NullSink);
        assert_eq!(stats.reclaimed, 2);
        assert_eq!(host.memory().allocated(), 2);
        assert_eq!(host.memory().swap_queue().len(), 2);
        for &pfn in host.memory().swap_queue() {
            assert_eq!(host.memory().page(pfn).state(), PageState::Unmapped);
        }
        assert!(host.memory().check_invariants().is_ok());
    }

    #[test]
    fn static_limit_of_ten_never_changes() {
        let config = SimConfig {
            ticks: 1000,
            squeeze_interval: 50,
            ..Default::default()
        };
        let mut host =
            Host::with_kinds(config, SqueezerKind::Static, Some(10), WorkloadKind::Uniform)
                .unwrap();
        while !host.is_finished() {
            host.step(&mut NullSink);
            assert_eq!(host.memory().limit(), 10);
        }
        assert!(host.memory().major_faults() > 0);
        assert!(host.squeezer().series().limits.iter().all(|&l| l == 10));
    }

    #[test]
    fn invariants_hold_every_tick_for_every_squeezer() {
        for kind in SqueezerKind::ALL {
            let param = kind.takes_parameter().then_some(8);
            let mut host =
                Host::with_kinds(small_config(), kind, param, WorkloadKind::Busy).unwrap();
            while !host.is_finished() {
                host.step(&mut NullSink);
                let mm = host.memory();
                if let Err(e) = mm.check_invariants() {
                    panic!("{} at tick {}: {}", kind, host.tick(), e);
                }
                assert!((1..=mm.total()).contains(&mm.limit()));
            }
        }
    }

    #[test]
    fn pages_wait_out_the_pageout_delay() {
        let config = small_config();
        let pageout_time = config.pageout_time;
        let mut host =
            Host::with_kinds(config, SqueezerKind::Mk3, None, WorkloadKind::Uniform).unwrap();
        let mut rec = EventRecorder::new();
        host.run_observed(&mut rec);

        let mut unmapped_at = HashMap::new();
        let mut pageouts = 0;
        for &(tick, event) in rec.events() {
            match event {
                SimEvent::Unmap { pfn } => {
                    unmapped_at.insert(pfn, tick);
                }
                SimEvent::Pageout { pfn } => {
                    let at = unmapped_at[&pfn];
                    assert!(tick >= at + pageout_time, "pfn {} unmapped {} paged {}", pfn, at, tick);
                    pageouts += 1;
                }
                _ => {}
            }
        }
        assert!(pageouts > 0);
    }

    #[test]
    fn faults_match_map_events() {
        let mut host =
            Host::with_kinds(small_config(), SqueezerKind::Mk1, None, WorkloadKind::Uniform)
                .unwrap();
        let mut rec = EventRecorder::new();
        host.run_observed(&mut rec);

        // Every major fault ends in a swap-in map, except one the vCPU may
        // still be waiting on.  A page paged out during a minor-fault wait
        // also swaps in, so maps can outnumber major faults.
        let swap_ins = rec.count(|e| matches!(e, SimEvent::Map { from: PageState::Paged, .. }));
        let major = host.memory().major_faults() as usize;
        assert!(major > 0);
        assert!(major <= swap_ins + 1);
        let first_touch = rec.count(|e| matches!(e, SimEvent::Map { from: PageState::Free, .. }));
        assert_eq!(first_touch, 16);
    }

    #[test]
    fn same_seed_same_run() {
        let run = |seed| {
            let config = SimConfig {
                seed,
                ..small_config()
            };
            let mut host =
                Host::with_kinds(config, SqueezerKind::Mk2, None, WorkloadKind::Rotate).unwrap();
            host.run();
            (
                host.vcpu().work_done(),
                host.squeezer().series().clone(),
                host.memory().access_counts(),
            )
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7).2, run(8).2);
    }

    #[test]
    fn idle_workload_does_no_work() {
        let mut host =
            Host::with_kinds(small_config(), SqueezerKind::Mk4, None, WorkloadKind::Idle)
                .unwrap();
        host.run();
        assert_eq!(host.vcpu().work_done(), 0);
        assert_eq!(host.work_ratio(), 0.0);
        assert_eq!(host.memory().allocated(), 0);
        assert_eq!(host.vcpu().idle_ticks(), 3000);
    }
}
