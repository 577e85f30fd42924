//! Feedback controllers ("squeezers") for the memory limit.
//!
//! Once per squeeze interval the host hands the controller the fault
//! counts observed since the previous call.  The controller turns them
//! into a new limit in `[1, total]`, which [`Memory`] then reclaims
//! towards on subsequent scans.
//!
//! The control laws form a closed set ([`SqueezeLaw`]); each variant is a
//! thin stateful wrapper over the pure step functions in
//! [`crate::verified::squeeze`].  [`Squeezer`] adds the bookkeeping every
//! variant shares: the fault baseline and the telemetry series.

use crate::config::{ConfigError, SimConfig, SqueezerKind};
use crate::memory::Memory;
use crate::verified::reclaim::fault_delta;
use crate::verified::squeeze::{
    clamp_estimate, clamp_limit, ewma, mk1_step, proportional_step, simple_step, smoothed_step,
    window_mean, work_rate, EWMA_ALPHA, MOVING_AVERAGE_WINDOW,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Faults observed during one squeeze interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultDeltas {
    pub major: u64,
    pub minor: u64,
}

/// Per-interval fault targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultTargets {
    pub major: u64,
    pub minor: u64,
}

impl From<&SimConfig> for FaultTargets {
    fn from(config: &SimConfig) -> Self {
        Self {
            major: config.major_fault_limit,
            minor: config.minor_fault_limit,
        }
    }
}

/// Last-seen cumulative fault counters.
#[derive(Debug, Clone, Copy, Default)]
struct FaultBaseline {
    major: u64,
    minor: u64,
}

impl FaultBaseline {
    /// Faults since the previous call; moves the baseline forward.
    fn count(&mut self, mm: &Memory) -> FaultDeltas {
        let deltas = FaultDeltas {
            major: fault_delta(mm.major_faults(), self.major),
            minor: fault_delta(mm.minor_faults(), self.minor),
        };
        self.major = mm.major_faults();
        self.minor = mm.minor_faults();
        deltas
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Control laws
// ═══════════════════════════════════════════════════════════════════════

/// One control law and the state it carries between intervals.
#[derive(Debug, Clone, PartialEq)]
pub enum SqueezeLaw {
    /// Fixed limit; faults are only recorded.
    Static { limit: usize },
    /// One page per interval towards the major-fault target.
    Simple,
    /// Two pages on major faults, one page on minor faults at target.
    Mk1,
    /// Proportional proposal averaged over a sliding window.
    Mk2 { window: VecDeque<usize> },
    /// Proportional proposal applied directly.
    Mk3,
    /// Step driven by an exponentially-smoothed fault count.
    Mk4 { faults: f64, estimate: f64 },
}

impl SqueezeLaw {
    /// Build the law for `kind`.
    ///
    /// `param` is the fixed limit for [`SqueezerKind::Static`] and must be
    /// absent for every other kind.
    pub fn new(kind: SqueezerKind, param: Option<u64>, total: usize) -> Result<Self, ConfigError> {
        if !kind.takes_parameter() && param.is_some() {
            return Err(ConfigError::UnexpectedParameter(kind.name()));
        }
        let law = match kind {
            SqueezerKind::Static => {
                let raw = param.ok_or(ConfigError::MissingParameter(kind.name()))?;
                let limit = usize::try_from(raw).unwrap_or(usize::MAX);
                if !(1..=total).contains(&limit) {
                    return Err(ConfigError::LimitOutOfRange { limit, total });
                }
                Self::Static { limit }
            }
            SqueezerKind::Simple => Self::Simple,
            SqueezerKind::Mk1 => Self::Mk1,
            SqueezerKind::Mk2 => Self::Mk2 {
                window: VecDeque::with_capacity(MOVING_AVERAGE_WINDOW + 1),
            },
            SqueezerKind::Mk3 => Self::Mk3,
            SqueezerKind::Mk4 => Self::Mk4 {
                faults: 0.0,
                estimate: total as f64,
            },
        };
        Ok(law)
    }

    pub fn kind(&self) -> SqueezerKind {
        match self {
            Self::Static { .. } => SqueezerKind::Static,
            Self::Simple => SqueezerKind::Simple,
            Self::Mk1 => SqueezerKind::Mk1,
            Self::Mk2 { .. } => SqueezerKind::Mk2,
            Self::Mk3 => SqueezerKind::Mk3,
            Self::Mk4 { .. } => SqueezerKind::Mk4,
        }
    }

    /// Compute the next limit from this interval's faults.
    ///
    /// The result always lies in `[1, total]`.
    pub fn squeeze(
        &mut self,
        faults: FaultDeltas,
        current: usize,
        total: usize,
        targets: FaultTargets,
    ) -> usize {
        let current_i = i64::try_from(current).unwrap_or(i64::MAX);
        let next = match self {
            Self::Static { limit } => *limit,
            Self::Simple => clamp_limit(simple_step(current_i, faults.major, targets.major), total),
            Self::Mk1 => clamp_limit(
                mk1_step(current_i, faults.major, faults.minor, targets.major, targets.minor),
                total,
            ),
            Self::Mk2 { window } => {
                let proposal =
                    clamp_limit(proportional_step(current_i, faults.major, targets.major), total);
                window.push_back(proposal);
                if window.len() > MOVING_AVERAGE_WINDOW {
                    window.pop_front();
                }
                let mean = window_mean(window.make_contiguous()).unwrap_or(proposal);
                clamp_limit(mean as i64, total)
            }
            Self::Mk3 => {
                clamp_limit(proportional_step(current_i, faults.major, targets.major), total)
            }
            Self::Mk4 { faults: smoothed, estimate } => {
                *smoothed = ewma(*smoothed, faults.major as f64, EWMA_ALPHA);
                *estimate = clamp_estimate(smoothed_step(*estimate, *smoothed, targets.major), total);
                clamp_limit(estimate.floor() as i64, total)
            }
        };

        debug_assert!((1..=total).contains(&next), "squeeze: limit {next} outside [1, {total}]");
        next
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Telemetry
// ═══════════════════════════════════════════════════════════════════════

/// Per-interval telemetry; every vector has one entry per completed
/// control interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqueezeSeries {
    pub ticks: Vec<u64>,
    pub limits: Vec<usize>,
    pub work_rates: Vec<f64>,
    pub major_faults: Vec<u64>,
    pub minor_faults: Vec<u64>,
}

impl SqueezeSeries {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    fn push(&mut self, tick: u64, limit: usize, work_rate: f64, faults: FaultDeltas) {
        self.ticks.push(tick);
        self.limits.push(limit);
        self.work_rates.push(work_rate);
        self.major_faults.push(faults.major);
        self.minor_faults.push(faults.minor);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Squeezer
// ═══════════════════════════════════════════════════════════════════════

/// A control law plus its fault baseline and telemetry.
#[derive(Debug, Clone)]
pub struct Squeezer {
    law: SqueezeLaw,
    targets: FaultTargets,
    baseline: FaultBaseline,
    series: SqueezeSeries,
    last_work: u64,
    last_tick: u64,
}

impl Squeezer {
    /// Build the squeezer named by `kind` for the run described by
    /// `config`.
    pub fn new(
        kind: SqueezerKind,
        param: Option<u64>,
        config: &SimConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            law: SqueezeLaw::new(kind, param, config.total_pages)?,
            targets: FaultTargets::from(config),
            baseline: FaultBaseline::default(),
            series: SqueezeSeries::default(),
            last_work: 0,
            last_tick: 0,
        })
    }

    /// Name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        self.law.kind().name()
    }

    pub fn kind(&self) -> SqueezerKind {
        self.law.kind()
    }

    pub fn law(&self) -> &SqueezeLaw {
        &self.law
    }

    pub fn series(&self) -> &SqueezeSeries {
        &self.series
    }

    /// Faults since the previous call.  Resets the baseline.
    pub fn count_faults(&mut self, mm: &Memory) -> FaultDeltas {
        self.baseline.count(mm)
    }

    /// Run one control step against `mm` and return the new limit.
    ///
    /// `work_done` is the vCPU's cumulative completed work, used only for
    /// the telemetry series.
    pub fn squeeze(&mut self, mm: &mut Memory, work_done: u64, now: u64) -> usize {
        let faults = self.count_faults(mm);
        let old = mm.limit();
        let new = self.law.squeeze(faults, old, mm.total(), self.targets);
        mm.set_limit(new);
        debug!(
            "tick {}: squeeze {} major={} minor={} limit {} -> {}",
            now,
            self.name(),
            faults.major,
            faults.minor,
            old,
            new
        );
        self.record(now, new, work_done, faults);
        new
    }

    /// Append the interval ending at `now`.  Tick 0 only establishes the
    /// baseline.
    fn record(&mut self, now: u64, limit: usize, work_done: u64, faults: FaultDeltas) {
        if now == 0 {
            return;
        }
        let rate = work_rate(
            work_done.saturating_sub(self.last_work),
            now.saturating_sub(self.last_tick),
        );
        self.series.push(now, limit, rate, faults);
        self.last_work = work_done;
        self.last_tick = now;
    }
}
