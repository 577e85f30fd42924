//! Page-access workload generators.
//!
//! A [`Workload`] decides, each tick the vCPU has pending work, which page
//! to touch.  Implementations own their random stream and any
//! precomputed state (such as a sampled busy set); nothing is regenerated
//! per tick.
//!
//! | Workload                   | Access pattern                                       |
//! |----------------------------|------------------------------------------------------|
//! | [`IdleWorkload`]           | never accesses                                       |
//! | [`UniformWorkload`]        | uniform over all pages                               |
//! | [`NormalWorkload`]         | normal around the middle page                        |
//! | [`BusySetWorkload`]        | normal over a fixed busy subset, rest never touched  |
//! | [`BusySetUniformWorkload`] | uniform over a fixed busy subset                     |
//! | [`RotateWorkload`]         | switches between sub-workloads every `period` ticks  |

use crate::config::WorkloadKind;
use crate::rng;
use crate::vcpu::VcpuPort;
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::f64::consts::PI;

/// Period of the default rotating workload, in ticks.
pub const DEFAULT_ROTATE_PERIOD: u64 = 100_000;

/// Idle ratios of the default rotating workload's busy sets.
pub const DEFAULT_ROTATE_IDLE_RATIOS: [f64; 2] = [0.5, 0.25];

/// Idle ratio used by the single busy-set workloads.
pub const DEFAULT_IDLE_RATIO: f64 = 0.5;

/// A page-access pattern.
pub trait Workload {
    /// Short name for reports.
    fn name(&self) -> &'static str;

    /// Act on behalf of the vCPU for one tick: call
    /// [`VcpuPort::access`] with a PFN in `0..vcpu.total_pages()`, or
    /// [`VcpuPort::idle`].
    fn tick(&mut self, vcpu: &mut VcpuPort<'_>);
}

/// Draw from N(`mean`, `sigma`) with the Box–Muller transform.
fn sample_normal(rng: &mut ChaCha20Rng, mean: f64, sigma: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + sigma * z
}

/// Draw `floor(N(mean, sigma))` until it lands in `0..n`.
fn sample_index(rng: &mut ChaCha20Rng, n: usize, mean: f64, sigma: f64) -> usize {
    debug_assert!(n > 0);
    loop {
        let x = sample_normal(rng, mean, sigma).floor();
        if x >= 0.0 && x < n as f64 {
            return x as usize;
        }
    }
}

/// Sample the busy subset for an idle ratio.
///
/// Keeps `floor((1 - idle_ratio) * total)` distinct pages, at least one.
fn sample_busy_set(rng: &mut ChaCha20Rng, total: usize, idle_ratio: f64) -> Vec<usize> {
    let ratio = idle_ratio.clamp(0.0, 1.0);
    let busy = (((1.0 - ratio) * total as f64).floor() as usize).clamp(1, total);
    index::sample(rng, total, busy).into_vec()
}

// ═══════════════════════════════════════════════════════════════════════
//  Simple patterns
// ═══════════════════════════════════════════════════════════════════════

/// Never touches memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleWorkload;

impl Workload for IdleWorkload {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        vcpu.idle();
    }
}

/// Uniform over every page.
pub struct UniformWorkload {
    rng: ChaCha20Rng,
}

impl UniformWorkload {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rng::derive(seed, rng::DOMAIN_WORKLOAD),
        }
    }
}

impl Workload for UniformWorkload {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        let pfn = self.rng.gen_range(0..vcpu.total_pages());
        vcpu.access(pfn);
    }
}

/// Normal around the middle page with standard deviation `sigma`.
pub struct NormalWorkload {
    sigma: f64,
    rng: ChaCha20Rng,
}

impl NormalWorkload {
    pub fn new(sigma: f64, seed: u64) -> Self {
        Self {
            sigma: sigma.abs(),
            rng: rng::derive(seed, rng::DOMAIN_WORKLOAD),
        }
    }
}

impl Workload for NormalWorkload {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        let total = vcpu.total_pages();
        let mean = (total / 2) as f64;
        let pfn = sample_index(&mut self.rng, total, mean, self.sigma);
        vcpu.access(pfn);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Busy-set patterns
// ═══════════════════════════════════════════════════════════════════════

/// Splits memory into busy and idle pages; busy pages are used with a
/// normal distribution over the busy set, idle pages never.
///
/// Models a desktop guest with a small hot working set.
pub struct BusySetWorkload {
    busy: Vec<usize>,
    rng: ChaCha20Rng,
}

impl BusySetWorkload {
    pub fn new(total: usize, idle_ratio: f64, seed: u64) -> Self {
        Self::with_domain(total, idle_ratio, seed, rng::DOMAIN_WORKLOAD)
    }

    fn with_domain(total: usize, idle_ratio: f64, seed: u64, domain: u64) -> Self {
        let mut rng = rng::derive(seed, domain);
        let busy = sample_busy_set(&mut rng, total, idle_ratio);
        Self { busy, rng }
    }

    /// The sampled busy pages.
    pub fn busy_pages(&self) -> &[usize] {
        &self.busy
    }
}

impl Workload for BusySetWorkload {
    fn name(&self) -> &'static str {
        "busy"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        let n = self.busy.len();
        let idx = sample_index(&mut self.rng, n, n as f64 / 2.0, n as f64 / 8.0);
        vcpu.access(self.busy[idx]);
    }
}

/// Splits memory into busy and idle pages; busy pages are used uniformly.
pub struct BusySetUniformWorkload {
    busy: Vec<usize>,
    rng: ChaCha20Rng,
}

impl BusySetUniformWorkload {
    pub fn new(total: usize, idle_ratio: f64, seed: u64) -> Self {
        let mut rng = rng::derive(seed, rng::DOMAIN_WORKLOAD);
        let busy = sample_busy_set(&mut rng, total, idle_ratio);
        Self { busy, rng }
    }

    pub fn busy_pages(&self) -> &[usize] {
        &self.busy
    }
}

impl Workload for BusySetUniformWorkload {
    fn name(&self) -> &'static str {
        "busy-uniform"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        let idx = self.rng.gen_range(0..self.busy.len());
        vcpu.access(self.busy[idx]);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Rotation
// ═══════════════════════════════════════════════════════════════════════

/// Rotates between sub-workloads on a fixed period.
pub struct RotateWorkload {
    workloads: Vec<Box<dyn Workload>>,
    period: u64,
}

impl RotateWorkload {
    /// `workloads` must not be empty; a zero `period` is treated as 1.
    pub fn new(workloads: Vec<Box<dyn Workload>>, period: u64) -> Self {
        assert!(!workloads.is_empty(), "rotation needs at least one workload");
        Self {
            workloads,
            period: period.max(1),
        }
    }

    /// Index of the sub-workload active at `tick`.
    pub fn current(&self, tick: u64) -> usize {
        ((tick / self.period) % self.workloads.len() as u64) as usize
    }
}

impl Workload for RotateWorkload {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn tick(&mut self, vcpu: &mut VcpuPort<'_>) {
        let idx = self.current(vcpu.now());
        self.workloads[idx].tick(vcpu);
    }
}

/// Build the workload selected by `kind` for `total` pages.
pub fn build(kind: WorkloadKind, total: usize, seed: u64) -> Box<dyn Workload> {
    match kind {
        WorkloadKind::Idle => Box::new(IdleWorkload),
        WorkloadKind::Uniform => Box::new(UniformWorkload::new(seed)),
        WorkloadKind::Normal => Box::new(NormalWorkload::new(total as f64 / 8.0, seed)),
        WorkloadKind::Busy => Box::new(BusySetWorkload::new(total, DEFAULT_IDLE_RATIO, seed)),
        WorkloadKind::BusyUniform => {
            Box::new(BusySetUniformWorkload::new(total, DEFAULT_IDLE_RATIO, seed))
        }
        WorkloadKind::Rotate => {
            let workloads = DEFAULT_ROTATE_IDLE_RATIOS
                .iter()
                .enumerate()
                .map(|(i, &ratio)| {
                    Box::new(BusySetWorkload::with_domain(
                        total,
                        ratio,
                        seed,
                        rng::DOMAIN_WORKLOAD + i as u64,
                    )) as Box<dyn Workload>
                })
                .collect();
            Box::new(RotateWorkload::new(workloads, DEFAULT_ROTATE_PERIOD))
        }
    }
}
