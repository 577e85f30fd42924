//! Run reports for completed simulations.

use serde::{Deserialize, Serialize};
use squeezesim_vmm::config::SimConfig;
use squeezesim_vmm::host::Host;
use squeezesim_vmm::squeezer::SqueezeSeries;

/// Rows of the interval table shown before truncating.
const MAX_INTERVAL_ROWS: usize = 20;

/// Bars in the access histogram.
const HISTOGRAM_BARS: usize = 16;

/// Width of the longest histogram bar.
const HISTOGRAM_WIDTH: usize = 40;

/// Everything worth keeping from a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: SimConfig,
    pub squeezer: String,
    pub workload: String,
    pub ticks: u64,
    pub work_done: u64,
    pub work_ratio: f64,
    pub final_limit: usize,
    pub major_faults: u64,
    pub minor_faults: u64,
    pub scans: u64,
    pub exhausted_scans: u64,
    pub series: SqueezeSeries,
    /// Per-page access counts, most-accessed first.
    pub access_counts: Vec<u64>,
}

impl RunReport {
    /// Snapshot the telemetry of `host`.
    pub fn from_host(host: &Host) -> Self {
        let mm = host.memory();
        let mut access_counts = mm.access_counts();
        access_counts.sort_unstable_by(|a, b| b.cmp(a));

        Self {
            config: host.config().clone(),
            squeezer: host.squeezer().name().to_string(),
            workload: host.vcpu().workload_name().to_string(),
            ticks: host.tick(),
            work_done: host.vcpu().work_done(),
            work_ratio: host.work_ratio(),
            final_limit: mm.limit(),
            major_faults: mm.major_faults(),
            minor_faults: mm.minor_faults(),
            scans: host.scans(),
            exhausted_scans: host.exhausted_scans(),
            series: host.squeezer().series().clone(),
            access_counts,
        }
    }

    /// The closing line printed after every run.
    pub fn summary_line(&self) -> String {
        format!(
            "{} / {} ({:.2} %)",
            self.work_done,
            self.ticks,
            self.work_ratio * 100.0
        )
    }

    /// Pages touched at least once.
    pub fn pages_touched(&self) -> usize {
        self.access_counts.iter().filter(|&&c| c > 0).count()
    }
}

/// Format a run report for human consumption.
pub fn format_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  SqueezeSim Run Report\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    output.push_str(&format!("Squeezer:               {}\n", report.squeezer));
    output.push_str(&format!("Workload:               {}\n", report.workload));
    output.push_str(&format!("Seed:                   {}\n", report.config.seed));
    output.push_str(&format!("Memory:                 {} pages\n", report.config.total_pages));
    output.push_str(&format!("Ticks:                  {}\n", report.ticks));
    output.push_str(&format!(
        "Work done:              {} ({:.2} %)\n",
        report.work_done,
        report.work_ratio * 100.0
    ));
    output.push_str(&format!("Final limit:            {} pages\n", report.final_limit));
    output.push('\n');

    output.push_str("─── Faults and Reclaim ────────────────────────────────────────────────\n");
    output.push_str(&format!("Major faults:           {}\n", report.major_faults));
    output.push_str(&format!("Minor faults:           {}\n", report.minor_faults));
    output.push_str(&format!("Scans:                  {}\n", report.scans));
    if report.exhausted_scans > 0 {
        output.push_str(&format!(
            "Scans left over limit:  {}\n",
            report.exhausted_scans
        ));
    }
    output.push('\n');

    output.push_str(&format_intervals(&report.series));
    output.push_str(&format_histogram(&report.access_counts));

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");

    output
}

/// Format the per-interval controller table.
pub fn format_intervals(series: &SqueezeSeries) -> String {
    let mut output = String::new();

    if series.is_empty() {
        output.push_str("─── No Control Intervals ──────────────────────────────────────────────\n");
        output.push_str("The run ended before the first interval completed.\n\n");
        return output;
    }

    output.push_str("─── Control Intervals ─────────────────────────────────────────────────\n");
    output.push_str("      tick   limit   work %   major   minor\n");
    for i in 0..series.len().min(MAX_INTERVAL_ROWS) {
        output.push_str(&format!(
            "{:>10} {:>7} {:>8.2} {:>7} {:>7}\n",
            series.ticks[i],
            series.limits[i],
            series.work_rates[i] * 100.0,
            series.major_faults[i],
            series.minor_faults[i]
        ));
    }
    if series.len() > MAX_INTERVAL_ROWS {
        output.push_str(&format!(
            "       ... and {} more intervals\n",
            series.len() - MAX_INTERVAL_ROWS
        ));
    }
    output.push('\n');
    output
}

/// Format per-page access counts (sorted descending) as a bar chart.
///
/// Pages are grouped into at most [`HISTOGRAM_BARS`] buckets; each bar
/// shows the mean count of its bucket.
pub fn format_histogram(access_counts: &[u64]) -> String {
    let mut output = String::new();
    output.push_str("─── Page Accesses (most accessed first) ───────────────────────────────\n");

    let max = access_counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        output.push_str("No pages were accessed.\n\n");
        return output;
    }

    let bucket = access_counts.len().div_ceil(HISTOGRAM_BARS);
    for (i, chunk) in access_counts.chunks(bucket).enumerate() {
        let mean = chunk.iter().sum::<u64>() / chunk.len() as u64;
        let width = (mean as u128 * HISTOGRAM_WIDTH as u128 / max as u128) as usize;
        let first = i * bucket;
        output.push_str(&format!(
            "{:>5}-{:<5} {:>9} {}\n",
            first,
            first + chunk.len() - 1,
            mean,
            "#".repeat(width)
        ));
    }
    output.push('\n');
    output
}
