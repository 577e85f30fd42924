//! Side-by-side comparison of every controller on the same workload.
//!
//! Each variant gets a fresh host built from the same config and seed, so
//! the workload's access stream and the work arrivals are identical across
//! rows until the controllers' limits make the runs diverge.

use crate::report::RunReport;
use log::info;
use squeezesim_vmm::config::{ConfigError, SimConfig, SqueezerKind, WorkloadKind};
use squeezesim_vmm::host::Host;

/// One controller's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub squeezer: String,
    pub work_ratio: f64,
    pub final_limit: usize,
    /// Mean published limit over the completed intervals.
    pub mean_limit: f64,
    pub major_faults: u64,
    pub minor_faults: u64,
}

impl From<&RunReport> for ComparisonRow {
    fn from(report: &RunReport) -> Self {
        let limits = &report.series.limits;
        let mean_limit = if limits.is_empty() {
            report.final_limit as f64
        } else {
            limits.iter().sum::<usize>() as f64 / limits.len() as f64
        };
        Self {
            squeezer: report.squeezer.clone(),
            work_ratio: report.work_ratio,
            final_limit: report.final_limit,
            mean_limit,
            major_faults: report.major_faults,
            minor_faults: report.minor_faults,
        }
    }
}

/// Run every controller against `workload`.
///
/// Parameterless variants run as-is; `static` runs at full capacity as
/// the unsqueezed baseline.
pub fn compare_all(
    config: &SimConfig,
    workload: WorkloadKind,
) -> Result<Vec<ComparisonRow>, ConfigError> {
    config.validate()?;

    let mut rows = Vec::with_capacity(SqueezerKind::ALL.len());
    for kind in SqueezerKind::ALL {
        let param = kind.takes_parameter().then_some(config.total_pages as u64);
        let mut host = Host::with_kinds(config.clone(), kind, param, workload)?;
        host.run();
        let report = RunReport::from_host(&host);
        info!("compare: {} -> {}", kind, report.summary_line());
        rows.push(ComparisonRow::from(&report));
    }
    Ok(rows)
}

/// Format comparison rows as a table.
pub fn format_comparison(rows: &[ComparisonRow]) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  SqueezeSim Controller Comparison\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    output.push_str("squeezer   work %   mean limit   final limit     major     minor\n");
    for row in rows {
        output.push_str(&format!(
            "{:<8} {:>8.2} {:>12.1} {:>13} {:>9} {:>9}\n",
            row.squeezer,
            row.work_ratio * 100.0,
            row.mean_limit,
            row.final_limit,
            row.major_faults,
            row.minor_faults
        ));
    }
    output.push('\n');

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            total_pages: 32,
            ticks: 4000,
            ..Default::default()
        }
    }

    #[test]
    fn test_compare_all_runs_every_variant() {
        let rows = compare_all(&config(), WorkloadKind::Busy).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.squeezer.as_str()).collect();
        assert_eq!(names, vec!["static", "simple", "mk1", "mk2", "mk3", "mk4"]);

        let baseline = &rows[0];
        assert_eq!(baseline.final_limit, 32);
        assert_eq!(baseline.mean_limit, 32.0);
        for row in &rows {
            assert!((1..=32).contains(&row.final_limit));
            assert!((0.0..=1.0).contains(&row.work_ratio));
        }
    }

    #[test]
    fn test_compare_all_rejects_bad_config() {
        let bad = SimConfig {
            ticks: 0,
            ..config()
        };
        assert_eq!(
            compare_all(&bad, WorkloadKind::Idle),
            Err(ConfigError::ZeroTicks)
        );
    }

    #[test]
    fn test_format_comparison() {
        let rows = vec![ComparisonRow {
            squeezer: "mk2".to_string(),
            work_ratio: 0.875,
            final_limit: 12,
            mean_limit: 14.5,
            major_faults: 20,
            minor_faults: 40,
        }];
        let formatted = format_comparison(&rows);
        assert!(formatted.contains("Controller Comparison"));
        assert!(formatted.contains("mk2"));
        assert!(formatted.contains("87.50"));
        assert!(formatted.contains("14.5"));
    }
}
