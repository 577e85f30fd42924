//! Reporting and command surface for SqueezeSim.
//!
//! Everything here reads a finished [`Host`](squeezesim_vmm::host::Host);
//! nothing feeds back into a running simulation.
//!
//! # Example Usage
//!
//! ```no_run
//! use squeezesim_report::report::{format_report, RunReport};
//! use squeezesim_vmm::config::{SimConfig, SqueezerKind, WorkloadKind};
//! use squeezesim_vmm::host::Host;
//!
//! let mut host = Host::with_kinds(
//!     SimConfig::default(),
//!     SqueezerKind::Mk2,
//!     None,
//!     WorkloadKind::Rotate,
//! )
//! .unwrap();
//! host.run();
//!
//! let report = RunReport::from_host(&host);
//! println!("{}", format_report(&report));
//! ```
//!
//! # Module Structure
//!
//! - [`report`] — Run report and its text rendering
//! - [`export`] — JSON save/load of run reports
//! - [`compare`] — Every controller against the same workload

pub mod compare;
pub mod export;
pub mod report;

pub use compare::{compare_all, format_comparison, ComparisonRow};
pub use export::{load_report, save_report, ExportError};
pub use report::{format_report, RunReport};
