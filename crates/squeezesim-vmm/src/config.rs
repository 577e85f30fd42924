//! Simulation configuration and configuration errors.
//!
//! [`SimConfig`] carries every tunable of a run.  The [`Default`] impl
//! holds the reference constants; callers override individual fields
//! with struct-update syntax:
//!
//! ```
//! use squeezesim_vmm::config::SimConfig;
//!
//! let config = SimConfig {
//!     total_pages: 128,
//!     ticks: 50_000,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! All validation happens before the first tick.  A config that passes
//! [`SimConfig::validate`] can be run to completion without any further
//! recoverable error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors detected while building a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("memory capacity must be at least one page")]
    ZeroCapacity,

    #[error("tick count must be positive")]
    ZeroTicks,

    #[error("{0} interval must be positive")]
    ZeroInterval(&'static str),

    #[error("{0} fault delay must be positive")]
    ZeroDelay(&'static str),

    #[error("minimum inactive list size must be at least one page")]
    ZeroMinInactive,

    #[error("work probability {0} is outside [0, 1]")]
    WorkProbability(f64),

    #[error("unknown squeezer '{0}' (expected one of: static, simple, mk1, mk2, mk3, mk4)")]
    UnknownSqueezer(String),

    #[error("unknown workload '{0}' (expected one of: idle, uniform, normal, busy, busy-uniform, rotate)")]
    UnknownWorkload(String),

    #[error("squeezer '{0}' requires a numeric parameter")]
    MissingParameter(&'static str),

    #[error("squeezer '{0}' takes no parameter")]
    UnexpectedParameter(&'static str),

    #[error("limit {limit} is outside [1, {total}]")]
    LimitOutOfRange { limit: usize, total: usize },
}

/// Configuration for a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Total number of page frames (fixed for the whole run).
    pub total_pages: usize,
    /// Number of ticks to simulate.
    pub ticks: u64,
    /// Master seed for every random stream in the run.
    pub seed: u64,
    /// Ticks a vCPU stays blocked on a minor fault.
    pub minor_delay: u32,
    /// Ticks a vCPU stays blocked on a major fault (swap-in).
    pub major_delay: u32,
    /// Ticks between unmapping a page and writing it to backing store.
    pub pageout_time: u64,
    /// Ticks between aging/reclaim scans.
    pub scan_interval: u64,
    /// Ticks between controller invocations.
    pub squeeze_interval: u64,
    /// Aging stops once the inactive list holds this many pages.
    pub min_inactive: usize,
    /// Aging stops once the active list drops below this many pages.
    pub min_active: usize,
    /// Target major faults per squeeze interval.
    pub major_fault_limit: u64,
    /// Target minor faults per squeeze interval (Mk1 only).
    pub minor_fault_limit: u64,
    /// Probability that a unit of work arrives on any given tick.
    pub work_probability: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_pages: 64,
            ticks: 10_000,
            seed: 42,
            minor_delay: 1,
            major_delay: 32,
            pageout_time: 32,
            scan_interval: 256,
            squeeze_interval: 1000,
            min_inactive: 4,
            min_active: 1,
            major_fault_limit: 2,
            minor_fault_limit: 5,
            work_probability: 1.0,
        }
    }
}

impl SimConfig {
    /// Check every field that would make the run meaningless or hang.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_pages == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.ticks == 0 {
            return Err(ConfigError::ZeroTicks);
        }
        if self.scan_interval == 0 {
            return Err(ConfigError::ZeroInterval("scan"));
        }
        if self.squeeze_interval == 0 {
            return Err(ConfigError::ZeroInterval("squeeze"));
        }
        if self.minor_delay == 0 {
            return Err(ConfigError::ZeroDelay("minor"));
        }
        if self.major_delay == 0 {
            return Err(ConfigError::ZeroDelay("major"));
        }
        if self.min_inactive == 0 {
            // Aging would never demote, leaving reclaim without candidates.
            return Err(ConfigError::ZeroMinInactive);
        }
        if !(0.0..=1.0).contains(&self.work_probability) {
            // NaN fails `contains` too.
            return Err(ConfigError::WorkProbability(self.work_probability));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Named selections
// ═══════════════════════════════════════════════════════════════════════

/// Controller variant, selected by name on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqueezerKind {
    Static,
    Simple,
    Mk1,
    Mk2,
    Mk3,
    Mk4,
}

impl SqueezerKind {
    /// Every variant, in command-line order.
    pub const ALL: [SqueezerKind; 6] = [
        SqueezerKind::Static,
        SqueezerKind::Simple,
        SqueezerKind::Mk1,
        SqueezerKind::Mk2,
        SqueezerKind::Mk3,
        SqueezerKind::Mk4,
    ];

    /// Parse a command-line name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "static" => Ok(Self::Static),
            "simple" => Ok(Self::Simple),
            "mk1" => Ok(Self::Mk1),
            "mk2" => Ok(Self::Mk2),
            "mk3" => Ok(Self::Mk3),
            "mk4" => Ok(Self::Mk4),
            other => Err(ConfigError::UnknownSqueezer(other.to_string())),
        }
    }

    /// The command-line name of this variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Simple => "simple",
            Self::Mk1 => "mk1",
            Self::Mk2 => "mk2",
            Self::Mk3 => "mk3",
            Self::Mk4 => "mk4",
        }
    }

    /// Whether the variant needs a numeric parameter.
    pub fn takes_parameter(&self) -> bool {
        matches!(self, Self::Static)
    }
}

impl fmt::Display for SqueezerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Workload generator, selected by name on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    Idle,
    Uniform,
    Normal,
    Busy,
    BusyUniform,
    Rotate,
}

impl WorkloadKind {
    /// Parse a command-line name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "idle" => Ok(Self::Idle),
            "uniform" => Ok(Self::Uniform),
            "normal" => Ok(Self::Normal),
            "busy" => Ok(Self::Busy),
            "busy-uniform" => Ok(Self::BusyUniform),
            "rotate" => Ok(Self::Rotate),
            other => Err(ConfigError::UnknownWorkload(other.to_string())),
        }
    }

    /// The command-line name of this workload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uniform => "uniform",
            Self::Normal => "normal",
            Self::Busy => "busy",
            Self::BusyUniform => "busy-uniform",
            Self::Rotate => "rotate",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = SimConfig {
            total_pages: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn zero_ticks_rejected() {
        let config = SimConfig {
            ticks: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTicks));
    }

    #[test]
    fn zero_intervals_rejected() {
        let config = SimConfig {
            scan_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval("scan")));

        let config = SimConfig {
            squeeze_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval("squeeze")));
    }

    #[test]
    fn zero_delays_rejected() {
        let config = SimConfig {
            major_delay: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDelay("major")));
    }

    #[test]
    fn zero_min_inactive_rejected() {
        let config = SimConfig {
            min_inactive: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMinInactive));
        // A zero active floor is still allowed.
        let config = SimConfig {
            min_active: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nan_work_probability_rejected() {
        let config = SimConfig {
            work_probability: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WorkProbability(_))
        ));
    }

    #[test]
    fn squeezer_names_round_trip() {
        for kind in SqueezerKind::ALL {
            assert_eq!(SqueezerKind::from_name(kind.name()), Ok(kind));
        }
    }

    #[test]
    fn unknown_squeezer_rejected() {
        let err = SqueezerKind::from_name("mk5").unwrap_err();
        assert_eq!(err, ConfigError::UnknownSqueezer("mk5".to_string()));
        assert!(err.to_string().contains("mk5"));
    }

    #[test]
    fn unknown_workload_rejected() {
        assert!(WorkloadKind::from_name("zipf").is_err());
        assert_eq!(WorkloadKind::from_name("busy-uniform"), Ok(WorkloadKind::BusyUniform));
    }
}
