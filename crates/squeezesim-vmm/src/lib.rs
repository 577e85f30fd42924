//! SqueezeSim VMM — a deterministic simulator of hypervisor memory reclaim.
//!
//! A single guest vCPU runs a page-access workload against a fixed pool of
//! page frames.  The host ages pages on active/inactive lists, unmaps them
//! when the resident set exceeds a limit, and writes them to backing store
//! after a delay.  A feedback controller (a "squeezer") moves the limit
//! once per interval based on the faults it observed, trying to shrink the
//! guest's footprint without starving it.
//!
//! Every random stream is derived from one seed, so a run is fully
//! reproducible.
//!
//! # Architecture
//!
//! - [`page`] — per-frame state machine
//! - [`memory`] — page array, aging lists, reclaim, delayed swap-out
//! - [`vcpu`] — work arrival, blocking on faults, workload dispatch
//! - [`workload`] — page-access generators
//! - [`squeezer`] — limit controllers and their telemetry
//! - [`host`] — the tick loop tying everything together
//! - [`events`] — per-tick event stream and its sinks
//! - [`config`] — run configuration and configuration errors
//! - [`rng`] — per-consumer random streams
//! - [`verified`] — pure functions the effectful modules delegate to

pub mod config;
pub mod events;
pub mod host;
pub mod memory;
pub mod page;
pub mod rng;
pub mod squeezer;
pub mod vcpu;
pub mod verified;
pub mod workload;

pub use config::{ConfigError, SimConfig, SqueezerKind, WorkloadKind};
pub use host::Host;
