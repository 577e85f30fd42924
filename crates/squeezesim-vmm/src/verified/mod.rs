//! Pure functions extracted from the simulation's effectful modules.
//!
//! Each sub-module holds the arithmetic core of one subsystem as
//! functions with **no I/O, no randomness and no mutation of shared
//! state**: values in, values out.  The owning modules delegate to them,
//! which keeps the decision logic testable on its own and makes the
//! control laws easy to compare side by side.
//!
//! - [`squeeze`] — controller control laws and limit clamping
//! - [`reclaim`] — aging, reclaim and swap-out predicates

pub mod reclaim;
pub mod squeeze;
