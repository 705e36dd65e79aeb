//! Prometheus integration.
//!
//! # Submodules
//!
//! - `collector` - the request scoped collector reporting one fingerprint
//! - `prom` - process wide self metrics and text exposition helpers

pub mod collector;
pub mod prom;

pub use collector::{ProbeCollector, ProbeOutcome};
