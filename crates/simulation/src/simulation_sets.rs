//! Deterministic simulation ordering via `SystemSet` phases.
//!
//! Every system in `FixedUpdate` belongs to one of these sets, configured as
//! a chain so inter-plugin ordering is explicit rather than an accident of
//! registration order:
//!
//! ```text
//! PreSim  →  Simulation  →  PostSim
//! ```
//!
//! * **PreSim** – clock advance and per-tick bookkeeping (dwell times).
//! * **Simulation** – live-state maintenance: occupancy stamping and any
//!   host-driven train/route updates.
//! * **PostSim** – read-only analysis and reporting: the suggestion engine
//!   and its command handling. PostSim systems see a settled tick.

use bevy::prelude::*;

/// Ordered phases for systems running in the `FixedUpdate` schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Clock and per-tick counters.
    PreSim,
    /// Core state maintenance (occupancy, host mutations).
    Simulation,
    /// Analysis over the settled tick (suggestions, reporting).
    PostSim,
}
