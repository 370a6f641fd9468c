//! Railway traffic-control simulation core.
//!
//! The authoritative state (track topology, signals, routes, trains,
//! timetables, clock) lives in identifier-keyed resource tables; systems on
//! `FixedUpdate` advance the clock, maintain occupancy and run the
//! suggestion engine over the settled state of each tick. Operator commands
//! enter as events and results leave as events, so a delivery shell never
//! touches simulation internals directly.

use bevy::prelude::*;

pub mod clock;
pub mod interlocking;
pub mod options;
pub mod routes;
pub mod scenario;
pub mod signals;
pub mod simulation_sets;
pub mod suggestions;
pub mod track;
pub mod trains;

pub use simulation_sets::SimulationSet;

use clock::SimClock;
use interlocking::InterlockingRegistry;
use options::SimOptions;
use routes::RouteTable;
use signals::SignalLibrary;
use track::TrackLayout;
use trains::{ServiceDirectory, TrainRegistry};

/// Emitted by the host after it has replaced the simulation state with a
/// newly loaded one. Stateful subsystems (the suggestion engine) rebind and
/// discard what they carried for the previous simulation.
#[derive(Event, Debug, Clone, Default)]
pub struct SimulationLoaded;

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimClock>()
            .init_resource::<SimOptions>()
            .init_resource::<TrackLayout>()
            .init_resource::<SignalLibrary>()
            .init_resource::<RouteTable>()
            .init_resource::<ServiceDirectory>()
            .init_resource::<TrainRegistry>()
            .init_resource::<InterlockingRegistry>()
            .add_event::<SimulationLoaded>()
            .configure_sets(
                FixedUpdate,
                (
                    SimulationSet::PreSim,
                    SimulationSet::Simulation,
                    SimulationSet::PostSim,
                )
                    .chain(),
            )
            .add_systems(
                FixedUpdate,
                (clock::tick_sim_clock, trains::accumulate_stopped_time)
                    .chain()
                    .in_set(SimulationSet::PreSim),
            )
            .add_systems(
                FixedUpdate,
                trains::refresh_occupancy.in_set(SimulationSet::Simulation),
            )
            .add_plugins(suggestions::SuggestionsPlugin);
    }
}
