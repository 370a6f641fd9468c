use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use simulation::suggestions::SuggestionsUpdated;

fn main() {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(50))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(simulation::SimulationPlugin)
        .add_systems(Startup, simulation::scenario::init_demo_world)
        .add_systems(Update, log_suggestion_updates)
        .run();
}

/// Prints each suggestions snapshot in its wire shape.
fn log_suggestion_updates(mut updates: EventReader<SuggestionsUpdated>) {
    for update in updates.read() {
        match serde_json::to_string(&update.snapshot) {
            Ok(json) => info!("suggestionsUpdated {}", json),
            Err(err) => warn!("snapshot serialization failed: {}", err),
        }
    }
}
