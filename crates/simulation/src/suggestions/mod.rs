//! Suggestion engine -- periodically recomputes ranked, safe operational
//! suggestions from the live simulation state.
//!
//! Split into sub-modules:
//! - `types`: suggestion/id/event/resource types and scoring constants
//! - `kinematics`: forward distance walks and arrival-time estimation
//! - `safety`: conservative block, crossing and head-on predicates
//! - `route_candidates`: departure, predictive and deactivation generators
//! - `train_candidates`: proceed-with-caution and signal-override generators
//!
//! The engine only ever reads simulation state while computing; all
//! mutation funnels through the host operations invoked on accept. Every
//! candidate that fails a precondition or a safety predicate is skipped
//! silently -- correctness is guaranteed by the next recomputation.

pub mod kinematics;
pub mod route_candidates;
pub mod safety;
mod tests;
pub mod train_candidates;
pub mod types;

pub use types::{
    AcceptSuggestion, RecomputeSuggestions, RejectSuggestion, Suggestion, SuggestionAction,
    SuggestionCommandFailed, SuggestionEngine, SuggestionError, SuggestionId, SuggestionKind,
    SuggestionsSnapshot, SuggestionsUpdated,
};

use std::collections::HashSet;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::clock::SimClock;
use crate::interlocking::InterlockingRegistry;
use crate::options::SimOptions;
use crate::routes::RouteTable;
use crate::signals::SignalLibrary;
use crate::track::TrackLayout;
use crate::trains::{ServiceDirectory, TrainRegistry};
use crate::{SimulationLoaded, SimulationSet};

// =============================================================================
// Simulation state reader
// =============================================================================

/// Read-only view over the simulation state a recomputation needs. Holding
/// only shared references makes "no mutation during compute" a compile-time
/// property.
pub struct SimView<'a> {
    pub clock: &'a SimClock,
    pub options: &'a SimOptions,
    pub trains: &'a TrainRegistry,
    pub services: &'a ServiceDirectory,
    pub routes: &'a RouteTable,
    pub layout: &'a TrackLayout,
    pub signals: &'a SignalLibrary,
    pub interlocking: &'a InterlockingRegistry,
}

/// Bundled resources for systems that need the full read-only view.
#[derive(SystemParam)]
pub struct SimStateParams<'w> {
    pub clock: Res<'w, SimClock>,
    pub options: Res<'w, SimOptions>,
    pub trains: Res<'w, TrainRegistry>,
    pub services: Res<'w, ServiceDirectory>,
    pub routes: Res<'w, RouteTable>,
    pub layout: Res<'w, TrackLayout>,
    pub signals: Res<'w, SignalLibrary>,
    pub interlocking: Res<'w, InterlockingRegistry>,
}

impl SimStateParams<'_> {
    pub fn view(&self) -> SimView<'_> {
        SimView {
            clock: &*self.clock,
            options: &*self.options,
            trains: &*self.trains,
            services: &*self.services,
            routes: &*self.routes,
            layout: &*self.layout,
            signals: &*self.signals,
            interlocking: &*self.interlocking,
        }
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Runs all candidate generators, deduplicates, ranks and caps the result.
/// Deterministic: identical state, clock and options produce an identical
/// snapshot.
pub fn compute_suggestions(view: &SimView) -> SuggestionsSnapshot {
    let util = view.layout.utilization_percent();
    let mut candidates = Vec::new();

    route_candidates::departure_candidates(view, util, &mut candidates);
    route_candidates::predictive_candidates(view, &mut candidates);
    train_candidates::proceed_candidates(view, util, &mut candidates);
    route_candidates::deactivation_candidates(view, util, &mut candidates);
    train_candidates::override_candidates(view, util, &mut candidates);

    // Two generators can arrive at the same id (e.g. two trains held at one
    // signal proposing the same override); the first insertion wins.
    let mut seen: HashSet<String> = HashSet::new();
    candidates.retain(|suggestion| seen.insert(suggestion.id.clone()));

    // Stable sort: ties keep generator insertion order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(view.options.max_items());

    SuggestionsSnapshot {
        items: candidates,
        generated_at: view.clock.time,
    }
}

// =============================================================================
// Accept / reject
// =============================================================================

/// Executes the suggestion identified by `id` through the host operations.
/// Unknown ids and host refusals come back as errors; nothing is mutated in
/// that case.
pub fn accept_suggestion(
    id: &str,
    routes: &mut RouteTable,
    trains: &mut TrainRegistry,
    layout: &mut TrackLayout,
    signals: &SignalLibrary,
) -> Result<(), SuggestionError> {
    match id.parse::<SuggestionId>()? {
        SuggestionId::RouteActivate { route, .. } => {
            routes.activate(&route, false, layout, signals)?;
            Ok(())
        }
        SuggestionId::RouteDeactivate { route } => {
            routes.deactivate(&route, layout, signals)?;
            Ok(())
        }
        SuggestionId::ProceedWithCaution { train } => {
            trains.proceed_with_caution(train)?;
            Ok(())
        }
        SuggestionId::SignalOverride { signal, aspect } => {
            let target = if aspect.eq_ignore_ascii_case("DEFAULT") {
                // "DEFAULT" clears the override.
                None
            } else if let Some(known) = signals.aspect_ignore_case(&aspect) {
                Some(known.name.clone())
            } else {
                // Unknown aspect names fall back to the signal's
                // conservative proceed aspect.
                layout
                    .item(&signal)
                    .and_then(|item| item.signal())
                    .map(|head| head.signal_type.clone())
                    .and_then(|ty| signals.cautious_proceed_aspect(&ty))
                    .map(|a| a.name.clone())
            };
            layout.set_manual_aspect(&signal, target)?;
            Ok(())
        }
    }
}

// =============================================================================
// Systems
// =============================================================================

fn publish(
    view: &SimView,
    engine: &mut SuggestionEngine,
    snapshot: &mut SuggestionsSnapshot,
    updated: &mut EventWriter<SuggestionsUpdated>,
) {
    let now = view.clock.time;
    engine.last_computed_at = Some(now);
    let mut computed = compute_suggestions(view);
    computed
        .items
        .retain(|item| !engine.is_rejected(&item.id, now));
    *snapshot = computed.clone();
    debug!(
        "suggestions recomputed at {}: {} item(s)",
        now,
        computed.items.len()
    );
    updated.send(SuggestionsUpdated { snapshot: computed });
}

/// Periodic recomputation on the simulation clock. Does nothing while
/// suggestions are disabled or the interval has not elapsed.
pub fn recompute_if_due(
    params: SimStateParams,
    mut engine: ResMut<SuggestionEngine>,
    mut snapshot: ResMut<SuggestionsSnapshot>,
    mut updated: EventWriter<SuggestionsUpdated>,
) {
    if !params.options.suggestions_enabled {
        return;
    }
    let now = params.clock.time;
    if let Some(last) = engine.last_computed_at {
        let interval_secs = i64::from(params.options.interval_minutes()) * 60;
        if now.seconds_since(last) < interval_secs {
            return;
        }
    }
    let view = params.view();
    publish(&view, &mut engine, &mut snapshot, &mut updated);
}

/// Handles operator commands: accept, reject and forced recompute. An
/// explicit recompute runs even while periodic suggestions are disabled, so
/// the operator can always inspect what the engine would say.
#[allow(clippy::too_many_arguments)]
pub fn handle_suggestion_commands(
    mut accepts: EventReader<AcceptSuggestion>,
    mut rejects: EventReader<RejectSuggestion>,
    mut recomputes: EventReader<RecomputeSuggestions>,
    engine: Option<ResMut<SuggestionEngine>>,
    clock: Res<SimClock>,
    options: Res<SimOptions>,
    services: Res<ServiceDirectory>,
    signals: Res<SignalLibrary>,
    interlocking: Res<InterlockingRegistry>,
    mut routes: ResMut<RouteTable>,
    mut trains: ResMut<TrainRegistry>,
    mut layout: ResMut<TrackLayout>,
    mut snapshot: ResMut<SuggestionsSnapshot>,
    mut updated: EventWriter<SuggestionsUpdated>,
    mut failures: EventWriter<SuggestionCommandFailed>,
) {
    let Some(mut engine) = engine else {
        for accept in accepts.read() {
            failures.send(SuggestionCommandFailed {
                id: accept.id.clone(),
                message: SuggestionError::NotInitialized.to_string(),
            });
        }
        for reject in rejects.read() {
            failures.send(SuggestionCommandFailed {
                id: reject.id.clone(),
                message: SuggestionError::NotInitialized.to_string(),
            });
        }
        recomputes.clear();
        return;
    };

    let mut recompute_wanted = false;

    for accept in accepts.read() {
        match accept_suggestion(&accept.id, &mut routes, &mut trains, &mut layout, &signals) {
            Ok(()) => {
                info!("suggestion accepted: {}", accept.id);
                // Recompute right away so the executed suggestion vanishes
                // from the next snapshot.
                recompute_wanted = true;
            }
            Err(err) => {
                warn!("suggestion {} not accepted: {}", accept.id, err);
                failures.send(SuggestionCommandFailed {
                    id: accept.id.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    for reject in rejects.read() {
        engine.reject(&reject.id, reject.minutes, clock.time);
        info!(
            "suggestion rejected for {} min: {}",
            if reject.minutes == 0 {
                types::DEFAULT_REJECT_MINUTES
            } else {
                reject.minutes
            },
            reject.id
        );
    }

    if recomputes.read().next().is_some() {
        recompute_wanted = true;
        recomputes.clear();
    }

    if recompute_wanted {
        let view = SimView {
            clock: &*clock,
            options: &*options,
            trains: &*trains,
            services: &*services,
            routes: &*routes,
            layout: &*layout,
            signals: &*signals,
            interlocking: &*interlocking,
        };
        publish(&view, &mut engine, &mut snapshot, &mut updated);
    }
}

/// Rebinds the engine when a new simulation is loaded: rejection state and
/// the snapshot belong to the previous simulation and are discarded.
pub fn reset_on_simulation_loaded(
    mut loaded: EventReader<SimulationLoaded>,
    mut engine: ResMut<SuggestionEngine>,
    mut snapshot: ResMut<SuggestionsSnapshot>,
) {
    if loaded.read().next().is_none() {
        return;
    }
    loaded.clear();
    engine.reset();
    *snapshot = SuggestionsSnapshot::default();
    info!("suggestion engine reset");
}

// =============================================================================
// Plugin
// =============================================================================

pub struct SuggestionsPlugin;

impl Plugin for SuggestionsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SuggestionEngine>()
            .init_resource::<SuggestionsSnapshot>()
            .add_event::<AcceptSuggestion>()
            .add_event::<RejectSuggestion>()
            .add_event::<RecomputeSuggestions>()
            .add_event::<SuggestionsUpdated>()
            .add_event::<SuggestionCommandFailed>()
            .add_systems(
                FixedUpdate,
                (
                    reset_on_simulation_loaded,
                    handle_suggestion_commands,
                    recompute_if_due,
                )
                    .chain()
                    .in_set(SimulationSet::PostSim),
            );
    }
}
