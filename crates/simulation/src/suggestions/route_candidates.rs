//! Route-centric candidate generators: reactive departure activation,
//! predictive activation for approaching trains, and targeted deactivation
//! of blocking persistent routes.

use bevy::prelude::*;
use serde_json::json;

use crate::interlocking::parse_conflicting_route_id;
use crate::routes::{route_has_any_train, Route};
use crate::track::TrackLayout;
use crate::trains::{next_must_stop_line, next_signal_position, ServiceLine, Train, TrainId, TrainStatus};

use super::kinematics::{distance_to_signal, estimate_eta_secs};
use super::safety::{
    crossing_conflict_on_route, head_on_conflict_on_route, route_blocked,
};
use super::types::{
    Suggestion, SuggestionAction, SuggestionId, SuggestionKind, DEACTIVATE_BASE_SCORE,
    DEACTIVATE_PER_BLOCKED, DELAY_WEIGHT, DEPARTURE_BASE_SCORE, MAX_DEACTIVATION_SUGGESTIONS,
    PREDICTIVE_BASE_SCORE, TRACK_MATCH_BONUS,
};
use super::SimView;

// =============================================================================
// Shared preconditions
// =============================================================================

/// The timetable line of a train that is ready to depart: stopped, past its
/// scheduled departure, minimum dwell satisfied. `None` when any
/// precondition fails.
pub(super) fn ready_to_depart<'a>(train: &Train, view: &SimView<'a>) -> Option<&'a ServiceLine> {
    if !train.is_active() || train.status != TrainStatus::Stopped {
        return None;
    }
    let idx = train.next_place_index?;
    let line = view.services.service(&train.service_code)?.lines.get(idx)?;
    if line.scheduled_departure.is_zero() {
        return None;
    }
    if view.clock.time < line.scheduled_departure {
        return None;
    }
    if train.stopped_time < train.min_stop_time {
        return None;
    }
    Some(line)
}

/// True when every item of the route belonging to the place either has an
/// empty track code or matches the scheduled one. Enforces platform
/// adherence inside the place without constraining items elsewhere.
pub fn route_respects_track_code(
    route: &Route,
    place_code: &str,
    track_code: &str,
    layout: &TrackLayout,
) -> bool {
    route.positions.iter().all(|pos| {
        let Some(item) = layout.item(&pos.item) else {
            return true;
        };
        if item.place_code.as_deref() != Some(place_code) {
            return true;
        }
        item.track_code.is_empty() || item.track_code == track_code
    })
}

// =============================================================================
// Reactive departure activation
// =============================================================================

/// Proposes route activations for trains ready to depart from a place.
pub fn departure_candidates(view: &SimView, util: f64, out: &mut Vec<Suggestion>) {
    for train in view.trains.iter() {
        let Some(head_item) = view.layout.item(&train.head.item) else {
            continue;
        };
        if head_item.place_code.is_none() {
            continue;
        }
        let Some(line) = ready_to_depart(train, view) else {
            continue;
        };
        let Some(next_signal) = next_signal_position(train, view.layout) else {
            continue;
        };
        for route in view.routes.starting_at(&next_signal.item) {
            if route.positions.len() <= 1 {
                continue;
            }
            if view
                .interlocking
                .can_activate(route, view.routes, view.layout)
                .is_err()
            {
                continue;
            }
            if route_blocked(route, Some(train.head.item.as_str()), view.layout) {
                continue;
            }
            if let Some(reason) =
                crossing_conflict_on_route(train, route, view.trains, view.layout, view.options)
            {
                debug!("departure: route {} for train {}: {}", route.id, train.id, reason);
                continue;
            }
            if let Some(reason) =
                head_on_conflict_on_route(train, route, view.trains, view.layout, view.options)
            {
                debug!("departure: route {} for train {}: {}", route.id, train.id, reason);
                continue;
            }
            if !line.track_code.is_empty()
                && !line.place_code.is_empty()
                && !route_respects_track_code(route, &line.place_code, &line.track_code, view.layout)
            {
                continue;
            }

            let delay_minutes = view
                .clock
                .time
                .minutes_since(line.scheduled_departure)
                .max(0) as f64;
            let mut score = DEPARTURE_BASE_SCORE + DELAY_WEIGHT * delay_minutes;
            if head_item.track_code == line.track_code {
                score += TRACK_MATCH_BONUS;
            }
            if util < 50.0 {
                score += (50.0 - util) / 10.0;
            }

            let id = SuggestionId::RouteActivate {
                train: train.id,
                route: route.id.clone(),
                predictive: false,
            };
            out.push(Suggestion {
                id: id.to_string(),
                kind: SuggestionKind::RouteActivate,
                title: format!("Set route {} to depart train {}", route.id, train.service_code),
                reason: format!(
                    "Scheduled departure was {}, minimum stop satisfied. No conflicts detected.",
                    line.scheduled_departure.formatted()
                ),
                score,
                actions: vec![SuggestionAction::new(
                    "route",
                    "activate",
                    json!({"id": route.id, "persistent": false}),
                )],
            });
        }
    }
}

// =============================================================================
// Predictive activation
// =============================================================================

/// Proposes route activations for running trains about to hit a stop
/// signal, so the route is set before they have to brake. At most one
/// suggestion per train.
pub fn predictive_candidates(view: &SimView, out: &mut Vec<Suggestion>) {
    for train in view.trains.iter() {
        if !train.is_active() || train.status != TrainStatus::Running {
            continue;
        }
        let Some(next_signal) = next_signal_position(train, view.layout) else {
            continue;
        };
        let Some(aspect) = view.layout.active_aspect(&next_signal.item, view.signals) else {
            continue;
        };
        if aspect.means_proceed {
            continue;
        }
        let distance = distance_to_signal(train, &next_signal.item, view.layout);
        if distance > view.options.predictive_max_distance() {
            continue;
        }
        let eta = estimate_eta_secs(train, distance);
        if eta > view.options.predictive_max_eta() {
            continue;
        }
        for route in view.routes.starting_at(&next_signal.item) {
            if route.positions.len() <= 1 {
                continue;
            }
            if view
                .interlocking
                .can_activate(route, view.routes, view.layout)
                .is_err()
            {
                continue;
            }
            if route_blocked(route, None, view.layout) {
                continue;
            }
            if let Some(reason) =
                crossing_conflict_on_route(train, route, view.trains, view.layout, view.options)
            {
                debug!("predictive: route {} for train {}: {}", route.id, train.id, reason);
                continue;
            }
            if let Some(reason) =
                head_on_conflict_on_route(train, route, view.trains, view.layout, view.options)
            {
                debug!("predictive: route {} for train {}: {}", route.id, train.id, reason);
                continue;
            }
            // Platform adherence at the next halt, if this route runs
            // through it.
            if let Some(stop_line) = next_must_stop_line(train, view.services) {
                if !stop_line.place_code.is_empty()
                    && !stop_line.track_code.is_empty()
                    && route.touches_place(&stop_line.place_code, view.layout)
                    && !route_respects_track_code(
                        route,
                        &stop_line.place_code,
                        &stop_line.track_code,
                        view.layout,
                    )
                {
                    continue;
                }
            }

            let score = PREDICTIVE_BASE_SCORE + (view.options.predictive_max_eta() - eta) / 10.0;
            let id = SuggestionId::RouteActivate {
                train: train.id,
                route: route.id.clone(),
                predictive: true,
            };
            out.push(Suggestion {
                id: id.to_string(),
                kind: SuggestionKind::RouteActivate,
                title: format!(
                    "Proactively set route {} for approaching train {}",
                    route.id, train.service_code
                ),
                reason: format!(
                    "Train {} approaching signal {} in ~{:.0}s. Proactive route setting prevents stop.",
                    train.service_code, next_signal.item, eta
                ),
                score,
                actions: vec![SuggestionAction::new(
                    "route",
                    "activate",
                    json!({"id": route.id, "persistent": false}),
                )],
            });
            break; // only one route per approaching train
        }
    }
}

// =============================================================================
// Targeted persistent-route deactivation
// =============================================================================

/// Proposes deactivating persistent routes, but only those that currently
/// block a ready departure through the interlocking. Untargeted cleanup of
/// idle persistent routes would be noise.
pub fn deactivation_candidates(view: &SimView, util: f64, out: &mut Vec<Suggestion>) {
    // Blocking route id -> blocked train ids, in first-seen order so the
    // final ranking is deterministic.
    let mut blocked_by: Vec<(String, Vec<TrainId>)> = Vec::new();

    for train in view.trains.iter() {
        if ready_to_depart(train, view).is_none() {
            continue;
        }
        let Some(next_signal) = next_signal_position(train, view.layout) else {
            continue;
        };
        for route in view.routes.starting_at(&next_signal.item) {
            if route.positions.len() <= 1 {
                continue;
            }
            // Only interlocking blockage counts; physical occupancy is not
            // something deactivation can fix.
            if route_blocked(route, Some(train.head.item.as_str()), view.layout) {
                continue;
            }
            let mut conflicting: Option<String> = None;
            for veto in view.interlocking.vetoes() {
                if let Err(err) = veto.can_activate(route, view.routes, view.layout) {
                    let cause = err
                        .conflicting_route
                        .clone()
                        .or_else(|| parse_conflicting_route_id(&err.message));
                    if let Some(cause) = cause {
                        conflicting = Some(cause);
                        break;
                    }
                }
            }
            let Some(blocking_id) = conflicting else {
                continue;
            };
            let Some(blocking) = view.routes.route(&blocking_id) else {
                continue;
            };
            if !blocking.is_persistent() {
                continue;
            }
            if route_has_any_train(blocking, view.layout) {
                continue;
            }
            match blocked_by.iter_mut().find(|(id, _)| *id == blocking_id) {
                Some((_, trains)) => trains.push(train.id),
                None => blocked_by.push((blocking_id, vec![train.id])),
            }
            // One blocking route per ready train keeps the list quiet.
            break;
        }
    }

    blocked_by.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    for (route_id, blocked) in blocked_by.iter().take(MAX_DEACTIVATION_SUGGESTIONS) {
        let count = blocked.len();
        let mut score = DEACTIVATE_BASE_SCORE + DEACTIVATE_PER_BLOCKED * count as f64;
        if util > 50.0 {
            score += (util - 50.0) / 8.0;
        }
        let id = SuggestionId::RouteDeactivate {
            route: route_id.clone(),
        };
        out.push(Suggestion {
            id: id.to_string(),
            kind: SuggestionKind::RouteDeactivate,
            title: format!(
                "Deactivate persistent route {} to unblock {} departure(s)",
                route_id, count
            ),
            reason: format!("Route blocks {} ready departure(s) via interlocking.", count),
            score,
            actions: vec![SuggestionAction::new(
                "route",
                "deactivate",
                json!({"id": route_id}),
            )],
        });
    }
}
