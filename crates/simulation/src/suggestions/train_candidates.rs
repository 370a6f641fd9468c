//! Train-centric candidate generators: proceed-with-caution past a stop
//! signal, and the conservative manual signal override.

use bevy::prelude::*;
use serde_json::json;

use crate::trains::{next_signal_position, Train};

use super::safety::{
    block_clear_to, crossing_conflict_along_path, head_on_conflict_along_path,
};
use super::types::{
    Suggestion, SuggestionAction, SuggestionId, SuggestionKind, OVERRIDE_BASE_SCORE,
    PROCEED_BASE_SCORE,
};
use super::SimView;

/// Maps an aspect name to the color keyword the host's signal command
/// understands.
pub fn override_color(aspect_name: &str) -> String {
    let upper = aspect_name.to_uppercase();
    if upper.contains("CLEAR") {
        "GREEN".to_string()
    } else if upper.contains("CAUTION") {
        "YELLOW".to_string()
    } else {
        upper
    }
}

/// Delay in whole minutes against the train's current timetable line, or 0.
fn current_delay_minutes(train: &Train, view: &SimView) -> f64 {
    let Some(idx) = train.next_place_index else {
        return 0.0;
    };
    let Some(line) = view
        .services
        .service(&train.service_code)
        .and_then(|svc| svc.lines.get(idx))
    else {
        return 0.0;
    };
    if line.scheduled_departure.is_zero() {
        return 0.0;
    }
    view.clock
        .time
        .minutes_since(line.scheduled_departure)
        .max(0) as f64
}

// =============================================================================
// Proceed with caution
// =============================================================================

/// Proposes letting a train held at a stop signal move on at restricted
/// speed, when the block to the next signal is clear and no crossing or
/// head-on risk is predicted along the way.
pub fn proceed_candidates(view: &SimView, util: f64, out: &mut Vec<Suggestion>) {
    for train in view.trains.iter() {
        if !train.is_active() || train.speed != 0.0 {
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
        if !block_clear_to(train, &next_signal, view.layout) {
            continue;
        }
        if let Some(reason) = crossing_conflict_along_path(
            train,
            &next_signal,
            view.trains,
            view.layout,
            view.options,
        ) {
            debug!("proceed: train {}: {}", train.id, reason);
            continue;
        }
        if let Some(reason) =
            head_on_conflict_along_path(train, &next_signal, view.trains, view.layout, view.options)
        {
            debug!("proceed: train {}: {}", train.id, reason);
            continue;
        }

        let mut score = PROCEED_BASE_SCORE + current_delay_minutes(train, view);
        if util > 60.0 {
            score += (util - 60.0) / 12.0;
        }

        let id = SuggestionId::ProceedWithCaution { train: train.id };
        out.push(Suggestion {
            id: id.to_string(),
            kind: SuggestionKind::TrainProceedWithCaution,
            title: format!(
                "Proceed with caution for train {} to next signal",
                train.service_code
            ),
            reason: format!(
                "Signal {} at STOP but block to next signal appears clear.",
                next_signal.item
            ),
            score,
            actions: vec![SuggestionAction::new(
                "train",
                "proceed",
                json!({"id": train.id}),
            )],
        });
    }
}

// =============================================================================
// Conservative signal override
// =============================================================================

/// Proposes a temporary manual override of a stop signal to its slowest
/// proceed aspect. Same preconditions as proceed-with-caution; caution is
/// preferred over clear so the override stays conservative.
pub fn override_candidates(view: &SimView, util: f64, out: &mut Vec<Suggestion>) {
    for train in view.trains.iter() {
        if !train.is_active() || train.speed != 0.0 {
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
        if !block_clear_to(train, &next_signal, view.layout) {
            continue;
        }
        if crossing_conflict_along_path(train, &next_signal, view.trains, view.layout, view.options)
            .is_some()
        {
            continue;
        }
        if head_on_conflict_along_path(train, &next_signal, view.trains, view.layout, view.options)
            .is_some()
        {
            continue;
        }
        let Some(head) = view
            .layout
            .item(&next_signal.item)
            .and_then(|item| item.signal())
        else {
            continue;
        };
        let Some(target) = view.signals.cautious_proceed_aspect(&head.signal_type) else {
            continue;
        };

        let mut score = OVERRIDE_BASE_SCORE;
        if util > 60.0 {
            score += (util - 60.0) / 8.0;
        }

        let color = override_color(&target.name);
        let id = SuggestionId::SignalOverride {
            signal: next_signal.item.clone(),
            aspect: target.name.clone(),
        };
        out.push(Suggestion {
            id: id.to_string(),
            kind: SuggestionKind::SignalOverride,
            title: format!(
                "Set signal {} to {} to allow cautious depart of train {}",
                next_signal.item, target.name, train.service_code
            ),
            reason: format!(
                "Block to next signal appears clear; temporary manual override to {} would expedite departure.",
                target.name
            ),
            score,
            actions: vec![SuggestionAction::new(
                "signal",
                "status",
                json!({"id": next_signal.item, "newStatus": color}),
            )],
        });
    }
}
