//! Conservative safety predicates.
//!
//! These checks gate every candidate suggestion. They are deliberately
//! pessimistic: an unknown item, a dangling conflict link or a walk that
//! leaves the layout all count as unsafe. A returned `Some(reason)` means
//! "do not suggest"; the reason is only ever logged.

use crate::options::SimOptions;
use crate::routes::Route;
use crate::track::{Position, TrackLayout};
use crate::trains::{Train, TrainRegistry, MAX_WALK_ITEMS};

use super::kinematics::{distance_to_item_start, estimate_eta_secs};

// =============================================================================
// Block occupancy
// =============================================================================

/// True when no item between the train's head and `target` (exclusive) is
/// occupied. The head's own item is ignored so a train does not block
/// itself. Leaving the layout before reaching the target counts as not
/// clear.
pub fn block_clear_to(train: &Train, target: &Position, layout: &TrackLayout) -> bool {
    let mut pos = train.head.clone();
    for _ in 0..MAX_WALK_ITEMS {
        if pos == *target {
            return true;
        }
        if pos.item != train.head.item {
            match layout.item(&pos.item) {
                Some(item) if item.train_present => return false,
                Some(_) => {}
                None => return false,
            }
        }
        pos = match pos.next(layout) {
            Some(next) => next,
            None => return false,
        };
    }
    false
}

/// True when any item along the route past the begin signal is occupied.
/// `own_head` names an item to ignore (the candidate train's own head).
pub fn route_blocked(route: &Route, own_head: Option<&str>, layout: &TrackLayout) -> bool {
    route.positions.iter().skip(1).any(|pos| {
        if own_head == Some(pos.item.as_str()) {
            return false;
        }
        layout
            .item(&pos.item)
            .is_none_or(|item| item.train_present)
    })
}

// =============================================================================
// ETA windows
// =============================================================================

fn intervals_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Seconds to fully clear an item, evaluated at the train's braking target
/// (floored at 0.5 m/s: the pessimistic crawl).
fn clearance_secs(train: &Train, item_length: f32) -> f64 {
    let speed = f64::from(train.applicable_speed.unwrap_or(0.0)).max(0.5);
    f64::from(train.length + item_length) / speed
}

/// The other active train closest (by finite forward distance) to `target`.
/// Registry order breaks ties, which keeps the choice stable.
fn nearest_other_train<'a>(
    train: &Train,
    target: &str,
    trains: &'a TrainRegistry,
    layout: &TrackLayout,
) -> Option<(&'a Train, f32)> {
    let mut nearest: Option<(&Train, f32)> = None;
    for other in trains.iter() {
        if other.id == train.id || !other.is_active() {
            continue;
        }
        let distance = distance_to_item_start(other, target, layout);
        if !distance.is_finite() {
            continue;
        }
        if nearest.is_none_or(|(_, best)| distance < best) {
            nearest = Some((other, distance));
        }
    }
    nearest
}

// =============================================================================
// Crossing prediction
// =============================================================================

/// Predicts a crossing collision on one item via its conflict-item link.
pub fn crossing_conflict_at(
    train: &Train,
    item_id: &str,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    let Some(item) = layout.item(item_id) else {
        return Some(format!("unknown track item {}", item_id));
    };
    let conflict_id = item.conflict_item.as_deref()?;
    let Some(conflict) = layout.item(conflict_id) else {
        return Some(format!("unknown conflict item {}", conflict_id));
    };
    if conflict.train_present {
        return Some(format!("conflict item {} is occupied", conflict_id));
    }
    let (other, other_distance) = nearest_other_train(train, conflict_id, trains, layout)?;
    let my_distance = distance_to_item_start(train, item_id, layout);
    if !my_distance.is_finite() {
        return None;
    }
    let my_eta = estimate_eta_secs(train, my_distance);
    let other_eta = estimate_eta_secs(other, other_distance);
    let my_clear = clearance_secs(train, item.real_length);
    let other_clear = clearance_secs(other, conflict.real_length);
    let buffer = options.safety_buffer();
    if intervals_overlap(
        my_eta,
        my_eta + my_clear + buffer,
        other_eta,
        other_eta + other_clear + buffer,
    ) {
        return Some(format!(
            "predicted crossing conflict at item {} with train {}",
            item_id, other.service_code
        ));
    }
    None
}

// =============================================================================
// Head-on prediction
// =============================================================================

/// Predicts a head-on collision on one item by comparing arrival windows of
/// this train and the nearest other train targeting the same item.
pub fn head_on_conflict_at(
    train: &Train,
    item_id: &str,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    let Some(item) = layout.item(item_id) else {
        return Some(format!("unknown track item {}", item_id));
    };
    let my_distance = distance_to_item_start(train, item_id, layout);
    if !my_distance.is_finite() {
        return None;
    }
    let (other, other_distance) = nearest_other_train(train, item_id, trains, layout)?;
    let my_eta = estimate_eta_secs(train, my_distance);
    let other_eta = estimate_eta_secs(other, other_distance);
    let my_clear = clearance_secs(train, item.real_length);
    let other_clear = clearance_secs(other, item.real_length);
    let buffer = options.safety_buffer();
    if intervals_overlap(
        my_eta,
        my_eta + my_clear + buffer,
        other_eta,
        other_eta + other_clear + buffer,
    ) {
        return Some(format!(
            "predicted head-on conflict on item {} with train {}",
            item_id, other.service_code
        ));
    }
    None
}

// =============================================================================
// Path and route scans
// =============================================================================

fn conflict_on_route(
    route: &Route,
    mut check: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    route
        .positions
        .iter()
        .skip(1)
        .find_map(|pos| check(&pos.item))
}

fn conflict_along_path(
    train: &Train,
    to: &Position,
    layout: &TrackLayout,
    mut check: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    let mut pos = train.head.clone();
    for _ in 0..MAX_WALK_ITEMS {
        if pos == *to {
            return None;
        }
        if pos.item != train.head.item {
            if let Some(reason) = check(&pos.item) {
                return Some(reason);
            }
        }
        pos = match pos.next(layout) {
            Some(next) => next,
            None => return Some("path leaves the layout before its target".to_string()),
        };
    }
    Some("path exceeds the walk limit".to_string())
}

pub fn crossing_conflict_on_route(
    train: &Train,
    route: &Route,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    conflict_on_route(route, |item| {
        crossing_conflict_at(train, item, trains, layout, options)
    })
}

pub fn head_on_conflict_on_route(
    train: &Train,
    route: &Route,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    conflict_on_route(route, |item| {
        head_on_conflict_at(train, item, trains, layout, options)
    })
}

pub fn crossing_conflict_along_path(
    train: &Train,
    to: &Position,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    conflict_along_path(train, to, layout, |item| {
        crossing_conflict_at(train, item, trains, layout, options)
    })
}

pub fn head_on_conflict_along_path(
    train: &Train,
    to: &Position,
    trains: &TrainRegistry,
    layout: &TrackLayout,
    options: &SimOptions,
) -> Option<String> {
    conflict_along_path(train, to, layout, |item| {
        head_on_conflict_at(train, item, trains, layout, options)
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::Route;
    use crate::track::TrackItem;
    use crate::trains::TrainStatus;

    fn train(id: u32, head: Position, speed: f32) -> Train {
        Train {
            id,
            service_code: format!("SVC{id}"),
            status: TrainStatus::Running,
            speed,
            head,
            next_place_index: Some(0),
            stopped_time: 0,
            min_stop_time: 0,
            length: 100.0,
            applicable_speed: Some(10.0),
        }
    }

    /// Main line A -> B -> C with a diamond: item B crosses item X, which is
    /// approached by the other train over W -> X.
    fn crossing_layout() -> TrackLayout {
        let mut layout = TrackLayout::default();
        layout.add_item(TrackItem::line("A", 100.0).linked(Some("IN"), Some("B")));
        layout.add_item(
            TrackItem::line("B", 50.0)
                .linked(Some("A"), Some("C"))
                .with_conflict("X"),
        );
        layout.add_item(TrackItem::line("C", 100.0).linked(Some("B"), None));
        layout.add_item(TrackItem::line("W", 30.0).linked(Some("WIN"), Some("X")));
        layout.add_item(
            TrackItem::line("X", 50.0)
                .linked(Some("W"), None)
                .with_conflict("B"),
        );
        layout
    }

    #[test]
    fn test_intervals_overlap() {
        assert!(intervals_overlap(0.0, 10.0, 5.0, 15.0));
        assert!(intervals_overlap(5.0, 15.0, 0.0, 10.0));
        assert!(intervals_overlap(0.0, 10.0, 10.0, 20.0)); // touching counts
        assert!(!intervals_overlap(0.0, 10.0, 11.0, 20.0));
    }

    #[test]
    fn test_block_clear_to() {
        let layout = crossing_layout();
        let t = train(0, Position::new("A", "IN", 0.0), 10.0);
        let target = Position::new("C", "B", 0.0);
        assert!(block_clear_to(&t, &target, &layout));

        let mut occupied = crossing_layout();
        occupied.set_train_present("B", true);
        assert!(!block_clear_to(&t, &target, &occupied));
    }

    #[test]
    fn test_block_clear_ignores_own_head() {
        let mut layout = crossing_layout();
        layout.set_train_present("A", true);
        let t = train(0, Position::new("A", "IN", 0.0), 10.0);
        let target = Position::new("C", "B", 0.0);
        assert!(block_clear_to(&t, &target, &layout));
    }

    #[test]
    fn test_block_clear_fails_when_walk_leaves_layout() {
        let layout = crossing_layout();
        let t = train(0, Position::new("A", "IN", 0.0), 10.0);
        let unreachable = Position::new("X", "W", 0.0);
        assert!(!block_clear_to(&t, &unreachable, &layout));
    }

    #[test]
    fn test_route_blocked() {
        let mut layout = crossing_layout();
        let route = Route::new(
            "R",
            "A",
            "C",
            vec![
                Position::new("A", "IN", 0.0),
                Position::new("B", "A", 0.0),
                Position::new("C", "B", 0.0),
            ],
        );
        assert!(!route_blocked(&route, None, &layout));
        layout.set_train_present("B", true);
        assert!(route_blocked(&route, None, &layout));
        assert!(!route_blocked(&route, Some("B"), &layout));
        // Begin-signal position is never checked.
        let mut begin_only = crossing_layout();
        begin_only.set_train_present("A", true);
        assert!(!route_blocked(&route, None, &begin_only));
    }

    #[test]
    fn test_crossing_no_conflict_item_passes() {
        let layout = crossing_layout();
        let trains = TrainRegistry::default();
        let t = train(0, Position::new("A", "IN", 0.0), 10.0);
        let options = SimOptions::default();
        assert!(crossing_conflict_at(&t, "A", &trains, &layout, &options).is_none());
    }

    #[test]
    fn test_crossing_occupied_conflict_item_fails() {
        let mut layout = crossing_layout();
        layout.set_train_present("X", true);
        let trains = TrainRegistry::default();
        let t = train(0, Position::new("A", "IN", 0.0), 10.0);
        let options = SimOptions::default();
        let reason = crossing_conflict_at(&t, "B", &trains, &layout, &options).unwrap();
        assert!(reason.contains("occupied"));
    }

    #[test]
    fn test_crossing_overlapping_etas_fail() {
        let layout = crossing_layout();
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0); // 100 m to B, ETA 10 s
        let other = train(1, Position::new("W", "WIN", 0.0), 10.0); // 30 m to X, ETA 3 s
        trains.add_train(me.clone());
        trains.add_train(other);
        let options = SimOptions::default();
        let reason = crossing_conflict_at(&me, "B", &trains, &layout, &options).unwrap();
        assert!(reason.contains("crossing conflict"));
        assert!(reason.contains("SVC1"));
    }

    #[test]
    fn test_crossing_distant_other_train_passes() {
        let layout = crossing_layout();
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0); // ETA 10 s, clears by ~25 s
        // Other crawls toward X: ETA 3000 s, far outside my window.
        let other = train(1, Position::new("W", "WIN", 0.0), 0.01);
        trains.add_train(me.clone());
        trains.add_train(other);
        let options = SimOptions::default();
        assert!(crossing_conflict_at(&me, "B", &trains, &layout, &options).is_none());
    }

    #[test]
    fn test_crossing_ignores_inactive_trains() {
        let layout = crossing_layout();
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0);
        let mut other = train(1, Position::new("W", "WIN", 0.0), 10.0);
        other.status = TrainStatus::Out;
        trains.add_train(me.clone());
        trains.add_train(other);
        let options = SimOptions::default();
        assert!(crossing_conflict_at(&me, "B", &trains, &layout, &options).is_none());
    }

    #[test]
    fn test_head_on_overlapping_etas_fail() {
        // Two trains converging on C: me over A -> B -> C, the other over
        // D -> C from the far end.
        let mut layout = crossing_layout();
        layout.item_mut("C").unwrap().next_item = Some("D".to_string());
        layout.add_item(TrackItem::line("D", 100.0).linked(Some("E"), Some("C")));
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0); // 150 m to C, ETA 15 s
        let other = train(1, Position::new("D", "E", 0.0), 10.0); // 100 m to C, ETA 10 s
        trains.add_train(me.clone());
        trains.add_train(other);
        let options = SimOptions::default();
        let reason = head_on_conflict_at(&me, "C", &trains, &layout, &options).unwrap();
        assert!(reason.contains("head-on"));
        assert!(reason.contains("SVC1"));
    }

    #[test]
    fn test_head_on_no_other_train_passes() {
        let layout = crossing_layout();
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0);
        trains.add_train(me.clone());
        let options = SimOptions::default();
        assert!(head_on_conflict_at(&me, "C", &trains, &layout, &options).is_none());
    }

    #[test]
    fn test_route_scan_finds_conflict() {
        let mut layout = crossing_layout();
        layout.set_train_present("X", true);
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0);
        trains.add_train(me.clone());
        let route = Route::new(
            "R",
            "A",
            "C",
            vec![
                Position::new("A", "IN", 0.0),
                Position::new("B", "A", 0.0),
                Position::new("C", "B", 0.0),
            ],
        );
        let options = SimOptions::default();
        assert!(crossing_conflict_on_route(&me, &route, &trains, &layout, &options).is_some());
    }

    #[test]
    fn test_path_scan_skips_head_item() {
        let mut layout = crossing_layout();
        // Head item has a conflict link, but path scans ignore the head.
        layout.item_mut("A").unwrap().conflict_item = Some("X".to_string());
        layout.set_train_present("X", true);
        let mut trains = TrainRegistry::default();
        let me = train(0, Position::new("A", "IN", 0.0), 10.0);
        trains.add_train(me.clone());
        let options = SimOptions::default();
        let to = Position::new("B", "A", 0.0);
        assert!(crossing_conflict_along_path(&me, &to, &trains, &layout, &options).is_none());
    }
}
