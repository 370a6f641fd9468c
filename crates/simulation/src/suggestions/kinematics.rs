//! Distance and arrival-time estimation along the item graph.
//!
//! Walks follow the train's current direction of travel. A walk that leaves
//! the layout before reaching its target yields `f32::INFINITY`, which every
//! caller treats as "not ahead of this train".

use crate::track::TrackLayout;
use crate::trains::{Train, MAX_WALK_ITEMS};

/// ETA assigned to a train that is not moving. One hour, far beyond any
/// predictive threshold.
pub const STOPPED_ETA_SECS: f64 = 3_600.0;

/// Floor applied to the averaged approach speed, m/s.
pub const MIN_AVG_SPEED: f64 = 0.5;

/// Forward distance in meters from the train's head to the start of the
/// given item. `INFINITY` when the item is not ahead.
pub fn distance_to_item_start(train: &Train, target: &str, layout: &TrackLayout) -> f32 {
    let mut distance = 0.0f32;
    let mut pos = train.head.clone();
    for _ in 0..MAX_WALK_ITEMS {
        if pos.item == target {
            return distance;
        }
        let Some(item) = layout.item(&pos.item) else {
            return f32::INFINITY;
        };
        if item.real_length > 0.0 {
            distance += item.real_length - pos.offset;
        }
        pos = match pos.next(layout) {
            Some(next) => next,
            None => return f32::INFINITY,
        };
    }
    f32::INFINITY
}

/// Forward distance to a signal; signals are track items, so this is the
/// same walk with a clearer name at call sites.
pub fn distance_to_signal(train: &Train, signal_id: &str, layout: &TrackLayout) -> f32 {
    distance_to_item_start(train, signal_id, layout)
}

/// Estimated seconds for the train to cover `distance`.
///
/// A braking train is evaluated at the average of its current speed and its
/// braking target, since it will arrive near the target speed. The average
/// is floored at `MIN_AVG_SPEED`.
pub fn estimate_eta_secs(train: &Train, distance: f32) -> f64 {
    if train.speed <= 0.0 {
        return STOPPED_ETA_SECS;
    }
    let speed = f64::from(train.speed);
    let mut avg = speed;
    if let Some(target) = train.applicable_speed {
        let target = f64::from(target);
        if target < speed {
            avg = (speed + target) / 2.0;
        }
    }
    f64::from(distance) / avg.max(MIN_AVG_SPEED)
}
