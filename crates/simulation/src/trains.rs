//! Trains and their timetables.
//!
//! ## Data model
//! - `Train`: a running unit with a head position, speed and timetable cursor
//! - `Service` / `ServiceLine`: the ordered timetable a train works through
//! - `TrainRegistry`: all trains, indexed by their numeric id
//! - `ServiceDirectory`: services keyed by service code
//!
//! Kinematic integration is the host's business; this module carries the
//! state other systems read (status, speed, head position, braking target)
//! plus the handful of operations the traffic-control layer invokes.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{SimClock, SimTime, SECONDS_PER_TICK};
use crate::track::{Position, TrackLayout};

/// Unique identifier for a train: its index in the registry.
pub type TrainId = u32;

/// Speed limit applied by `proceed_with_caution`, in m/s (30 km/h).
pub const CAUTION_SPEED: f32 = 8.3;

/// Hard cap on forward walks through the item graph, so malformed circular
/// layouts cannot hang a query.
pub const MAX_WALK_ITEMS: usize = 10_000;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum TrainError {
    #[error("unknown train: {0}")]
    Unknown(TrainId),
    #[error("train {0} is not active")]
    NotActive(TrainId),
}

// =============================================================================
// Timetable
// =============================================================================

/// One scheduled stop or pass in a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub place_code: String,
    /// Platform/track designation within the place; empty when unspecified.
    pub track_code: String,
    /// `SimTime::ZERO` means unspecified.
    pub scheduled_arrival: SimTime,
    /// `SimTime::ZERO` means unspecified.
    pub scheduled_departure: SimTime,
    pub must_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub code: String,
    pub lines: Vec<ServiceLine>,
}

/// Services keyed by service code.
#[derive(Resource, Debug, Clone, Default)]
pub struct ServiceDirectory {
    services: HashMap<String, Service>,
}

impl ServiceDirectory {
    pub fn add_service(&mut self, service: Service) {
        self.services.insert(service.code.clone(), service);
    }

    pub fn service(&self, code: &str) -> Option<&Service> {
        self.services.get(code)
    }
}

// =============================================================================
// Trains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainStatus {
    Inactive,
    Running,
    Stopped,
    Waiting,
    Out,
    EndOfService,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub service_code: String,
    pub status: TrainStatus,
    /// Current speed in m/s.
    pub speed: f32,
    pub head: Position,
    /// Index of the next timetable line to serve; `None` = no more place.
    pub next_place_index: Option<usize>,
    /// Seconds accumulated at the current stop.
    pub stopped_time: u32,
    /// Minimum dwell in seconds before departure is allowed.
    pub min_stop_time: u32,
    /// Physical train length in meters.
    pub length: f32,
    /// Braking target imposed by the current signal action, in m/s.
    /// `None` when unconstrained.
    pub applicable_speed: Option<f32>,
}

impl Train {
    pub fn is_active(&self) -> bool {
        !matches!(
            self.status,
            TrainStatus::Inactive | TrainStatus::Out | TrainStatus::EndOfService
        )
    }
}

/// All trains. Iteration order is id order, which keeps every downstream
/// computation deterministic.
#[derive(Resource, Debug, Clone, Default)]
pub struct TrainRegistry {
    trains: Vec<Train>,
}

impl TrainRegistry {
    /// Adds a train, assigning the next numeric id. Returns the id.
    pub fn add_train(&mut self, mut train: Train) -> TrainId {
        let id = self.trains.len() as TrainId;
        train.id = id;
        self.trains.push(train);
        id
    }

    pub fn train(&self, id: TrainId) -> Option<&Train> {
        self.trains.get(id as usize)
    }

    pub fn train_mut(&mut self, id: TrainId) -> Option<&mut Train> {
        self.trains.get_mut(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Train> {
        self.trains.iter()
    }

    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    // -------------------------------------------------------------------------
    // Host operations
    // -------------------------------------------------------------------------

    /// Authorizes a stopped train to pass its stop signal at restricted
    /// speed. The train starts moving under the caution speed limit.
    pub fn proceed_with_caution(&mut self, id: TrainId) -> Result<(), TrainError> {
        let train = self
            .trains
            .get_mut(id as usize)
            .ok_or(TrainError::Unknown(id))?;
        if !train.is_active() {
            return Err(TrainError::NotActive(id));
        }
        train.status = TrainStatus::Running;
        train.speed = CAUTION_SPEED;
        train.applicable_speed = Some(CAUTION_SPEED);
        info!("train {} proceeding with caution", id);
        Ok(())
    }
}

// =============================================================================
// Queries
// =============================================================================

/// The position of the next signal ahead of the train, walking forward from
/// the item after its head. `None` when no signal is reachable.
pub fn next_signal_position(train: &Train, layout: &TrackLayout) -> Option<Position> {
    let mut pos = train.head.next(layout)?;
    for _ in 0..MAX_WALK_ITEMS {
        let item = layout.item(&pos.item)?;
        if item.is_signal() {
            return Some(pos);
        }
        pos = pos.next(layout)?;
    }
    None
}

/// The next timetable line with `must_stop` set, looking ahead from the
/// train's timetable cursor. A train already stopped at a halt looks past it.
pub fn next_must_stop_line<'a>(
    train: &Train,
    services: &'a ServiceDirectory,
) -> Option<&'a ServiceLine> {
    let idx = train.next_place_index?;
    let service = services.service(&train.service_code)?;
    let start = if train.status == TrainStatus::Stopped {
        idx + 1
    } else {
        idx
    };
    service.lines.get(start..)?.iter().find(|line| line.must_stop)
}

// =============================================================================
// Systems
// =============================================================================

/// Accumulates dwell time for stationary trains and resets it for moving
/// ones. Runs every tick unless the clock is paused.
pub fn accumulate_stopped_time(clock: Res<SimClock>, mut registry: ResMut<TrainRegistry>) {
    if clock.paused {
        return;
    }
    for train in &mut registry.trains {
        match train.status {
            TrainStatus::Stopped | TrainStatus::Waiting => {
                train.stopped_time += SECONDS_PER_TICK;
            }
            TrainStatus::Running if train.speed > 0.0 => {
                train.stopped_time = 0;
            }
            _ => {}
        }
    }
}

/// Stamps item occupancy from active train heads.
pub fn refresh_occupancy(registry: Res<TrainRegistry>, mut layout: ResMut<TrackLayout>) {
    layout.clear_occupancy();
    for train in registry.iter() {
        if train.is_active() {
            layout.set_train_present(&train.head.item, true);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
