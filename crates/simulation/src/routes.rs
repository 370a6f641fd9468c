//! Pre-defined routes between signals.
//!
//! A route is an authored path from a begin signal to an end signal; position
//! 0 sits at the begin signal. Routes are the only unit of path selection in
//! the simulation: there is no dynamic re-planning. The table keeps an index
//! from begin signal to route ids so callers can enumerate candidates without
//! scanning every route.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signals::SignalLibrary;
use crate::track::{Position, TrackLayout};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error("unknown route: {0}")]
    Unknown(String),
    #[error("route {0} is already active")]
    AlreadyActive(String),
    #[error("route {0} is not active")]
    NotActive(String),
}

// =============================================================================
// Route data
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteState {
    Deactivated,
    Activated,
    /// Stays set after the train has passed, until explicitly deactivated.
    Persistent,
    Destroying,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub begin_signal: String,
    pub end_signal: String,
    /// Ordered path; position 0 is at the begin signal.
    pub positions: Vec<Position>,
    pub state: RouteState,
}

impl Route {
    pub fn new(id: &str, begin_signal: &str, end_signal: &str, positions: Vec<Position>) -> Self {
        Self {
            id: id.to_string(),
            begin_signal: begin_signal.to_string(),
            end_signal: end_signal.to_string(),
            positions,
            state: RouteState::Deactivated,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.state == RouteState::Persistent
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RouteState::Activated | RouteState::Persistent)
    }

    /// True if any position of the route belongs to the given place.
    pub fn touches_place(&self, place_code: &str, layout: &TrackLayout) -> bool {
        self.positions.iter().any(|pos| {
            layout
                .item(&pos.item)
                .and_then(|item| item.place_code.as_deref())
                == Some(place_code)
        })
    }
}

/// True if any position along the route is currently occupied by a train.
pub fn route_has_any_train(route: &Route, layout: &TrackLayout) -> bool {
    route
        .positions
        .iter()
        .any(|pos| layout.item(&pos.item).is_some_and(|item| item.train_present))
}

// =============================================================================
// Route table resource
// =============================================================================

/// The source of truth for routes, with a begin-signal index.
#[derive(Resource, Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
    order: Vec<String>,
    by_begin_signal: HashMap<String, Vec<String>>,
}

impl RouteTable {
    pub fn add_route(&mut self, route: Route) {
        if !self.routes.contains_key(&route.id) {
            self.order.push(route.id.clone());
            self.by_begin_signal
                .entry(route.begin_signal.clone())
                .or_default()
                .push(route.id.clone());
        }
        self.routes.insert(route.id.clone(), route);
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn route_mut(&mut self, id: &str) -> Option<&mut Route> {
        self.routes.get_mut(id)
    }

    /// Routes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.order.iter().filter_map(|id| self.routes.get(id))
    }

    /// Routes beginning at the given signal, in insertion order.
    pub fn starting_at(&self, signal_id: &str) -> impl Iterator<Item = &Route> {
        self.by_begin_signal
            .get(signal_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.routes.get(id))
    }

    // -------------------------------------------------------------------------
    // Host operations
    // -------------------------------------------------------------------------

    /// Activates a route: marks its items, clears its begin signal and sets
    /// the route state. Interlocking vetoes are the caller's responsibility;
    /// this is the raw host mutation.
    pub fn activate(
        &mut self,
        id: &str,
        persistent: bool,
        layout: &mut TrackLayout,
        signals: &SignalLibrary,
    ) -> Result<(), RouteError> {
        let route = self
            .routes
            .get_mut(id)
            .ok_or_else(|| RouteError::Unknown(id.to_string()))?;
        if route.state != RouteState::Deactivated {
            return Err(RouteError::AlreadyActive(id.to_string()));
        }
        route.state = if persistent {
            RouteState::Persistent
        } else {
            RouteState::Activated
        };
        for pos in &route.positions {
            if let Some(item) = layout.item_mut(&pos.item) {
                item.active_route = Some(route.id.clone());
            }
        }
        let begin_type = layout
            .item(&route.begin_signal)
            .and_then(|item| item.signal())
            .map(|head| head.signal_type.clone());
        if let Some(aspect) = begin_type.and_then(|ty| signals.clear_proceed_aspect(&ty)) {
            let name = aspect.name.clone();
            let _ = layout.set_active_aspect(&route.begin_signal, &name);
        }
        info!("route {} activated (persistent: {})", id, persistent);
        Ok(())
    }

    /// Deactivates a route, releasing its items and putting the begin signal
    /// back to its most restrictive aspect.
    pub fn deactivate(
        &mut self,
        id: &str,
        layout: &mut TrackLayout,
        signals: &SignalLibrary,
    ) -> Result<(), RouteError> {
        let route = self
            .routes
            .get_mut(id)
            .ok_or_else(|| RouteError::Unknown(id.to_string()))?;
        if !route.is_active() {
            return Err(RouteError::NotActive(id.to_string()));
        }
        route.state = RouteState::Deactivated;
        for pos in &route.positions {
            if let Some(item) = layout.item_mut(&pos.item) {
                if item.active_route.as_deref() == Some(id) {
                    item.active_route = None;
                }
            }
        }
        let begin_type = layout
            .item(&route.begin_signal)
            .and_then(|item| item.signal())
            .map(|head| head.signal_type.clone());
        if let Some(aspect) = begin_type.and_then(|ty| signals.restrictive_aspect(&ty)) {
            let name = aspect.name.clone();
            let _ = layout.set_active_aspect(&route.begin_signal, &name);
        }
        info!("route {} deactivated", id);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
