//! Interlocking route managers.
//!
//! Route activation is guarded by a chain of vetoes. Every registered
//! manager must accept a route before it may be set; any error blocks it.
//! A veto error carries a structured `conflicting_route` cause when the
//! refusal is due to another active route; the human-readable message keeps
//! the legacy `"conflicting route <ID> is active"` phrase so callers that
//! still parse text keep working.

use std::collections::HashSet;

use bevy::prelude::*;
use thiserror::Error;

use crate::routes::{Route, RouteState, RouteTable};
use crate::track::TrackLayout;

// =============================================================================
// Veto errors
// =============================================================================

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct VetoError {
    pub message: String,
    /// Id of the already-active route that blocks activation, when that is
    /// the cause.
    pub conflicting_route: Option<String>,
}

impl VetoError {
    pub fn conflicting(route_id: &str) -> Self {
        Self {
            message: format!("conflicting route {} is active", route_id),
            conflicting_route: Some(route_id.to_string()),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conflicting_route: None,
        }
    }
}

/// Extracts a route id from a legacy veto message of the form
/// `"... conflicting route <ID> is active ..."`. Compatibility shim for
/// managers that do not fill the structured cause.
pub fn parse_conflicting_route_id(message: &str) -> Option<String> {
    let parts: Vec<&str> = message.split_whitespace().collect();
    for window in parts.windows(3) {
        if window[0].eq_ignore_ascii_case("conflicting") && window[1].eq_ignore_ascii_case("route")
        {
            let id = window[2].trim_matches(|c: char| c == ':' || c.is_whitespace());
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

// =============================================================================
// Veto trait & registry
// =============================================================================

pub trait RouteVeto: Send + Sync {
    fn name(&self) -> &str;

    /// Ok when the route may legally be activated in the current state.
    fn can_activate(
        &self,
        route: &Route,
        routes: &RouteTable,
        layout: &TrackLayout,
    ) -> Result<(), VetoError>;
}

/// All registered route managers. Defaults to the standard manager.
#[derive(Resource)]
pub struct InterlockingRegistry {
    vetoes: Vec<Box<dyn RouteVeto>>,
}

impl Default for InterlockingRegistry {
    fn default() -> Self {
        Self {
            vetoes: vec![Box::new(StandardRouteManager)],
        }
    }
}

impl InterlockingRegistry {
    pub fn empty() -> Self {
        Self { vetoes: Vec::new() }
    }

    pub fn register(&mut self, veto: Box<dyn RouteVeto>) {
        self.vetoes.push(veto);
    }

    pub fn vetoes(&self) -> impl Iterator<Item = &dyn RouteVeto> {
        self.vetoes.iter().map(|v| v.as_ref())
    }

    /// First refusal among the registered managers, or Ok when all accept.
    pub fn can_activate(
        &self,
        route: &Route,
        routes: &RouteTable,
        layout: &TrackLayout,
    ) -> Result<(), VetoError> {
        for veto in &self.vetoes {
            veto.can_activate(route, routes, layout)?;
        }
        Ok(())
    }
}

// =============================================================================
// Standard manager
// =============================================================================

/// The built-in manager: a route must currently be deactivated, and no other
/// active route may claim any of its items. The begin signal item is left
/// out of the overlap check so that consecutive routes (one ending where the
/// next begins) stay compatible.
pub struct StandardRouteManager;

impl RouteVeto for StandardRouteManager {
    fn name(&self) -> &str {
        "standard"
    }

    fn can_activate(
        &self,
        route: &Route,
        routes: &RouteTable,
        _layout: &TrackLayout,
    ) -> Result<(), VetoError> {
        if route.state != RouteState::Deactivated {
            return Err(VetoError::other(format!(
                "route {} is already active",
                route.id
            )));
        }
        let claimed: HashSet<&str> = route
            .positions
            .iter()
            .skip(1)
            .map(|pos| pos.item.as_str())
            .collect();
        for other in routes.iter() {
            if other.id == route.id || !other.is_active() {
                continue;
            }
            let overlap = other
                .positions
                .iter()
                .skip(1)
                .any(|pos| claimed.contains(pos.item.as_str()));
            if overlap {
                return Err(VetoError::conflicting(&other.id));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
