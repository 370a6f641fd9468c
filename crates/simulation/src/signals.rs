//! Signal aspect library.
//!
//! Aspects describe what a signal shows and what that means for a driver:
//! a list of speed actions plus a "means proceed" flag. Signal types group
//! the aspects a given signal head can display. The library is a lookup
//! resource; the current aspect shown by a concrete signal lives on its
//! track item (see `track`).

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Aspect data
// =============================================================================

/// A single driver instruction attached to an aspect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectAction {
    /// Target speed in m/s. A large value means "no restriction".
    pub speed: f32,
}

/// Speed used for aspects that impose no restriction.
pub const UNRESTRICTED_SPEED: f32 = 999.0;

/// A signal indication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAspect {
    pub name: String,
    pub actions: Vec<AspectAction>,
    pub means_proceed: bool,
}

impl SignalAspect {
    pub fn new(name: &str, actions: Vec<AspectAction>, means_proceed: bool) -> Self {
        Self {
            name: name.to_string(),
            actions,
            means_proceed,
        }
    }

    /// The aspect's representative speed: the first action's target, if any.
    pub fn representative_speed(&self) -> Option<f32> {
        self.actions.first().map(|a| a.speed)
    }
}

/// The set of aspects a signal head can display, in preference order from
/// most restrictive to least restrictive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalType {
    pub name: String,
    pub aspect_names: Vec<String>,
}

// =============================================================================
// Library resource
// =============================================================================

/// Name of the built-in three-aspect block signalling type.
pub const BLOCK_SIGNAL_TYPE: &str = "BLOCK_3_ASPECT";

/// Lookup tables for aspects and signal types.
#[derive(Resource, Debug, Clone)]
pub struct SignalLibrary {
    aspects: HashMap<String, SignalAspect>,
    types: HashMap<String, SignalType>,
}

impl Default for SignalLibrary {
    fn default() -> Self {
        let mut lib = Self {
            aspects: HashMap::new(),
            types: HashMap::new(),
        };
        lib.add_aspect(SignalAspect::new(
            "STOP",
            vec![AspectAction { speed: 0.0 }],
            false,
        ));
        lib.add_aspect(SignalAspect::new(
            "CAUTION",
            vec![AspectAction { speed: 10.0 }],
            true,
        ));
        lib.add_aspect(SignalAspect::new(
            "CLEAR",
            vec![AspectAction {
                speed: UNRESTRICTED_SPEED,
            }],
            true,
        ));
        lib.add_type(SignalType {
            name: BLOCK_SIGNAL_TYPE.to_string(),
            aspect_names: vec![
                "STOP".to_string(),
                "CAUTION".to_string(),
                "CLEAR".to_string(),
            ],
        });
        lib
    }
}

impl SignalLibrary {
    pub fn add_aspect(&mut self, aspect: SignalAspect) {
        self.aspects.insert(aspect.name.clone(), aspect);
    }

    pub fn add_type(&mut self, signal_type: SignalType) {
        self.types.insert(signal_type.name.clone(), signal_type);
    }

    pub fn aspect(&self, name: &str) -> Option<&SignalAspect> {
        self.aspects.get(name)
    }

    /// Case-insensitive aspect lookup, for operator-supplied names.
    pub fn aspect_ignore_case(&self, name: &str) -> Option<&SignalAspect> {
        self.aspects
            .values()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn signal_type(&self, name: &str) -> Option<&SignalType> {
        self.types.get(name)
    }

    /// The proceed aspect with the lowest representative speed, scanning the
    /// type's aspects in declared order so ties resolve stably. Used when a
    /// conservative manual override is wanted.
    pub fn cautious_proceed_aspect(&self, type_name: &str) -> Option<&SignalAspect> {
        let ty = self.signal_type(type_name)?;
        let mut best: Option<&SignalAspect> = None;
        let mut best_speed = f32::INFINITY;
        for name in &ty.aspect_names {
            let Some(aspect) = self.aspect(name) else {
                continue;
            };
            if !aspect.means_proceed {
                continue;
            }
            let speed = aspect.representative_speed().unwrap_or(f32::INFINITY);
            if speed < best_speed {
                best = Some(aspect);
                best_speed = speed;
            }
        }
        best
    }

    /// The proceed aspect with the highest representative speed; what a
    /// signal shows once a route from it has been set.
    pub fn clear_proceed_aspect(&self, type_name: &str) -> Option<&SignalAspect> {
        let ty = self.signal_type(type_name)?;
        let mut best: Option<&SignalAspect> = None;
        let mut best_speed = f32::NEG_INFINITY;
        for name in &ty.aspect_names {
            let Some(aspect) = self.aspect(name) else {
                continue;
            };
            if !aspect.means_proceed {
                continue;
            }
            let speed = aspect.representative_speed().unwrap_or(f32::NEG_INFINITY);
            if speed > best_speed {
                best = Some(aspect);
                best_speed = speed;
            }
        }
        best
    }

    /// The most restrictive aspect of a type: the first non-proceed aspect in
    /// declared order, falling back to the first aspect.
    pub fn restrictive_aspect(&self, type_name: &str) -> Option<&SignalAspect> {
        let ty = self.signal_type(type_name)?;
        ty.aspect_names
            .iter()
            .filter_map(|n| self.aspect(n))
            .find(|a| !a.means_proceed)
            .or_else(|| ty.aspect_names.first().and_then(|n| self.aspect(n)))
    }
}

// =============================================================================
// Tests
// =============================================================================
