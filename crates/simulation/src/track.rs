//! Track topology.
//!
//! ## Data model
//! - `TrackItem`: one piece of infrastructure (line section, points, signal,
//!   platform, …) with its static links and live occupancy state
//! - `Position`: a point on an item plus the item it was entered from, which
//!   fixes the direction of travel for forward walks
//! - `Place`: a named operating location (station, junction, depot)
//! - `TrackLayout`: the source-of-truth resource holding the item and place
//!   tables
//!
//! Items reference each other by id. The next/previous links are relations,
//! not ownership; walking the graph is always done through the layout.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signals::{SignalAspect, SignalLibrary};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum TrackError {
    #[error("unknown track item: {0}")]
    UnknownItem(String),
    #[error("not a signal: {0}")]
    NotASignal(String),
}

// =============================================================================
// Track items
// =============================================================================

/// Live state of a signal head, carried on its track item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalHead {
    /// Name of the `SignalType` in the library.
    pub signal_type: String,
    /// Aspect currently displayed, as driven by the interlocking.
    pub active_aspect: String,
    /// Operator override; wins over `active_aspect` until cleared.
    pub manual_aspect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackItemKind {
    /// Plain running line section.
    Line,
    /// Zero-visual connector between two items.
    InvisibleLink,
    /// A set of points (switch).
    Points,
    /// Platform or other place-attached track.
    Platform,
    /// Buffer stop / layout boundary.
    End,
    Signal(SignalHead),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackItem {
    pub id: String,
    pub kind: TrackItemKind,
    /// Physical length in meters; 0 when not applicable.
    pub real_length: f32,
    pub max_speed: f32,
    /// Track designation within a place (platform number); empty when none.
    pub track_code: String,
    pub place_code: Option<String>,
    pub next_item: Option<String>,
    pub previous_item: Option<String>,
    /// Crossing partner (level crossing / diamond), if any.
    pub conflict_item: Option<String>,
    pub train_present: bool,
    pub active_route: Option<String>,
}

impl TrackItem {
    pub fn is_signal(&self) -> bool {
        matches!(self.kind, TrackItemKind::Signal(_))
    }

    pub fn signal(&self) -> Option<&SignalHead> {
        match &self.kind {
            TrackItemKind::Signal(head) => Some(head),
            _ => None,
        }
    }

    /// Items that count toward the utilization metric.
    pub fn counts_for_utilization(&self) -> bool {
        matches!(
            self.kind,
            TrackItemKind::Line
                | TrackItemKind::InvisibleLink
                | TrackItemKind::Points
                | TrackItemKind::Signal(_)
        )
    }
}

// =============================================================================
// Positions
// =============================================================================

/// A point on a track item. `previous_item` names the item this position was
/// entered from, which determines the forward direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub item: String,
    pub previous_item: String,
    /// Offset in meters from the entry end of the item.
    pub offset: f32,
}

impl Position {
    pub fn new(item: &str, previous_item: &str, offset: f32) -> Self {
        Self {
            item: item.to_string(),
            previous_item: previous_item.to_string(),
            offset,
        }
    }

    /// The next position along the current direction of travel, or `None`
    /// when the walk leaves the layout.
    pub fn next(&self, layout: &TrackLayout) -> Option<Position> {
        let item = layout.item(&self.item)?;
        let next_id = if item.previous_item.as_deref() == Some(self.previous_item.as_str()) {
            item.next_item.as_deref()
        } else if item.next_item.as_deref() == Some(self.previous_item.as_str()) {
            item.previous_item.as_deref()
        } else {
            // Entered from an unlinked side; direction is unknown.
            None
        }?;
        Some(Position::new(next_id, &self.item, 0.0))
    }
}

// =============================================================================
// Places
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub code: String,
    pub name: String,
}

// =============================================================================
// Layout resource
// =============================================================================

/// The source of truth for track infrastructure.
#[derive(Resource, Debug, Clone, Default)]
pub struct TrackLayout {
    items: HashMap<String, TrackItem>,
    item_order: Vec<String>,
    places: HashMap<String, Place>,
}

impl TrackLayout {
    pub fn add_item(&mut self, item: TrackItem) {
        if !self.items.contains_key(&item.id) {
            self.item_order.push(item.id.clone());
        }
        self.items.insert(item.id.clone(), item);
    }

    pub fn add_place(&mut self, place: Place) {
        self.places.insert(place.code.clone(), place);
    }

    pub fn item(&self, id: &str) -> Option<&TrackItem> {
        self.items.get(id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut TrackItem> {
        self.items.get_mut(id)
    }

    pub fn place(&self, code: &str) -> Option<&Place> {
        self.places.get(code)
    }

    /// Items in insertion order.
    pub fn iter_items(&self) -> impl Iterator<Item = &TrackItem> {
        self.item_order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn item_count(&self) -> usize {
        self.item_order.len()
    }

    // -------------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------------

    pub fn set_train_present(&mut self, id: &str, present: bool) {
        if let Some(item) = self.items.get_mut(id) {
            item.train_present = present;
        }
    }

    pub fn clear_occupancy(&mut self) {
        for item in self.items.values_mut() {
            item.train_present = false;
        }
    }

    /// Percentage of occupied items among lines, invisible links, signals and
    /// points. A coarse congestion proxy used to bias suggestion scores; it
    /// never gates safety.
    pub fn utilization_percent(&self) -> f64 {
        let mut occupied = 0u32;
        let mut total = 0u32;
        for item in self.items.values() {
            if item.counts_for_utilization() {
                total += 1;
                if item.train_present {
                    occupied += 1;
                }
            }
        }
        if total == 0 {
            return 0.0;
        }
        f64::from(occupied) * 100.0 / f64::from(total)
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    /// The aspect a signal currently displays. A manual override wins over
    /// the interlocking-driven aspect.
    pub fn active_aspect<'a>(
        &self,
        id: &str,
        library: &'a SignalLibrary,
    ) -> Option<&'a SignalAspect> {
        let head = self.item(id)?.signal()?;
        let name = head.manual_aspect.as_deref().unwrap_or(&head.active_aspect);
        library.aspect(name)
    }

    /// Sets the interlocking-driven aspect of a signal.
    pub fn set_active_aspect(&mut self, id: &str, aspect: &str) -> Result<(), TrackError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackError::UnknownItem(id.to_string()))?;
        match &mut item.kind {
            TrackItemKind::Signal(head) => {
                head.active_aspect = aspect.to_string();
                Ok(())
            }
            _ => Err(TrackError::NotASignal(id.to_string())),
        }
    }

    /// Installs (or with `None`, clears) an operator aspect override.
    pub fn set_manual_aspect(
        &mut self,
        id: &str,
        aspect: Option<String>,
    ) -> Result<(), TrackError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| TrackError::UnknownItem(id.to_string()))?;
        match &mut item.kind {
            TrackItemKind::Signal(head) => {
                head.manual_aspect = aspect;
                Ok(())
            }
            _ => Err(TrackError::NotASignal(id.to_string())),
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Convenience constructors for layout building (scenarios and tests).
impl TrackItem {
    pub fn line(id: &str, length: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: TrackItemKind::Line,
            real_length: length,
            max_speed: 44.0,
            track_code: String::new(),
            place_code: None,
            next_item: None,
            previous_item: None,
            conflict_item: None,
            train_present: false,
            active_route: None,
        }
    }

    pub fn platform(id: &str, length: f32, place: &str, track_code: &str) -> Self {
        Self {
            kind: TrackItemKind::Platform,
            place_code: Some(place.to_string()),
            track_code: track_code.to_string(),
            ..Self::line(id, length)
        }
    }

    pub fn signal(id: &str, signal_type: &str, aspect: &str) -> Self {
        Self {
            kind: TrackItemKind::Signal(SignalHead {
                signal_type: signal_type.to_string(),
                active_aspect: aspect.to_string(),
                manual_aspect: None,
            }),
            ..Self::line(id, 0.0)
        }
    }

    pub fn end(id: &str) -> Self {
        Self {
            kind: TrackItemKind::End,
            ..Self::line(id, 0.0)
        }
    }

    pub fn linked(mut self, previous: Option<&str>, next: Option<&str>) -> Self {
        self.previous_item = previous.map(str::to_string);
        self.next_item = next.map(str::to_string);
        self
    }

    pub fn with_conflict(mut self, conflict: &str) -> Self {
        self.conflict_item = Some(conflict.to_string());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
