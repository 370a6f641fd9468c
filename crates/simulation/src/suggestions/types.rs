//! Data types, events, resources and constants for the suggestion engine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::SimTime;
use crate::routes::RouteError;
use crate::track::TrackError;
use crate::trains::{TrainError, TrainId};

// =============================================================================
// Scoring constants
// =============================================================================

/// Base score of a reactive departure route activation.
pub const DEPARTURE_BASE_SCORE: f64 = 1.0;
/// Score added per minute of departure delay.
pub const DELAY_WEIGHT: f64 = 10.0;
/// Bonus when the departing train already stands on the scheduled track.
pub const TRACK_MATCH_BONUS: f64 = 2.0;
/// Base score of a predictive route activation. Deliberately above the
/// reactive departure base so prevention outranks cure.
pub const PREDICTIVE_BASE_SCORE: f64 = 15.0;
/// Base score of a proceed-with-caution suggestion.
pub const PROCEED_BASE_SCORE: f64 = 5.0;
/// Base score of a manual signal override suggestion.
pub const OVERRIDE_BASE_SCORE: f64 = 7.0;
/// Base score of a persistent-route deactivation suggestion.
pub const DEACTIVATE_BASE_SCORE: f64 = 8.0;
/// Score added per departure blocked by the persistent route.
pub const DEACTIVATE_PER_BLOCKED: f64 = 3.0;
/// At most this many deactivation suggestions per snapshot.
pub const MAX_DEACTIVATION_SUGGESTIONS: usize = 5;
/// Rejection window applied when the operator gives no duration.
pub const DEFAULT_REJECT_MINUTES: u32 = 5;

// =============================================================================
// Suggestions
// =============================================================================

/// Category of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionKind {
    RouteActivate,
    RouteDeactivate,
    TrainProceedWithCaution,
    SignalOverride,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::RouteActivate => "ROUTE_ACTIVATE",
            SuggestionKind::RouteDeactivate => "ROUTE_DEACTIVATE",
            SuggestionKind::TrainProceedWithCaution => "TRAIN_PROCEED_WITH_CAUTION",
            SuggestionKind::SignalOverride => "SIGNAL_OVERRIDE",
        }
    }
}

/// An actionable command the operator may accept. Parameters are opaque to
/// the engine and passed through to the host verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionAction {
    pub object: String,
    pub action: String,
    pub params: serde_json::Value,
}

impl SuggestionAction {
    pub fn new(object: &str, action: &str, params: serde_json::Value) -> Self {
        Self {
            object: object.to_string(),
            action: action.to_string(),
            params,
        }
    }
}

/// A recommended operator action with a score and an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub kind: SuggestionKind,
    pub title: String,
    pub reason: String,
    pub score: f64,
    pub actions: Vec<SuggestionAction>,
}

/// The ranked suggestion list most recently computed, replaced wholesale on
/// every recomputation and broadcast by value in `SuggestionsUpdated`.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsSnapshot {
    pub items: Vec<Suggestion>,
    #[serde(rename = "generatedAt")]
    pub generated_at: SimTime,
}

// =============================================================================
// Suggestion ids
// =============================================================================

/// Parsed form of a suggestion id. The textual grammar is the stable
/// contract with clients: ids are composed from the kind name and business
/// keys, never from transient indices, so a suggestion keeps its id across
/// recomputations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuggestionId {
    RouteActivate {
        train: TrainId,
        route: String,
        predictive: bool,
    },
    RouteDeactivate {
        route: String,
    },
    ProceedWithCaution {
        train: TrainId,
    },
    SignalOverride {
        signal: String,
        aspect: String,
    },
}

impl SuggestionId {
    pub fn kind(&self) -> SuggestionKind {
        match self {
            SuggestionId::RouteActivate { .. } => SuggestionKind::RouteActivate,
            SuggestionId::RouteDeactivate { .. } => SuggestionKind::RouteDeactivate,
            SuggestionId::ProceedWithCaution { .. } => SuggestionKind::TrainProceedWithCaution,
            SuggestionId::SignalOverride { .. } => SuggestionKind::SignalOverride,
        }
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionId::RouteActivate {
                train,
                route,
                predictive,
            } => {
                write!(f, "{}:{}:{}", SuggestionKind::RouteActivate.as_str(), train, route)?;
                if *predictive {
                    write!(f, ":predictive")?;
                }
                Ok(())
            }
            SuggestionId::RouteDeactivate { route } => {
                write!(f, "{}:{}", SuggestionKind::RouteDeactivate.as_str(), route)
            }
            SuggestionId::ProceedWithCaution { train } => {
                write!(
                    f,
                    "{}:{}",
                    SuggestionKind::TrainProceedWithCaution.as_str(),
                    train
                )
            }
            SuggestionId::SignalOverride { signal, aspect } => {
                write!(
                    f,
                    "{}:{}:{}",
                    SuggestionKind::SignalOverride.as_str(),
                    signal,
                    aspect
                )
            }
        }
    }
}

impl FromStr for SuggestionId {
    type Err = SuggestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SuggestionError::InvalidId(s.to_string());
        let parts: Vec<&str> = s.split(':').collect();
        match parts.first().copied() {
            Some("ROUTE_ACTIVATE") => {
                let predictive = match parts.len() {
                    3 => false,
                    4 if parts[3] == "predictive" => true,
                    _ => return Err(invalid()),
                };
                let train: TrainId = parts[1].parse().map_err(|_| invalid())?;
                if parts[2].is_empty() {
                    return Err(invalid());
                }
                Ok(SuggestionId::RouteActivate {
                    train,
                    route: parts[2].to_string(),
                    predictive,
                })
            }
            Some("ROUTE_DEACTIVATE") => {
                if parts.len() != 2 || parts[1].is_empty() {
                    return Err(invalid());
                }
                Ok(SuggestionId::RouteDeactivate {
                    route: parts[1].to_string(),
                })
            }
            Some("TRAIN_PROCEED_WITH_CAUTION") => {
                if parts.len() != 2 {
                    return Err(invalid());
                }
                let train: TrainId = parts[1].parse().map_err(|_| invalid())?;
                Ok(SuggestionId::ProceedWithCaution { train })
            }
            Some("SIGNAL_OVERRIDE") => {
                if parts.len() != 3 || parts[1].is_empty() || parts[2].is_empty() {
                    return Err(invalid());
                }
                Ok(SuggestionId::SignalOverride {
                    signal: parts[1].to_string(),
                    aspect: parts[2].to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum SuggestionError {
    #[error("invalid suggestion id: {0}")]
    InvalidId(String),
    #[error("suggestion engine not initialized")]
    NotInitialized,
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Track(#[from] TrackError),
}

// =============================================================================
// Engine state
// =============================================================================

/// Scheduler and rejection state of the suggestion engine. Holds no
/// simulation data; the snapshot lives in `SuggestionsSnapshot`.
#[derive(Resource, Debug, Clone, Default)]
pub struct SuggestionEngine {
    /// Simulation time of the last recomputation.
    pub last_computed_at: Option<SimTime>,
    rejected_until: HashMap<String, SimTime>,
}

impl SuggestionEngine {
    /// Suppresses a suggestion id until `minutes` of simulation time have
    /// passed. Zero minutes falls back to the default window.
    pub fn reject(&mut self, id: &str, minutes: u32, now: SimTime) {
        let minutes = if minutes == 0 {
            DEFAULT_REJECT_MINUTES
        } else {
            minutes
        };
        self.reject_until(id, now.plus_minutes(minutes));
    }

    pub fn reject_until(&mut self, id: &str, until: SimTime) {
        self.rejected_until.insert(id.to_string(), until);
    }

    /// True while the id is inside its rejection window. The boundary is
    /// exclusive: at exactly `until` the id is eligible again.
    pub fn is_rejected(&self, id: &str, now: SimTime) -> bool {
        self.rejected_until
            .get(id)
            .is_some_and(|until| now < *until)
    }

    /// Discards all engine state; used when a new simulation is loaded.
    pub fn reset(&mut self) {
        self.last_computed_at = None;
        self.rejected_until.clear();
    }
}

// =============================================================================
// Events
// =============================================================================

/// Command: force an immediate recomputation.
#[derive(Event, Debug, Clone, Default)]
pub struct RecomputeSuggestions;

/// Command: execute the suggestion with the given id.
#[derive(Event, Debug, Clone)]
pub struct AcceptSuggestion {
    pub id: String,
}

/// Command: suppress the suggestion for the given number of simulation
/// minutes (0 = default window).
#[derive(Event, Debug, Clone)]
pub struct RejectSuggestion {
    pub id: String,
    pub minutes: u32,
}

/// Broadcast after every recomputation, carrying the snapshot by value.
#[derive(Event, Debug, Clone)]
pub struct SuggestionsUpdated {
    pub snapshot: SuggestionsSnapshot,
}

/// Emitted when an operator command could not be executed; the message is
/// the host error verbatim.
#[derive(Event, Debug, Clone)]
pub struct SuggestionCommandFailed {
    pub id: String,
    pub message: String,
}

// =============================================================================
// Tests
// =============================================================================
