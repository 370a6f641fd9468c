//! Simulation options.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Tunable options for the running simulation. Zero values fall back to the
/// documented defaults through the accessor methods, so a half-filled
/// options block never disables a subsystem by accident.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct SimOptions {
    pub suggestions_enabled: bool,
    /// Minutes between periodic suggestion recomputations.
    pub suggestions_interval_minutes: u32,
    /// Cap on the number of suggestions per snapshot.
    pub suggest_max_items: usize,
    /// Only consider predictive route setting within this distance.
    pub suggest_predictive_max_distance_m: f32,
    /// Only consider predictive route setting within this ETA.
    pub suggest_predictive_max_eta_secs: f64,
    /// Safety margin between predicted occupation windows.
    pub suggest_safety_buffer_secs: f64,
}

pub const DEFAULT_INTERVAL_MINUTES: u32 = 3;
pub const DEFAULT_MAX_ITEMS: usize = 50;
pub const DEFAULT_PREDICTIVE_MAX_DISTANCE_M: f32 = 1_000.0;
pub const DEFAULT_PREDICTIVE_MAX_ETA_SECS: f64 = 60.0;
pub const DEFAULT_SAFETY_BUFFER_SECS: f64 = 5.0;

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            suggestions_enabled: true,
            suggestions_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            suggest_max_items: DEFAULT_MAX_ITEMS,
            suggest_predictive_max_distance_m: DEFAULT_PREDICTIVE_MAX_DISTANCE_M,
            suggest_predictive_max_eta_secs: DEFAULT_PREDICTIVE_MAX_ETA_SECS,
            suggest_safety_buffer_secs: DEFAULT_SAFETY_BUFFER_SECS,
        }
    }
}

impl SimOptions {
    pub fn interval_minutes(&self) -> u32 {
        if self.suggestions_interval_minutes == 0 {
            DEFAULT_INTERVAL_MINUTES
        } else {
            self.suggestions_interval_minutes
        }
    }

    pub fn max_items(&self) -> usize {
        if self.suggest_max_items == 0 {
            DEFAULT_MAX_ITEMS
        } else {
            self.suggest_max_items
        }
    }

    pub fn predictive_max_distance(&self) -> f32 {
        if self.suggest_predictive_max_distance_m <= 0.0 {
            DEFAULT_PREDICTIVE_MAX_DISTANCE_M
        } else {
            self.suggest_predictive_max_distance_m
        }
    }

    pub fn predictive_max_eta(&self) -> f64 {
        if self.suggest_predictive_max_eta_secs <= 0.0 {
            DEFAULT_PREDICTIVE_MAX_ETA_SECS
        } else {
            self.suggest_predictive_max_eta_secs
        }
    }

    pub fn safety_buffer(&self) -> f64 {
        if self.suggest_safety_buffer_secs <= 0.0 {
            DEFAULT_SAFETY_BUFFER_SECS
        } else {
            self.suggest_safety_buffer_secs
        }
    }
}
