//! Simulation clock.
//!
//! The simulation runs on a time-of-day clock independent of wall time.
//! `SimTime` is a second-resolution time of day; `SimTime::ZERO` doubles as
//! the "unspecified" sentinel used by timetable entries without a scheduled
//! time. All scheduling decisions (departure readiness, suggestion rejection
//! windows, recompute intervals) are evaluated against this clock, so
//! time-warped simulations behave the same as real-time ones.

use std::fmt;

use bevy::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds of simulated time advanced per `FixedUpdate` tick at 1x speed.
pub const SECONDS_PER_TICK: u32 = 1;

// =============================================================================
// SimTime
// =============================================================================

/// A time of day with one-second resolution.
///
/// Stored as seconds since midnight. `SimTime::ZERO` means "unspecified"
/// when used in timetable fields. Serializes as `"HH:MM:SS"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u32);

impl SimTime {
    /// The unspecified-time sentinel.
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        SimTime(hours * 3600 + minutes * 60 + seconds)
    }

    pub fn from_seconds(seconds: u32) -> Self {
        SimTime(seconds)
    }

    pub fn as_seconds(self) -> u32 {
        self.0
    }

    /// True for the unspecified-time sentinel.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Signed difference `self - earlier` in seconds.
    pub fn seconds_since(self, earlier: SimTime) -> i64 {
        i64::from(self.0) - i64::from(earlier.0)
    }

    /// Signed difference `self - earlier` in whole minutes, rounded toward
    /// negative infinity.
    pub fn minutes_since(self, earlier: SimTime) -> i64 {
        self.seconds_since(earlier).div_euclid(60)
    }

    pub fn plus_secs(self, seconds: u32) -> SimTime {
        SimTime(self.0 + seconds)
    }

    pub fn plus_minutes(self, minutes: u32) -> SimTime {
        SimTime(self.0 + minutes * 60)
    }

    /// `"HH:MM:SS"` rendering. Hours wrap at 24 for display only.
    pub fn formatted(self) -> String {
        let h = (self.0 / 3600) % 24;
        let m = (self.0 / 60) % 60;
        let s = self.0 % 60;
        format!("{:02}:{:02}:{:02}", h, m, s)
    }

    fn parse(text: &str) -> Option<SimTime> {
        let mut parts = text.splitn(3, ':');
        let h: u32 = parts.next()?.parse().ok()?;
        let m: u32 = parts.next()?.parse().ok()?;
        let s: u32 = parts.next()?.parse().ok()?;
        if m >= 60 || s >= 60 {
            return None;
        }
        Some(SimTime::from_hms(h, m, s))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        SimTime::parse(&text)
            .ok_or_else(|| D::Error::custom(format!("invalid time of day: {text:?}")))
    }
}

// =============================================================================
// SimClock resource
// =============================================================================

/// The authoritative simulation clock.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    pub time: SimTime,
    pub speed: f32,
    pub paused: bool,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            time: SimTime::from_hms(6, 0, 0), // operations start at 6 AM
            speed: 1.0,
            paused: false,
        }
    }
}

impl SimClock {
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        // Speed scaling is handled by the host adjusting the FixedUpdate
        // timestep, so each tick advances by a constant amount of sim time.
        self.time = self.time.plus_secs(SECONDS_PER_TICK);
    }
}

/// Advances the simulation clock each tick.
pub fn tick_sim_clock(mut clock: ResMut<SimClock>) {
    clock.tick();
}

// =============================================================================
// Tests
// =============================================================================
