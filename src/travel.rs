//! Travel-time collaborators consumed by the job search.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{RegionId, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Car,
    Transit,
}

/// Reference departure time for commute skims: 08:00.
pub const PEAK_HOUR_SECONDS: u32 = 8 * 3600;

pub trait TravelTimes: Send + Sync {
    fn travel_time_minutes(
        &self,
        origin: ZoneId,
        destination: RegionId,
        time_of_day_seconds: u32,
        mode: Mode,
    ) -> f64;
}

/// Probability that a worker accepts a commute of the given length.
/// Expected to be non-increasing in `minutes`.
pub trait CommuteProbability: Send + Sync {
    fn probability(&self, minutes: u32, mode: Mode) -> f64;
}

/// Static zone-to-region skim. Pairs that were never set are unreachable.
#[derive(Debug, Clone, Default)]
pub struct TravelTimeMatrix {
    minutes: HashMap<(ZoneId, RegionId), f64>,
}

impl TravelTimeMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, origin: ZoneId, destination: RegionId, minutes: f64) {
        self.minutes.insert((origin, destination), minutes);
    }

    pub fn with(mut self, origin: ZoneId, destination: RegionId, minutes: f64) -> Self {
        self.set(origin, destination, minutes);
        self
    }
}

impl TravelTimes for TravelTimeMatrix {
    fn travel_time_minutes(
        &self,
        origin: ZoneId,
        destination: RegionId,
        _time_of_day_seconds: u32,
        _mode: Mode,
    ) -> f64 {
        self.minutes
            .get(&(origin, destination))
            .copied()
            .unwrap_or(f64::INFINITY)
    }
}

/// `exp(-beta * minutes)`, cut to zero beyond `max_minutes`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExponentialCommuteDecay {
    pub beta: f64,
    #[serde(default)]
    pub max_minutes: Option<u32>,
}

impl CommuteProbability for ExponentialCommuteDecay {
    fn probability(&self, minutes: u32, _mode: Mode) -> f64 {
        if let Some(max) = self.max_minutes {
            if minutes > max {
                return 0.0;
            }
        }
        (-self.beta * minutes as f64).exp()
    }
}
