//! The five rotor controller families.

pub mod gs232b;
pub mod jrk;
pub mod monstrum;
pub mod spid;
pub mod stepper;

pub use gs232b::Gs232b;
pub use jrk::Jrk;
pub use monstrum::Monstrum;
pub use spid::AlphaSpid;
pub use stepper::Stepper;

use crate::{backend::Position, geometry::Degrees, settings::SettingsStore};
use std::time::Duration;

/// Slew speeds used to estimate how long a move takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRates {
    /// Azimuth speed in degrees per second.
    pub azimuth: f64,
    /// Elevation speed in degrees per second.
    pub elevation: f64,
}

impl SlewRates {
    /// Both axes move at once, so the slower axis decides.
    pub fn estimate(&self, from: Position, to_az: Degrees, to_el: Degrees) -> Duration {
        let az = axis_time((to_az - from.azimuth).abs(), self.azimuth);
        let el = axis_time((to_el - from.elevation).abs(), self.elevation);
        Duration::from_secs_f64(az.max(el))
    }

    pub(crate) fn read_settings(&mut self, store: &dyn SettingsStore) {
        self.azimuth = positive_or(store.get_f64("AzSpeed", self.azimuth), self.azimuth);
        self.elevation = positive_or(store.get_f64("ElSpeed", self.elevation), self.elevation);
    }

    pub(crate) fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.set_value("AzSpeed", self.azimuth.into());
        store.set_value("ElSpeed", self.elevation.into());
    }
}

fn axis_time(distance: Degrees, speed: f64) -> f64 {
    if distance.is_finite() && speed > 0.0 {
        distance / speed
    } else {
        0.0
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { default }
}
