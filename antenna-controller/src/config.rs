use crate::{geometry::Degrees, settings::SettingsStore};
use log::warn;
use serde::{Deserialize, Serialize};

/// The rotor controller families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotorType {
    /// Stepper motors driven through a parallel port.
    #[default]
    Stepper,
    /// Yaesu GS-232B.
    Gs232b,
    /// Alfa-SPID Rot2Prog.
    AlphaSpid,
    /// Pololu Jrk motor controllers.
    Jrk,
    /// Monstrum cross-boom X-Y mount.
    MonstrumXy,
}

impl RotorType {
    pub const ALL: [RotorType; 5] = [
        RotorType::Stepper,
        RotorType::Gs232b,
        RotorType::AlphaSpid,
        RotorType::Jrk,
        RotorType::MonstrumXy,
    ];

    /// Code stored in the settings store.
    pub fn code(self) -> i64 {
        match self {
            RotorType::Stepper => 0,
            RotorType::Gs232b => 1,
            RotorType::AlphaSpid => 2,
            RotorType::Jrk => 3,
            RotorType::MonstrumXy => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// How serial-protocol backends reach their controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommType {
    /// A local serial port, configured per backend.
    #[default]
    Serial,
    /// A TCP connection to `host:port`, e.g. a serial-to-ethernet bridge.
    Network,
}

impl CommType {
    pub fn code(self) -> i64 {
        match self {
            CommType::Serial => 0,
            CommType::Network => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CommType::Serial),
            1 => Some(CommType::Network),
            _ => None,
        }
    }
}

/// Inclusive travel range of one axis. `min <= max` always holds and neither
/// bound is NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Degrees, Degrees)", into = "(Degrees, Degrees)")]
pub struct Limits {
    min: Degrees,
    max: Degrees,
}

impl Limits {
    /// Creates a range, swapping the bounds if they are given inverted.
    ///
    /// A NaN bound leaves that side of the range open.
    pub fn new(a: Degrees, b: Degrees) -> Self {
        let a = if a.is_nan() { Degrees::NEG_INFINITY } else { a };
        let b = if b.is_nan() { Degrees::INFINITY } else { b };
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn min(&self) -> Degrees {
        self.min
    }

    pub fn max(&self) -> Degrees {
        self.max
    }

    pub fn clamp(&self, value: Degrees) -> Degrees {
        value.clamp(self.min, self.max)
    }
}

impl From<(Degrees, Degrees)> for Limits {
    fn from((min, max): (Degrees, Degrees)) -> Self {
        Limits::new(min, max)
    }
}

impl From<Limits> for (Degrees, Degrees) {
    fn from(limits: Limits) -> Self {
        (limits.min, limits.max)
    }
}

/// Rest position of the antenna.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParkPosition {
    pub azimuth: Degrees,
    pub elevation: Degrees,
}

/// Configuration shared by all backends, owned by the [`Rotor`](crate::Rotor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotorConfig {
    pub rotor_type: RotorType,
    pub comm_type: CommType,
    pub host: String,
    pub port: u16,
    pub az_limits: Limits,
    pub el_limits: Limits,
    pub park: ParkPosition,
    pub park_enabled: bool,
    pub enabled: bool,
}

pub const DEFAULT_HOST: &str = "192.168.1.10";
pub const DEFAULT_PORT: u16 = 1234;

impl Default for RotorConfig {
    fn default() -> Self {
        Self {
            rotor_type: RotorType::Stepper,
            comm_type: CommType::Serial,
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            az_limits: Limits::new(0.0, 360.0),
            el_limits: Limits::new(0.0, 90.0),
            park: ParkPosition {
                azimuth: 0.0,
                elevation: 90.0,
            },
            park_enabled: false,
            enabled: false,
        }
    }
}

impl RotorConfig {
    /// Reads the shared keys from the current settings group.
    pub fn read_settings(&mut self, store: &dyn SettingsStore) {
        self.enabled = store.get_bool("Enabled", false);

        let code = store.get_i64("Type", RotorType::Stepper.code());
        self.rotor_type = RotorType::from_code(code).unwrap_or_else(|| {
            warn!("Unknown rotor type {} in settings, using Stepper", code);
            RotorType::Stepper
        });

        let code = store.get_i64("CommType", CommType::Serial.code());
        self.comm_type = CommType::from_code(code).unwrap_or_else(|| {
            warn!("Unknown comm type {} in settings, using Serial", code);
            CommType::Serial
        });
        self.host = store.get_string("Host", DEFAULT_HOST);
        self.port = u16::try_from(store.get_i64("Port", DEFAULT_PORT.into())).unwrap_or_else(|_| {
            warn!("Port out of range in settings, using {}", DEFAULT_PORT);
            DEFAULT_PORT
        });

        self.park_enabled = store.get_bool("Park", false);
        self.park = ParkPosition {
            azimuth: store.get_f64("ParkAz", 0.0),
            elevation: store.get_f64("ParkEl", 90.0),
        };

        self.az_limits = read_limits(store, "Az", 0.0, 360.0);
        self.el_limits = read_limits(store, "El", 0.0, 90.0);
    }

    /// Writes the shared keys into the current settings group.
    pub fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.set_value("Enabled", self.enabled.into());
        store.set_value("Type", self.rotor_type.code().into());

        store.set_value("CommType", self.comm_type.code().into());
        store.set_value("Host", self.host.as_str().into());
        store.set_value("Port", self.port.into());

        store.set_value("Park", self.park_enabled.into());
        store.set_value("ParkAz", self.park.azimuth.into());
        store.set_value("ParkEl", self.park.elevation.into());

        store.set_value("AzMax", self.az_limits.max().into());
        store.set_value("ElMax", self.el_limits.max().into());
        store.set_value("AzMin", self.az_limits.min().into());
        store.set_value("ElMin", self.el_limits.min().into());
    }
}

/// Reads `<axis>Min` / `<axis>Max`, replacing non-finite values with the
/// given defaults.
pub(crate) fn read_limits(store: &dyn SettingsStore, axis: &str, min: f64, max: f64) -> Limits {
    let finite_or = |v: f64, default: f64| if v.is_finite() { v } else { default };
    let lo = finite_or(store.get_f64(&format!("{}Min", axis), min), min);
    let hi = finite_or(store.get_f64(&format!("{}Max", axis), max), max);

    if lo > hi {
        warn!("{} limits inverted in settings ({} > {}), swapping", axis, lo, hi);
    }

    Limits::new(lo, hi)
}
