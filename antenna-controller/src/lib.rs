//! Antenna rotor control.
//!
//! [`Rotor`] drives one of five controller families (parallel port stepper,
//! Yaesu GS-232B, Alfa-SPID, Pololu Jrk, Monstrum X-Y) through a common set of
//! operations, over a serial port or a TCP bridge.

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mock;
pub mod net;
pub mod parport;
pub mod rotor;
pub mod serial;
pub mod settings;
pub mod transport;

pub use backend::{Backend, Position};
pub use config::{CommType, Limits, ParkPosition, RotorConfig, RotorType};
pub use error::{RotorError, SettingsError, TransportError};
pub use geometry::{Degrees, az_el_to_xy, xy_to_az_el};
pub use rotor::Rotor;
pub use settings::{MemorySettings, SettingsStore, Value};
