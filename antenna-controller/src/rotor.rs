use crate::{
    backend::{Backend, Position},
    backends::{AlphaSpid, Gs232b, Jrk, Monstrum, Stepper},
    config::{Limits, ParkPosition, RotorConfig, RotorType},
    error::RotorError,
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Connector, Endpoint, SystemConnector},
};
use log::{debug, info};
use std::time::Duration;

pub const STATUS_UNSUPPORTED: &str = "Status not supported for selected type!";

/// One instance of every backend, addressed by rotor type.
struct Backends {
    stepper: Stepper,
    gs232b: Gs232b,
    spid: AlphaSpid,
    jrk: Jrk,
    monstrum: Monstrum,
}

impl Backends {
    fn new() -> Self {
        Self {
            stepper: Stepper::new(),
            gs232b: Gs232b::new(),
            spid: AlphaSpid::new(),
            jrk: Jrk::new(),
            monstrum: Monstrum::new(),
        }
    }

    fn get(&self, rotor_type: RotorType) -> &dyn Backend {
        match rotor_type {
            RotorType::Stepper => &self.stepper,
            RotorType::Gs232b => &self.gs232b,
            RotorType::AlphaSpid => &self.spid,
            RotorType::Jrk => &self.jrk,
            RotorType::MonstrumXy => &self.monstrum,
        }
    }

    fn get_mut(&mut self, rotor_type: RotorType) -> &mut dyn Backend {
        match rotor_type {
            RotorType::Stepper => &mut self.stepper,
            RotorType::Gs232b => &mut self.gs232b,
            RotorType::AlphaSpid => &mut self.spid,
            RotorType::Jrk => &mut self.jrk,
            RotorType::MonstrumXy => &mut self.monstrum,
        }
    }
}

/// Single entry point for driving whichever rotor is configured.
///
/// All five backends exist for the whole life of the `Rotor`. Only the one
/// selected by [`RotorConfig::rotor_type`] receives commands, but every one of
/// them keeps its own connection and calibration, so switching type never
/// loses state.
pub struct Rotor {
    config: RotorConfig,
    connector: Box<dyn Connector>,
    backends: Backends,
}

impl Default for Rotor {
    fn default() -> Self {
        Self::new()
    }
}

impl Rotor {
    /// A rotor opening real ports.
    pub fn new() -> Self {
        Self::with_connector(Box::new(SystemConnector))
    }

    /// A rotor opening its transports through `connector`.
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            config: RotorConfig::default(),
            connector,
            backends: Backends::new(),
        }
    }

    pub fn config(&self) -> &RotorConfig {
        &self.config
    }

    /// Replaces the shared configuration. Backend connections are untouched.
    pub fn set_config(&mut self, config: RotorConfig) {
        self.config = config;
    }

    pub fn rotor_type(&self) -> RotorType {
        self.config.rotor_type
    }

    /// Selects the active backend. Open connections of other backends stay
    /// open until [`close_port`](Rotor::close_port).
    pub fn set_rotor_type(&mut self, rotor_type: RotorType) {
        if rotor_type != self.config.rotor_type {
            info!("Rotor type {:?} -> {:?}", self.config.rotor_type, rotor_type);
        }
        self.config.rotor_type = rotor_type;
    }

    pub fn set_limits(&mut self, az: Limits, el: Limits) {
        self.config.az_limits = az;
        self.config.el_limits = el;
    }

    pub fn set_park_position(&mut self, park: ParkPosition) {
        self.config.park = park;
    }

    pub fn stepper(&self) -> &Stepper {
        &self.backends.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut Stepper {
        &mut self.backends.stepper
    }

    pub fn gs232b(&self) -> &Gs232b {
        &self.backends.gs232b
    }

    pub fn gs232b_mut(&mut self) -> &mut Gs232b {
        &mut self.backends.gs232b
    }

    pub fn spid(&self) -> &AlphaSpid {
        &self.backends.spid
    }

    pub fn spid_mut(&mut self) -> &mut AlphaSpid {
        &mut self.backends.spid
    }

    pub fn jrk(&self) -> &Jrk {
        &self.backends.jrk
    }

    pub fn jrk_mut(&mut self) -> &mut Jrk {
        &mut self.backends.jrk
    }

    pub fn monstrum(&self) -> &Monstrum {
        &self.backends.monstrum
    }

    pub fn monstrum_mut(&mut self) -> &mut Monstrum {
        &mut self.backends.monstrum
    }

    fn active(&self) -> &dyn Backend {
        self.backends.get(self.config.rotor_type)
    }

    fn active_mut(&mut self) -> &mut dyn Backend {
        self.backends.get_mut(self.config.rotor_type)
    }

    /// Opens the active backend's port.
    pub fn open_port(&mut self) -> Result<(), RotorError> {
        let endpoint = Endpoint {
            comm_type: self.config.comm_type,
            host: &self.config.host,
            port: self.config.port,
            connector: self.connector.as_ref(),
        };
        self.backends
            .get_mut(self.config.rotor_type)
            .open(&endpoint)
    }

    /// Closes the ports of every backend, active or not.
    pub fn close_port(&mut self) {
        for rotor_type in RotorType::ALL {
            self.backends.get_mut(rotor_type).close();
        }
    }

    pub fn is_port_open(&self) -> bool {
        self.active().is_open()
    }

    /// True when the active rotor is an X/Y mount.
    pub fn is_xy(&self) -> bool {
        self.config.rotor_type == RotorType::MonstrumXy
    }

    /// Moves both axes, each clamped into its configured limits.
    pub fn move_to(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let az = clamp(self.config.az_limits, az)?;
        let el = clamp(self.config.el_limits, el)?;
        debug!("Move to az {:.2} el {:.2}", az, el);
        self.active_mut().move_to(az, el)
    }

    pub fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let az = clamp(self.config.az_limits, az)?;
        self.active_mut().move_to_az(az)
    }

    pub fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let el = clamp(self.config.el_limits, el)?;
        self.active_mut().move_to_el(el)
    }

    /// Moves the booms of an X/Y mount. Fails for every other rotor type.
    pub fn move_to_xy(&mut self, x: Degrees, y: Degrees) -> Result<(), RotorError> {
        if !self.is_xy() {
            return Err(RotorError::Unsupported("X/Y positioning"));
        }
        if !x.is_finite() {
            return Err(RotorError::InvalidTarget(x));
        }
        if !y.is_finite() {
            return Err(RotorError::InvalidTarget(y));
        }
        self.backends.monstrum.move_to_xy(x, y)
    }

    pub fn stop_motor(&mut self) -> Result<(), RotorError> {
        self.active_mut().stop()
    }

    /// Sends the antenna to the park position, if parking is enabled.
    pub fn park(&mut self) -> Result<(), RotorError> {
        if !self.config.park_enabled {
            return Ok(());
        }

        let park = self.config.park;
        info!("Parking at az {:.1} el {:.1}", park.azimuth, park.elevation);
        self.move_to(park.azimuth, park.elevation)
    }

    pub fn read_position(&mut self) -> Result<(), RotorError> {
        self.active_mut().read_position()
    }

    /// Last known position of the active rotor.
    pub fn position(&self) -> Position {
        self.active().position()
    }

    pub fn azimuth(&self) -> Degrees {
        self.position().azimuth
    }

    pub fn elevation(&self) -> Degrees {
        self.position().elevation
    }

    /// Raw boom angles when the active rotor is an X/Y mount.
    pub fn xy(&self) -> Option<(Degrees, Degrees)> {
        self.is_xy().then(|| self.backends.monstrum.xy())
    }

    /// Informs an open-loop rotor of its true azimuth. Ignored by rotors that
    /// measure their own position.
    pub fn set_azimuth(&mut self, az: Degrees) {
        if self.config.rotor_type == RotorType::Stepper {
            self.backends.stepper.set_azimuth(az);
        }
    }

    /// Informs an open-loop rotor of its true elevation. Ignored by rotors that
    /// measure their own position.
    pub fn set_elevation(&mut self, el: Degrees) {
        if self.config.rotor_type == RotorType::Stepper {
            self.backends.stepper.set_elevation(el);
        }
    }

    /// Estimated slew time to the target, zero when the rotor cannot tell.
    pub fn rotation_time(&self, to_az: Degrees, to_el: Degrees) -> Duration {
        self.active().rotation_time(to_az, to_el)
    }

    pub fn enable(&mut self, enable: bool) {
        self.config.enabled = enable;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_parking_enabled(&mut self, park: bool) {
        self.config.park_enabled = park;
    }

    pub fn parking_enabled(&self) -> bool {
        self.config.park_enabled
    }

    pub fn error_string(&self) -> &str {
        self.active().error_string()
    }

    pub fn status_string(&self) -> &str {
        self.active().status_string().unwrap_or(STATUS_UNSUPPORTED)
    }

    pub fn rotor_name(&self) -> &'static str {
        self.active().name()
    }

    /// Loads the shared configuration and the calibration of every backend
    /// from the `Rotor` group.
    pub fn read_settings(&mut self, store: &mut dyn SettingsStore) {
        store.begin_group("Rotor");
        self.config.read_settings(&*store);
        for rotor_type in RotorType::ALL {
            self.backends.get_mut(rotor_type).read_settings(store);
        }
        store.end_group();
    }

    /// Stores the shared configuration and the calibration of every backend
    /// under the `Rotor` group.
    pub fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("Rotor");
        self.config.write_settings(store);
        for rotor_type in RotorType::ALL {
            self.backends.get(rotor_type).write_settings(store);
        }
        store.end_group();
    }
}

impl Drop for Rotor {
    fn drop(&mut self) {
        self.close_port();
    }
}

fn clamp(limits: Limits, value: Degrees) -> Result<Degrees, RotorError> {
    if value.is_finite() {
        Ok(limits.clamp(value))
    } else {
        Err(RotorError::InvalidTarget(value))
    }
}
