use crate::{
    backend::{Backend, Link, Position, parse_angle},
    config::{Limits, read_limits},
    error::RotorError,
    geometry::{Degrees, az_el_to_xy, xy_to_az_el},
    settings::SettingsStore,
    transport::{Endpoint, SerialParams},
};
use log::info;

const NAME: &str = "Monstrum X-Y";

/// Monstrum cross-boom X-Y mount.
///
/// ASCII line protocol, carriage return terminated, every command answered:
///
/// ```text
/// MXY <x> <y>   ->  OK | ERR <reason>
/// POS           ->  POS <x> <y> <state...>
/// STOP          ->  OK | ERR <reason>
/// ```
pub struct Monstrum {
    link: Link,
    serial: SerialParams,
    x_limits: Limits,
    y_limits: Limits,
    target: Position,
    current_x: Degrees,
    current_y: Degrees,
    status: String,
}

impl Default for Monstrum {
    fn default() -> Self {
        Self::new()
    }
}

impl Monstrum {
    pub fn new() -> Self {
        Self {
            link: Link::new(NAME),
            serial: SerialParams::new("/dev/ttyUSB0", 9600),
            x_limits: Limits::new(0.0, 180.0),
            y_limits: Limits::new(0.0, 180.0),
            target: Position {
                azimuth: 0.0,
                elevation: 90.0,
            },
            current_x: 90.0,
            current_y: 90.0,
            status: String::new(),
        }
    }

    pub fn serial_params(&self) -> &SerialParams {
        &self.serial
    }

    pub fn set_serial_params(&mut self, params: SerialParams) {
        self.serial = params;
    }

    /// Mechanical travel of the X and Y booms.
    pub fn set_travel(&mut self, x: Limits, y: Limits) {
        self.x_limits = x;
        self.y_limits = y;
    }

    /// Last reported boom angles, in the mount's own frame.
    pub fn xy(&self) -> (Degrees, Degrees) {
        (self.current_x, self.current_y)
    }

    fn expect_ok(&mut self, command: &str) -> Result<(), RotorError> {
        let reply = self.link.query_line(command.as_bytes(), b'\r')?;
        match reply.as_str() {
            "OK" => Ok(()),
            other => match other.strip_prefix("ERR") {
                Some(reason) => Err(RotorError::Protocol(format!(
                    "controller refused {:?}: {}",
                    command.trim_end(),
                    reason.trim()
                ))),
                None => Err(RotorError::Protocol(format!("unexpected reply {:?}", other))),
            },
        }
    }

    fn drive_xy(&mut self, x: Degrees, y: Degrees) -> Result<(), RotorError> {
        let (x, y) = (self.x_limits.clamp(x), self.y_limits.clamp(y));
        self.expect_ok(&format!("MXY {:.2} {:.2}\r", x, y))
    }

    fn drive_az_el(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let (x, y) = az_el_to_xy(az, el);
        self.drive_xy(x, y)?;
        self.target = Position {
            azimuth: az,
            elevation: el,
        };
        Ok(())
    }

    fn poll(&mut self) -> Result<(), RotorError> {
        let reply = self.link.query_line(b"POS\r", b'\r')?;
        let mut fields = reply.split_whitespace();

        match (fields.next(), fields.next(), fields.next()) {
            (Some("POS"), Some(x), Some(y)) => {
                let (x, y) = (parse_angle(x)?, parse_angle(y)?);
                self.current_x = x;
                self.current_y = y;
                self.status = fields.collect::<Vec<_>>().join(" ");
                Ok(())
            }
            _ => Err(RotorError::Protocol(format!("unexpected reply {:?}", reply))),
        }
    }
}

impl Backend for Monstrum {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self, endpoint: &Endpoint<'_>) -> Result<(), RotorError> {
        self.link.detach();
        let result = endpoint
            .open_stream(&self.serial)
            .map(|transport| self.link.attach(transport))
            .map_err(RotorError::from);
        if result.is_ok() {
            info!("{} opened on {}", NAME, endpoint.describe(&self.serial));
        }
        self.link.record(result)
    }

    fn close(&mut self) {
        if self.link.detach() {
            info!("{} closed", NAME);
        }
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }

    fn move_to(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let result = self.drive_az_el(az, el);
        self.link.record(result)
    }

    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let result = self.drive_az_el(az, self.target.elevation);
        self.link.record(result)
    }

    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let result = self.drive_az_el(self.target.azimuth, el);
        self.link.record(result)
    }

    fn move_to_xy(&mut self, x: Degrees, y: Degrees) -> Result<(), RotorError> {
        let result = self.drive_xy(x, y);
        if result.is_ok() {
            self.target = {
                let (azimuth, elevation) = xy_to_az_el(x, y);
                Position {
                    azimuth,
                    elevation,
                }
            };
        }
        self.link.record(result)
    }

    fn stop(&mut self) -> Result<(), RotorError> {
        let result = self.expect_ok("STOP\r");
        self.link.record(result)
    }

    fn read_position(&mut self) -> Result<(), RotorError> {
        let result = self.poll();
        self.link.record(result)
    }

    /// The reported boom angles converted into the azimuth/elevation frame.
    fn position(&self) -> Position {
        let (azimuth, elevation) = xy_to_az_el(self.current_x, self.current_y);
        Position {
            azimuth,
            elevation,
        }
    }

    fn error_string(&self) -> &str {
        self.link.error()
    }

    fn status_string(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn read_settings(&mut self, store: &mut dyn SettingsStore) {
        store.begin_group("Monstrum");
        self.serial.read_settings(&*store);
        self.x_limits = read_limits(&*store, "X", self.x_limits.min(), self.x_limits.max());
        self.y_limits = read_limits(&*store, "Y", self.y_limits.min(), self.y_limits.max());
        store.end_group();
    }

    fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("Monstrum");
        self.serial.write_settings(store);
        store.set_value("XMin", self.x_limits.min().into());
        store.set_value("XMax", self.x_limits.max().into());
        store.set_value("YMin", self.y_limits.min().into());
        store.set_value("YMax", self.y_limits.max().into());
        store.end_group();
    }
}
