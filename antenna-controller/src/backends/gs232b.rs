use super::SlewRates;
use crate::{
    backend::{Backend, Link, Position, parse_angle},
    error::RotorError,
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Endpoint, SerialParams},
};
use log::info;
use std::time::Duration;

const NAME: &str = "Yaesu GS-232b";

/// Yaesu GS-232B computer control interface.
///
/// ASCII commands terminated by carriage return. Angles are whole degrees,
/// azimuth up to 450° on overlap rotors and elevation up to 180°.
pub struct Gs232b {
    link: Link,
    serial: SerialParams,
    rates: SlewRates,
    target: Position,
    current: Position,
}

impl Default for Gs232b {
    fn default() -> Self {
        Self::new()
    }
}

impl Gs232b {
    pub fn new() -> Self {
        Self {
            link: Link::new(NAME),
            serial: SerialParams::new("/dev/ttyUSB0", 9600),
            // G-5500: 360° in about 58 s, 180° in about 67 s.
            rates: SlewRates {
                azimuth: 360.0 / 58.0,
                elevation: 180.0 / 67.0,
            },
            target: Position::default(),
            current: Position::default(),
        }
    }

    pub fn serial_params(&self) -> &SerialParams {
        &self.serial
    }

    pub fn set_serial_params(&mut self, params: SerialParams) {
        self.serial = params;
    }

    pub fn slew_rates(&self) -> SlewRates {
        self.rates
    }

    pub fn set_slew_rates(&mut self, rates: SlewRates) {
        self.rates = rates;
    }

    fn command(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let command = format!("W{:03} {:03}\r", encode_az(az), encode_el(el));
        self.link.send(command.as_bytes())?;
        self.target = Position {
            azimuth: az,
            elevation: el,
        };
        Ok(())
    }

    fn poll(&mut self) -> Result<(), RotorError> {
        let line = self.link.query_line(b"C2\r", b'\r')?;
        let (azimuth, elevation) = parse_c2(&line)?;
        self.current = Position {
            azimuth,
            elevation,
        };
        Ok(())
    }
}

fn encode_az(az: Degrees) -> i64 {
    (az.round() as i64).clamp(0, 450)
}

fn encode_el(el: Degrees) -> i64 {
    (el.round() as i64).clamp(0, 180)
}

/// Parses the `C2` reply, `AZ=aaa  EL=eee` (GS-232B) or `+0aaa+0eee`
/// (GS-232A compatibility mode).
fn parse_c2(line: &str) -> Result<(Degrees, Degrees), RotorError> {
    if let (Some(az_at), Some(el_at)) = (line.find("AZ="), line.find("EL=")) {
        let az = &line[az_at + 3..];
        let az = az[..az.find(|c: char| c.is_whitespace() || c == 'E').unwrap_or(az.len())].trim();
        let el = line[el_at + 3..].trim();
        return Ok((parse_angle(az)?, parse_angle(el)?));
    }

    let mut fields = line.split('+').map(str::trim).filter(|s| !s.is_empty());
    match (fields.next(), fields.next(), fields.next()) {
        (Some(az), Some(el), None) => Ok((parse_angle(az)?, parse_angle(el)?)),
        _ => Err(RotorError::Protocol(format!("unexpected C2 reply {:?}", line))),
    }
}

impl Backend for Gs232b {
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
            self.target = self.current;
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
        let result = self.command(az, el);
        self.link.record(result)
    }

    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let command = format!("M{:03}\r", encode_az(az));
        let result = self.link.send(command.as_bytes());
        if result.is_ok() {
            self.target.azimuth = az;
        }
        self.link.record(result)
    }

    /// The protocol has no elevation-only command, so the azimuth target is
    /// repeated.
    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let result = self.command(self.target.azimuth, el);
        self.link.record(result)
    }

    fn stop(&mut self) -> Result<(), RotorError> {
        let result = self.link.send(b"S\r");
        self.link.record(result)
    }

    fn read_position(&mut self) -> Result<(), RotorError> {
        let result = self.poll();
        self.link.record(result)
    }

    fn position(&self) -> Position {
        self.current
    }

    fn rotation_time(&self, to_az: Degrees, to_el: Degrees) -> Duration {
        self.rates.estimate(self.current, to_az, to_el)
    }

    fn error_string(&self) -> &str {
        self.link.error()
    }

    fn read_settings(&mut self, store: &mut dyn SettingsStore) {
        store.begin_group("GS232B");
        self.serial.read_settings(&*store);
        self.rates.read_settings(&*store);
        store.end_group();
    }

    fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("GS232B");
        self.serial.write_settings(store);
        self.rates.write_settings(store);
        store.end_group();
    }
}
