use super::SlewRates;
use crate::{
    backend::{Backend, Link, Position},
    error::RotorError,
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Endpoint, SerialParams},
};
use log::{info, warn};
use std::time::Duration;

const NAME: &str = "Alfa-SPID";

const COMMAND_LEN: usize = 13;
const REPLY_LEN: usize = 12;

const START: u8 = b'W';
const END: u8 = 0x20;

const CMD_STOP: u8 = 0x0F;
const CMD_STATUS: u8 = 0x1F;
const CMD_SET: u8 = 0x2F;

/// Alfa-SPID Rot2Prog controller.
///
/// Fixed size binary frames: 13 byte commands carrying the target as ASCII
/// digits of `resolution * (angle + 360)`, 12 byte replies carrying the
/// position as raw digits in tenths of a degree.
pub struct AlphaSpid {
    link: Link,
    serial: SerialParams,
    rates: SlewRates,
    resolution: u8,
    target: Position,
    current: Position,
}

impl Default for AlphaSpid {
    fn default() -> Self {
        Self::new()
    }
}

impl AlphaSpid {
    pub fn new() -> Self {
        Self {
            link: Link::new(NAME),
            serial: SerialParams::new("/dev/ttyUSB0", 600),
            rates: SlewRates {
                azimuth: 6.0,
                elevation: 6.0,
            },
            resolution: 2,
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

    /// Pulses per degree configured on the controller.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Accepts 1, 2 or 4 pulses per degree; anything else is ignored.
    pub fn set_resolution(&mut self, resolution: u8) {
        if matches!(resolution, 1 | 2 | 4) {
            self.resolution = resolution;
        }
    }

    fn set(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let frame = encode_set(az, el, self.resolution);
        self.link.send(&frame)?;
        self.target = Position {
            azimuth: az,
            elevation: el,
        };
        Ok(())
    }

    /// Sends a status or stop frame and takes the position from the reply.
    fn exchange_status(&mut self, command: u8) -> Result<(), RotorError> {
        let reply = self.link.exchange(&encode_simple(command), REPLY_LEN)?;
        self.current = decode_reply(reply)?;
        Ok(())
    }
}

fn encode_digits(angle: Degrees, resolution: u8) -> [u8; 4] {
    let pulses = (f64::from(resolution) * (angle + 360.0)).round().clamp(0.0, 9999.0) as u16;
    let text = format!("{:04}", pulses);
    let mut digits = [b'0'; 4];
    digits.copy_from_slice(text.as_bytes());
    digits
}

fn encode_set(az: Degrees, el: Degrees, resolution: u8) -> [u8; COMMAND_LEN] {
    let mut frame = [0u8; COMMAND_LEN];
    frame[0] = START;
    frame[1..5].copy_from_slice(&encode_digits(az, resolution));
    frame[5] = resolution;
    frame[6..10].copy_from_slice(&encode_digits(el, resolution));
    frame[10] = resolution;
    frame[11] = CMD_SET;
    frame[12] = END;
    frame
}

fn encode_simple(command: u8) -> [u8; COMMAND_LEN] {
    let mut frame = [0u8; COMMAND_LEN];
    frame[0] = START;
    frame[11] = command;
    frame[12] = END;
    frame
}

fn decode_angle(digits: &[u8]) -> Result<Degrees, RotorError> {
    if digits.iter().any(|&d| d > 9) {
        return Err(RotorError::Protocol(format!("bad digits {:02x?}", digits)));
    }
    let tenths = digits.iter().fold(0u32, |acc, &d| acc * 10 + u32::from(d));
    Ok(f64::from(tenths) / 10.0 - 360.0)
}

fn decode_reply(reply: &[u8]) -> Result<Position, RotorError> {
    if reply.len() != REPLY_LEN || reply[0] != START || reply[REPLY_LEN - 1] != END {
        return Err(RotorError::Protocol(format!("unexpected reply {:02x?}", reply)));
    }

    Ok(Position {
        azimuth: decode_angle(&reply[1..5])?,
        elevation: decode_angle(&reply[6..10])?,
    })
}

impl Backend for AlphaSpid {
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
        let result = self.set(az, el);
        self.link.record(result)
    }

    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let result = self.set(az, self.target.elevation);
        self.link.record(result)
    }

    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let result = self.set(self.target.azimuth, el);
        self.link.record(result)
    }

    fn stop(&mut self) -> Result<(), RotorError> {
        let result = self.exchange_status(CMD_STOP);
        if result.is_ok() {
            // The rotor stays where it halted.
            self.target = self.current;
        }
        self.link.record(result)
    }

    fn read_position(&mut self) -> Result<(), RotorError> {
        let result = self.exchange_status(CMD_STATUS);
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
        store.begin_group("SPID");
        self.serial.read_settings(&*store);
        self.rates.read_settings(&*store);
        let resolution = store.get_i64("Resolution", self.resolution.into());
        match u8::try_from(resolution) {
            Ok(r @ (1 | 2 | 4)) => self.resolution = r,
            _ => warn!("Ignoring SPID resolution {}", resolution),
        }
        store.end_group();
    }

    fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("SPID");
        self.serial.write_settings(store);
        self.rates.write_settings(store);
        store.set_value("Resolution", self.resolution.into());
        store.end_group();
    }
}
