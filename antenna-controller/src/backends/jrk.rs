use crate::{
    backend::{Backend, Link, Position},
    error::RotorError,
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Endpoint, SerialParams},
};
use log::{info, warn};

const NAME: &str = "Pololu Jrk Motor Control";

const POLOLU_START: u8 = 0xAA;
const CMD_SET_TARGET: u8 = 0x40;
const CMD_MOTOR_OFF: u8 = 0x7F;
const CMD_GET_SCALED_FEEDBACK: u8 = 0x27;

const MAX_COUNT: u16 = 4095;

/// Linear mapping between an axis angle and Jrk target/feedback counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JrkAxis {
    /// Pololu protocol device number of the controller driving this axis.
    pub device: u8,
    pub min_angle: Degrees,
    pub max_angle: Degrees,
    /// Count at `min_angle`.
    pub min_count: u16,
    /// Count at `max_angle`.
    pub max_count: u16,
}

impl JrkAxis {
    fn count_for(&self, angle: Degrees) -> u16 {
        let span = self.max_angle - self.min_angle;
        if span == 0.0 {
            return self.min_count;
        }

        let fraction = ((angle - self.min_angle) / span).clamp(0.0, 1.0);
        let count = f64::from(self.min_count)
            + fraction * (f64::from(self.max_count) - f64::from(self.min_count));
        (count.round() as u16).min(MAX_COUNT)
    }

    fn angle_for(&self, count: u16) -> Degrees {
        let span = f64::from(self.max_count) - f64::from(self.min_count);
        if span == 0.0 {
            return self.min_angle;
        }

        let fraction = (f64::from(count) - f64::from(self.min_count)) / span;
        self.min_angle + fraction * (self.max_angle - self.min_angle)
    }

    fn read_settings(&mut self, store: &dyn SettingsStore, prefix: &str) {
        let key = |name: &str| format!("{}{}", prefix, name);

        match u8::try_from(store.get_i64(&key("Device"), self.device.into())) {
            Ok(device) if device <= 0x7F => self.device = device,
            _ => warn!("Ignoring out of range {} Jrk device number", prefix),
        }
        self.min_angle = store.get_f64(&key("MinAngle"), self.min_angle);
        self.max_angle = store.get_f64(&key("MaxAngle"), self.max_angle);
        self.min_count = read_count(store, &key("MinCount"), self.min_count);
        self.max_count = read_count(store, &key("MaxCount"), self.max_count);
    }

    fn write_settings(&self, store: &mut dyn SettingsStore, prefix: &str) {
        let key = |name: &str| format!("{}{}", prefix, name);

        store.set_value(&key("Device"), self.device.into());
        store.set_value(&key("MinAngle"), self.min_angle.into());
        store.set_value(&key("MaxAngle"), self.max_angle.into());
        store.set_value(&key("MinCount"), self.min_count.into());
        store.set_value(&key("MaxCount"), self.max_count.into());
    }
}

fn read_count(store: &dyn SettingsStore, key: &str, default: u16) -> u16 {
    match store.get_i64(key, default.into()) {
        count @ 0..=4095 => count as u16,
        count => {
            warn!("Ignoring out of range Jrk count {} for {}", count, key);
            default
        }
    }
}

/// Two Pololu Jrk motor controllers, one per axis, sharing one serial line.
///
/// Uses the Pololu protocol (`0xAA`, device number, command) so both
/// controllers can be daisy chained.
pub struct Jrk {
    link: Link,
    serial: SerialParams,
    az: JrkAxis,
    el: JrkAxis,
    current: Position,
}

impl Default for Jrk {
    fn default() -> Self {
        Self::new()
    }
}

impl Jrk {
    pub fn new() -> Self {
        Self {
            link: Link::new(NAME),
            serial: SerialParams::new("/dev/ttyACM0", 9600),
            az: JrkAxis {
                device: 11,
                min_angle: 0.0,
                max_angle: 360.0,
                min_count: 0,
                max_count: MAX_COUNT,
            },
            el: JrkAxis {
                device: 12,
                min_angle: 0.0,
                max_angle: 90.0,
                min_count: 0,
                max_count: MAX_COUNT,
            },
            current: Position::default(),
        }
    }

    pub fn serial_params(&self) -> &SerialParams {
        &self.serial
    }

    pub fn set_serial_params(&mut self, params: SerialParams) {
        self.serial = params;
    }

    pub fn azimuth_axis(&self) -> JrkAxis {
        self.az
    }

    pub fn elevation_axis(&self) -> JrkAxis {
        self.el
    }

    pub fn set_azimuth_axis(&mut self, axis: JrkAxis) {
        self.az = axis;
    }

    pub fn set_elevation_axis(&mut self, axis: JrkAxis) {
        self.el = axis;
    }

    fn set_target(&mut self, axis: JrkAxis, angle: Degrees) -> Result<(), RotorError> {
        let target = axis.count_for(angle);
        let command = [
            POLOLU_START,
            axis.device,
            CMD_SET_TARGET | (target & 0x1F) as u8,
            ((target >> 5) & 0x7F) as u8,
        ];
        self.link.send(&command)
    }

    fn feedback(&mut self, axis: JrkAxis) -> Result<Degrees, RotorError> {
        let reply = self
            .link
            .exchange(&[POLOLU_START, axis.device, CMD_GET_SCALED_FEEDBACK], 2)?;
        let count = u16::from_le_bytes([reply[0], reply[1]]);
        if count > MAX_COUNT {
            return Err(RotorError::Protocol(format!("feedback {} out of range", count)));
        }
        Ok(axis.angle_for(count))
    }

    fn poll(&mut self) -> Result<(), RotorError> {
        let azimuth = self.feedback(self.az)?;
        let elevation = self.feedback(self.el)?;
        self.current = Position {
            azimuth,
            elevation,
        };
        Ok(())
    }
}

impl Backend for Jrk {
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
        let result = self
            .set_target(self.az, az)
            .and_then(|_| self.set_target(self.el, el));
        self.link.record(result)
    }

    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let result = self.set_target(self.az, az);
        self.link.record(result)
    }

    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let result = self.set_target(self.el, el);
        self.link.record(result)
    }

    fn stop(&mut self) -> Result<(), RotorError> {
        let result = [self.az.device, self.el.device]
            .into_iter()
            .try_for_each(|device| self.link.send(&[POLOLU_START, device, CMD_MOTOR_OFF]));
        self.link.record(result)
    }

    fn read_position(&mut self) -> Result<(), RotorError> {
        let result = self.poll();
        self.link.record(result)
    }

    fn position(&self) -> Position {
        self.current
    }

    fn error_string(&self) -> &str {
        self.link.error()
    }

    fn read_settings(&mut self, store: &mut dyn SettingsStore) {
        store.begin_group("JRK");
        self.serial.read_settings(&*store);
        self.az.read_settings(&*store, "Az");
        self.el.read_settings(&*store, "El");
        store.end_group();
    }

    fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("JRK");
        self.serial.write_settings(store);
        self.az.write_settings(store, "Az");
        self.el.write_settings(store, "El");
        store.end_group();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CommType, mock::MockConnector, settings::MemorySettings};

    fn open_rotor(connector: &MockConnector) -> Jrk {
        let mut rotor = Jrk::new();
        let endpoint = Endpoint {
            comm_type: CommType::Serial,
            host: "",
            port: 0,
            connector,
        };
        rotor.open(&endpoint).unwrap();
        rotor
    }

    #[test]
    fn angle_count_mapping() {
        let axis = JrkAxis {
            device: 1,
            min_angle: 0.0,
            max_angle: 90.0,
            min_count: 1000,
            max_count: 3000,
        };

        assert_eq!(axis.count_for(0.0), 1000);
        assert_eq!(axis.count_for(45.0), 2000);
        assert_eq!(axis.count_for(90.0), 3000);
        assert_eq!(axis.count_for(120.0), 3000);
        assert_eq!(axis.angle_for(2500), 67.5);
    }

    #[test]
    fn reversed_axis_mapping() {
        let axis = JrkAxis {
            device: 1,
            min_angle: 0.0,
            max_angle: 180.0,
            min_count: 4000,
            max_count: 400,
        };

        assert_eq!(axis.count_for(90.0), 2200);
        assert_eq!(axis.angle_for(4000), 0.0);
    }

    #[test]
    fn set_target_frames() {
        let connector = MockConnector::new();
        let mut rotor = open_rotor(&connector);

        // 360 degrees maps to count 4095 = 0b1111111_11111.
        rotor.move_to_az(360.0).unwrap();
        assert_eq!(connector.wire.take_written(), vec![0xAA, 11, 0x5F, 0x7F]);

        // 0 degrees elevation.
        rotor.move_to_el(0.0).unwrap();
        assert_eq!(connector.wire.take_written(), vec![0xAA, 12, 0x40, 0x00]);
    }

    #[test]
    fn stop_turns_both_motors_off() {
        let connector = MockConnector::new();
        let mut rotor = open_rotor(&connector);

        rotor.stop().unwrap();
        assert_eq!(
            connector.wire.take_written(),
            vec![0xAA, 11, 0x7F, 0xAA, 12, 0x7F]
        );
    }

    #[test]
    fn reads_feedback_of_both_axes() {
        let connector = MockConnector::new();
        let mut rotor = open_rotor(&connector);

        connector.wire.queue_reply(&4095u16.to_le_bytes());
        connector.wire.queue_reply(&0u16.to_le_bytes());
        rotor.read_position().unwrap();

        assert_eq!(
            connector.wire.take_written(),
            vec![0xAA, 11, 0x27, 0xAA, 12, 0x27]
        );
        assert_eq!(rotor.position().azimuth, 360.0);
        assert_eq!(rotor.position().elevation, 0.0);
    }

    #[test]
    fn partial_feedback_keeps_position() {
        let connector = MockConnector::new();
        let mut rotor = open_rotor(&connector);

        connector.wire.queue_reply(&2048u16.to_le_bytes());
        assert!(rotor.read_position().is_err());
        assert_eq!(rotor.position(), Position::default());
    }

    #[test]
    fn calibration_persists() {
        let mut rotor = Jrk::new();
        rotor.set_elevation_axis(JrkAxis {
            device: 20,
            min_angle: -5.0,
            max_angle: 95.0,
            min_count: 120,
            max_count: 3900,
        });

        let mut store = MemorySettings::new();
        rotor.write_settings(&mut store);

        let mut restored = Jrk::new();
        restored.read_settings(&mut store);

        assert_eq!(restored.elevation_axis(), rotor.elevation_axis());
        assert_eq!(restored.azimuth_axis(), rotor.azimuth_axis());
    }
}
