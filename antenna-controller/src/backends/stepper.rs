use crate::{
    backend::{Backend, Position},
    error::RotorError,
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Endpoint, ParallelParams, ParallelPort},
};
use log::{info, warn};
use std::{thread, time::Duration};

/// Rotor axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Azimuth,
    Elevation,
}

/// Parallel port wiring of one stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    /// Data pin (0..=7) pulsed once per step.
    pub step_pin: u8,
    /// Data pin (0..=7) selecting the direction.
    pub dir_pin: u8,
    /// Inverts the direction pin, for motors wired counter-clockwise.
    pub ccw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisDrive {
    pins: PinAssignment,
    steps_per_degree: f64,
}

impl AxisDrive {
    fn read_settings(&mut self, store: &dyn SettingsStore, prefix: &str) {
        self.pins.step_pin = read_pin(store, &format!("{}StepPin", prefix), self.pins.step_pin);
        self.pins.dir_pin = read_pin(store, &format!("{}DirPin", prefix), self.pins.dir_pin);
        self.pins.ccw = store.get_bool(&format!("{}CCW", prefix), self.pins.ccw);

        let spd = store.get_f64(&format!("{}StepsPerDegree", prefix), self.steps_per_degree);
        if spd.is_finite() && spd > 0.0 {
            self.steps_per_degree = spd;
        } else {
            warn!("Ignoring {} steps per degree of {}", prefix, spd);
        }
    }

    fn write_settings(&self, store: &mut dyn SettingsStore, prefix: &str) {
        store.set_value(&format!("{}StepPin", prefix), self.pins.step_pin.into());
        store.set_value(&format!("{}DirPin", prefix), self.pins.dir_pin.into());
        store.set_value(&format!("{}CCW", prefix), self.pins.ccw.into());
        store.set_value(
            &format!("{}StepsPerDegree", prefix),
            self.steps_per_degree.into(),
        );
    }
}

fn read_pin(store: &dyn SettingsStore, key: &str, default: u8) -> u8 {
    match store.get_i64(key, default.into()) {
        pin @ 0..=7 => pin as u8,
        pin => {
            warn!("Parallel port pin {} out of range for {}", pin, key);
            default
        }
    }
}

/// Open-loop stepper rotor on the parallel port data lines.
///
/// The position is pure bookkeeping: it advances by the steps emitted and can
/// be corrected with [`set_azimuth`](Stepper::set_azimuth) /
/// [`set_elevation`](Stepper::set_elevation) when the true direction is known
/// by other means.
pub struct Stepper {
    port: Option<Box<dyn ParallelPort>>,
    params: ParallelParams,
    az: AxisDrive,
    el: AxisDrive,
    pulse_width: Duration,
    data: u8,
    current_az: Degrees,
    current_el: Degrees,
    error: String,
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper {
    pub fn new() -> Self {
        Self {
            port: None,
            params: ParallelParams::default(),
            az: AxisDrive {
                pins: PinAssignment {
                    step_pin: 0,
                    dir_pin: 1,
                    ccw: false,
                },
                steps_per_degree: 10.0,
            },
            el: AxisDrive {
                pins: PinAssignment {
                    step_pin: 2,
                    dir_pin: 3,
                    ccw: false,
                },
                steps_per_degree: 10.0,
            },
            pulse_width: Duration::from_millis(2),
            data: 0,
            current_az: 0.0,
            current_el: 0.0,
            error: String::new(),
        }
    }

    pub fn pin_assignment(&self, axis: Axis) -> PinAssignment {
        self.drive(axis).pins
    }

    pub fn set_pin_assignment(&mut self, axis: Axis, pins: PinAssignment) {
        match axis {
            Axis::Azimuth => self.az.pins = pins,
            Axis::Elevation => self.el.pins = pins,
        }
    }

    pub fn steps_per_degree(&self, axis: Axis) -> f64 {
        self.drive(axis).steps_per_degree
    }

    /// Ignores non-positive values.
    pub fn set_steps_per_degree(&mut self, axis: Axis, steps: f64) {
        if !(steps.is_finite() && steps > 0.0) {
            return;
        }
        match axis {
            Axis::Azimuth => self.az.steps_per_degree = steps,
            Axis::Elevation => self.el.steps_per_degree = steps,
        }
    }

    /// Half period of a step pulse.
    pub fn set_pulse_width(&mut self, width: Duration) {
        self.pulse_width = width;
    }

    pub fn parallel_params(&self) -> &ParallelParams {
        &self.params
    }

    pub fn set_parallel_params(&mut self, params: ParallelParams) {
        self.params = params;
    }

    /// Tells the rotor where the antenna actually points in azimuth.
    pub fn set_azimuth(&mut self, az: Degrees) {
        self.current_az = az;
    }

    /// Tells the rotor where the antenna actually points in elevation.
    pub fn set_elevation(&mut self, el: Degrees) {
        self.current_el = el;
    }

    fn drive(&self, axis: Axis) -> &AxisDrive {
        match axis {
            Axis::Azimuth => &self.az,
            Axis::Elevation => &self.el,
        }
    }

    fn record(&mut self, result: Result<(), RotorError>) -> Result<(), RotorError> {
        match &result {
            Ok(()) => self.error.clear(),
            Err(err) => {
                warn!("{}: {}", self.name(), err);
                self.error = err.to_string();
            }
        }
        result
    }

    fn step_to(&mut self, axis: Axis, target: Degrees) -> Result<(), RotorError> {
        let drive = *self.drive(axis);
        let current = match axis {
            Axis::Azimuth => self.current_az,
            Axis::Elevation => self.current_el,
        };
        let port = self.port.as_mut().ok_or(RotorError::NotOpen)?;

        let steps = ((target - current) * drive.steps_per_degree).round() as i64;
        if steps == 0 {
            return Ok(());
        }

        let (emitted, result) = pulse(
            port.as_mut(),
            &mut self.data,
            drive.pins,
            steps > 0,
            steps.unsigned_abs(),
            self.pulse_width,
        );

        let moved = emitted as f64 * steps.signum() as f64 / drive.steps_per_degree;
        match axis {
            Axis::Azimuth => self.current_az += moved,
            Axis::Elevation => self.current_el += moved,
        }

        result
    }
}

/// Emits `count` step pulses. Returns how many were fully emitted.
fn pulse(
    port: &mut dyn ParallelPort,
    data: &mut u8,
    pins: PinAssignment,
    clockwise: bool,
    count: u64,
    width: Duration,
) -> (u64, Result<(), RotorError>) {
    let dir_mask = 1u8 << (pins.dir_pin & 7);
    let step_mask = 1u8 << (pins.step_pin & 7);

    if clockwise != pins.ccw {
        *data |= dir_mask;
    } else {
        *data &= !dir_mask;
    }
    if let Err(err) = port.write_data(*data) {
        return (0, Err(err.into()));
    }

    for emitted in 0..count {
        for level in [true, false] {
            if level {
                *data |= step_mask;
            } else {
                *data &= !step_mask;
            }
            if let Err(err) = port.write_data(*data) {
                return (emitted, Err(err.into()));
            }
            if !width.is_zero() {
                thread::sleep(width);
            }
        }
    }

    (count, Ok(()))
}

impl Backend for Stepper {
    fn name(&self) -> &'static str {
        "Stepper"
    }

    fn open(&mut self, endpoint: &Endpoint<'_>) -> Result<(), RotorError> {
        self.port = None;
        let result = endpoint
            .open_parallel(&self.params)
            .map(|port| {
                self.port = Some(port);
                self.data = 0;
                info!("Stepper opened {} @ {:#x}", self.params.device, self.params.base_address);
            })
            .map_err(RotorError::from);
        self.record(result)
    }

    fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            // Release the step and direction lines.
            let _ = port.write_data(0);
            info!("Stepper closed");
        }
        self.data = 0;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn move_to(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError> {
        let result = self
            .step_to(Axis::Azimuth, az)
            .and_then(|_| self.step_to(Axis::Elevation, el));
        self.record(result)
    }

    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError> {
        let result = self.step_to(Axis::Azimuth, az);
        self.record(result)
    }

    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError> {
        let result = self.step_to(Axis::Elevation, el);
        self.record(result)
    }

    /// Steps are emitted synchronously, so there is never motion to halt.
    fn stop(&mut self) -> Result<(), RotorError> {
        Ok(())
    }

    /// Nothing to measure; the bookkept position is always current.
    fn read_position(&mut self) -> Result<(), RotorError> {
        Ok(())
    }

    fn position(&self) -> Position {
        Position {
            azimuth: self.current_az,
            elevation: self.current_el,
        }
    }

    fn error_string(&self) -> &str {
        &self.error
    }

    fn read_settings(&mut self, store: &mut dyn SettingsStore) {
        store.begin_group("Stepper");
        self.params.read_settings(&*store);
        self.az.read_settings(&*store, "Az");
        self.el.read_settings(&*store, "El");
        let pulse_us = store.get_i64("PulseUs", self.pulse_width.as_micros() as i64);
        self.pulse_width = Duration::from_micros(pulse_us.max(0) as u64);
        store.end_group();
    }

    fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.begin_group("Stepper");
        self.params.write_settings(store);
        self.az.write_settings(store, "Az");
        self.el.write_settings(store, "El");
        store.set_value("PulseUs", (self.pulse_width.as_micros() as i64).into());
        store.end_group();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CommType, mock::MockConnector, settings::MemorySettings};

    fn open_stepper(connector: &MockConnector) -> Stepper {
        let mut stepper = Stepper::new();
        stepper.set_pulse_width(Duration::ZERO);
        let endpoint = Endpoint {
            comm_type: CommType::Serial,
            host: "",
            port: 0,
            connector,
        };
        stepper.open(&endpoint).unwrap();
        stepper
    }

    #[test]
    fn moves_are_bookkept() {
        let connector = MockConnector::new();
        let mut stepper = open_stepper(&connector);

        stepper.move_to(12.0, 3.5).unwrap();
        assert_eq!(
            stepper.position(),
            Position {
                azimuth: 12.0,
                elevation: 3.5
            }
        );

        stepper.move_to_az(2.0).unwrap();
        assert_eq!(stepper.position().azimuth, 2.0);
        assert_eq!(stepper.position().elevation, 3.5);
    }

    #[test]
    fn pulses_step_pin_with_direction() {
        let connector = MockConnector::new();
        let mut stepper = open_stepper(&connector);

        // 0.3 degrees at 10 steps per degree: direction latch plus three pulses.
        stepper.move_to_az(0.3).unwrap();
        assert_eq!(connector.parallel.latched(), vec![0b10, 0b11, 0b10, 0b11, 0b10, 0b11, 0b10]);

        connector.parallel.clear();
        stepper.move_to_az(0.2).unwrap();
        assert_eq!(connector.parallel.latched(), vec![0b00, 0b01, 0b00]);
    }

    #[test]
    fn ccw_inverts_direction() {
        let connector = MockConnector::new();
        let mut stepper = open_stepper(&connector);
        stepper.set_pin_assignment(
            Axis::Elevation,
            PinAssignment {
                step_pin: 4,
                dir_pin: 5,
                ccw: true,
            },
        );

        stepper.move_to_el(0.1).unwrap();
        assert_eq!(connector.parallel.latched(), vec![0, 1 << 4, 0]);
    }

    #[test]
    fn closed_port_keeps_position() {
        let mut stepper = Stepper::new();
        stepper.set_azimuth(100.0);

        assert!(matches!(stepper.move_to(10.0, 10.0), Err(RotorError::NotOpen)));
        assert!(matches!(stepper.move_to_el(10.0), Err(RotorError::NotOpen)));
        assert_eq!(stepper.position().azimuth, 100.0);
        assert_eq!(stepper.position().elevation, 0.0);
        assert_eq!(stepper.error_string(), "Port is not open");
    }

    #[test]
    fn trivial_capabilities() {
        let mut stepper = Stepper::new();

        assert!(stepper.read_position().is_ok());
        assert!(stepper.stop().is_ok());
        assert!(stepper.move_to_xy(1.0, 2.0).is_err());
        assert_eq!(stepper.rotation_time(180.0, 45.0), Duration::ZERO);
    }

    #[test]
    fn calibration_persists() {
        let mut stepper = Stepper::new();
        stepper.set_pin_assignment(
            Axis::Azimuth,
            PinAssignment {
                step_pin: 6,
                dir_pin: 7,
                ccw: true,
            },
        );
        stepper.set_steps_per_degree(Axis::Elevation, 33.3);

        let mut store = MemorySettings::new();
        stepper.write_settings(&mut store);

        let mut restored = Stepper::new();
        restored.read_settings(&mut store);

        assert_eq!(restored.pin_assignment(Axis::Azimuth), stepper.pin_assignment(Axis::Azimuth));
        assert_eq!(restored.steps_per_degree(Axis::Elevation), 33.3);
        assert_eq!(store.get_i64("Stepper/AzStepPin", 0), 6);
        assert!(store.get_bool("Stepper/AzCCW", false));
    }
}
