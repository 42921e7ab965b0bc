//! Byte transports used by the backends and the connector that opens them.

use crate::{
    config::CommType,
    error::TransportError,
    net::TcpTransport,
    parport::DevPortParallel,
    serial::SerialTransport,
    settings::SettingsStore,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A bidirectional byte pipe to a rotor controller. Dropping it closes it.
pub trait Transport: Send {
    /// Writes some bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Reads available bytes, blocking up to the transport timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Discards any unread input.
    fn clear_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(TransportError::Closed),
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// The eight data lines of a parallel port.
pub trait ParallelPort: Send {
    /// Latches `value` onto pins D0..D7.
    fn write_data(&mut self, value: u8) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    fn code(self) -> i64 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
        }
    }

    fn from_code(code: i64) -> Self {
        match code {
            1 => Parity::Odd,
            2 => Parity::Even,
            _ => Parity::None,
        }
    }
}

/// Line parameters for a local serial port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialParams {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub timeout: Duration,
}

impl SerialParams {
    /// 8N1 at `baud_rate` with a one second timeout.
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_owned(),
            baud_rate,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            timeout: Duration::from_millis(1000),
        }
    }

    /// Reads the line parameters from the current group, using `self` as
    /// the defaults.
    pub fn read_settings(&mut self, store: &dyn SettingsStore) {
        self.port_name = store.get_string("PortName", &self.port_name);
        self.baud_rate = u32::try_from(store.get_i64("Baud", self.baud_rate.into()))
            .unwrap_or(self.baud_rate);
        self.data_bits = match store.get_i64("DataBits", self.data_bits.into()) {
            bits @ 5..=8 => bits as u8,
            _ => self.data_bits,
        };
        self.parity = Parity::from_code(store.get_i64("Parity", self.parity.code()));
        self.stop_bits = match store.get_i64("StopBits", self.stop_bits.into()) {
            2 => 2,
            _ => 1,
        };
        let timeout_ms = store.get_i64("TimeoutMs", self.timeout.as_millis() as i64);
        self.timeout = Duration::from_millis(timeout_ms.max(1) as u64);
    }

    pub fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.set_value("PortName", self.port_name.as_str().into());
        store.set_value("Baud", self.baud_rate.into());
        store.set_value("DataBits", self.data_bits.into());
        store.set_value("Parity", self.parity.code().into());
        store.set_value("StopBits", self.stop_bits.into());
        store.set_value("TimeoutMs", (self.timeout.as_millis() as i64).into());
    }
}

/// Where the parallel port lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelParams {
    /// Raw I/O port device.
    pub device: String,
    /// I/O address of the data register.
    pub base_address: u16,
}

impl Default for ParallelParams {
    fn default() -> Self {
        Self {
            device: "/dev/port".to_owned(),
            base_address: 0x378,
        }
    }
}

impl ParallelParams {
    pub fn read_settings(&mut self, store: &dyn SettingsStore) {
        self.device = store.get_string("Device", &self.device);
        self.base_address = u16::try_from(store.get_i64("BaseAddress", self.base_address.into()))
            .unwrap_or(self.base_address);
    }

    pub fn write_settings(&self, store: &mut dyn SettingsStore) {
        store.set_value("Device", self.device.as_str().into());
        store.set_value("BaseAddress", self.base_address.into());
    }
}

/// Opens transports. Swapped for a mock in tests.
pub trait Connector: Send {
    fn serial(&self, params: &SerialParams) -> Result<Box<dyn Transport>, TransportError>;

    fn network(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError>;

    fn parallel(&self, params: &ParallelParams) -> Result<Box<dyn ParallelPort>, TransportError>;
}

/// Opens real serial ports, TCP sockets and `/dev/port`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn serial(&self, params: &SerialParams) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(SerialTransport::new(params)?))
    }

    fn network(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(TcpTransport::connect(host, port, timeout)?))
    }

    fn parallel(&self, params: &ParallelParams) -> Result<Box<dyn ParallelPort>, TransportError> {
        Ok(Box::new(DevPortParallel::open(params)?))
    }
}

/// Everything a backend needs to open its transport.
pub struct Endpoint<'a> {
    pub comm_type: CommType,
    pub host: &'a str,
    pub port: u16,
    pub connector: &'a dyn Connector,
}

impl Endpoint<'_> {
    /// Opens the byte stream for a serial-protocol backend: its own port for
    /// [`CommType::Serial`], the shared host for [`CommType::Network`].
    pub fn open_stream(&self, serial: &SerialParams) -> Result<Box<dyn Transport>, TransportError> {
        match self.comm_type {
            CommType::Serial => self.connector.serial(serial),
            CommType::Network => self.connector.network(self.host, self.port, serial.timeout),
        }
    }

    pub fn open_parallel(
        &self,
        params: &ParallelParams,
    ) -> Result<Box<dyn ParallelPort>, TransportError> {
        self.connector.parallel(params)
    }

    /// Human readable target, for log lines.
    pub fn describe(&self, serial: &SerialParams) -> String {
        match self.comm_type {
            CommType::Serial => format!("{} @ {} baud", serial.port_name, serial.baud_rate),
            CommType::Network => format!("{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn serial_params_round_trip() {
        let mut params = SerialParams::new("/dev/ttyUSB3", 600);
        params.parity = Parity::Even;
        params.stop_bits = 2;
        params.timeout = Duration::from_millis(250);

        let mut store = MemorySettings::new();
        params.write_settings(&mut store);

        let mut restored = SerialParams::new("/dev/ttyS0", 9600);
        restored.read_settings(&store);

        assert_eq!(restored, params);
    }

    #[test]
    fn serial_params_keep_defaults() {
        let mut params = SerialParams::new("/dev/ttyS1", 4800);
        params.read_settings(&MemorySettings::new());

        assert_eq!(params, SerialParams::new("/dev/ttyS1", 4800));
    }
}
