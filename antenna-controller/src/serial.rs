use crate::{
    error::TransportError,
    transport::{Parity, SerialParams, Transport},
};
use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use std::io::{Read, Write};

/// A rotor controller reached through a local serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens the port described by `params`.
    pub fn new(params: &SerialParams) -> Result<Self, TransportError> {
        let data_bits = match params.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let parity = match params.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };
        let stop_bits = match params.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let port = serialport::new(&params.port_name, params.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(params.timeout)
            .open()?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.port.write(data)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.port.read(buf)?)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input).map_err(port_error)
    }
}

/// Failure on a port that is already open. Only opening maps to
/// [`TransportError::Open`].
fn port_error(err: serialport::Error) -> TransportError {
    TransportError::from(std::io::Error::from(err))
}
