//! The capability contract shared by every rotor family.

use crate::{
    error::{RotorError, TransportError},
    geometry::Degrees,
    settings::SettingsStore,
    transport::{Endpoint, Transport},
};
use log::{debug, warn};
use std::time::Duration;

/// Size of the I/O buffer each backend allocates when its port opens.
pub const IO_BUFFER_SIZE: usize = 128;

/// Last known pointing direction in the azimuth/elevation frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub azimuth: Degrees,
    pub elevation: Degrees,
}

/// Operations every rotor controller family provides.
///
/// Operations that have no meaning for a family still exist; they report
/// [`RotorError::Unsupported`] or a zero estimate instead.
pub trait Backend: Send {
    /// Display name of the controller family.
    fn name(&self) -> &'static str;

    /// Opens the transport. Opening an already open backend reopens it.
    fn open(&mut self, endpoint: &Endpoint<'_>) -> Result<(), RotorError>;

    /// Closes the transport. Closing a closed backend does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Commands both axes. `Ok` means the controller accepted the command,
    /// not that the antenna has arrived.
    fn move_to(&mut self, az: Degrees, el: Degrees) -> Result<(), RotorError>;

    /// Commands the azimuth axis, leaving the elevation target alone.
    fn move_to_az(&mut self, az: Degrees) -> Result<(), RotorError>;

    /// Commands the elevation axis, leaving the azimuth target alone.
    fn move_to_el(&mut self, el: Degrees) -> Result<(), RotorError>;

    /// Commands the boom angles of an X/Y mount.
    fn move_to_xy(&mut self, _x: Degrees, _y: Degrees) -> Result<(), RotorError> {
        Err(RotorError::Unsupported("X/Y positioning"))
    }

    /// Halts any motion in progress.
    fn stop(&mut self) -> Result<(), RotorError>;

    /// Refreshes [`position`](Backend::position) from the controller.
    fn read_position(&mut self) -> Result<(), RotorError>;

    /// Last commanded or measured position.
    fn position(&self) -> Position;

    /// Estimated time to slew from the current position to the target.
    fn rotation_time(&self, _to_az: Degrees, _to_el: Degrees) -> Duration {
        Duration::ZERO
    }

    /// Description of the last failure, empty when none is pending.
    fn error_string(&self) -> &str;

    /// Controller reported status, for families that have one.
    fn status_string(&self) -> Option<&str> {
        None
    }

    /// Loads this backend's calibration from its own group.
    fn read_settings(&mut self, store: &mut dyn SettingsStore);

    /// Stores this backend's calibration under its own group.
    fn write_settings(&self, store: &mut dyn SettingsStore);
}

/// Connection state and I/O buffer of a serial-protocol backend.
pub(crate) struct Link {
    name: &'static str,
    transport: Option<Box<dyn Transport>>,
    buffer: Vec<u8>,
    error: String,
}

impl Link {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            transport: None,
            buffer: Vec::new(),
            error: String::new(),
        }
    }

    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.transport = Some(transport);
        if self.buffer.len() != IO_BUFFER_SIZE {
            self.buffer = vec![0; IO_BUFFER_SIZE];
        }
    }

    /// Drops the transport. Returns whether it was open.
    pub fn detach(&mut self) -> bool {
        self.transport.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    /// Keeps the error text of a failed result, clears it on success.
    pub fn record<T>(&mut self, result: Result<T, RotorError>) -> Result<T, RotorError> {
        match &result {
            Ok(_) => self.error.clear(),
            Err(err) => {
                warn!("{}: {}", self.name, err);
                self.error = err.to_string();
            }
        }
        result
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>, RotorError> {
        self.transport.as_mut().ok_or(RotorError::NotOpen)
    }

    /// Writes a complete command.
    pub fn send(&mut self, command: &[u8]) -> Result<(), RotorError> {
        debug!("{} <- {:02x?}", self.name, command);
        self.transport()?.write_all(command)?;
        Ok(())
    }

    /// Sends `command` after flushing stale input, then reads exactly `len`
    /// reply bytes.
    pub fn exchange(&mut self, command: &[u8], len: usize) -> Result<&[u8], RotorError> {
        if len > IO_BUFFER_SIZE {
            return Err(RotorError::Protocol(format!("reply of {} bytes too long", len)));
        }

        self.transport()?.clear_input()?;
        self.send(command)?;

        let mut filled = 0;
        while filled < len {
            let transport = self.transport.as_mut().ok_or(RotorError::NotOpen)?;
            match transport.read(&mut self.buffer[filled..len])? {
                0 => return Err(TransportError::Timeout.into()),
                n => filled += n,
            }
        }

        debug!("{} -> {:02x?}", self.name, &self.buffer[..len]);
        Ok(&self.buffer[..len])
    }

    /// Sends `command` after flushing stale input, then reads one reply line
    /// ended by `terminator`. The terminator and surrounding whitespace are
    /// stripped.
    pub fn query_line(&mut self, command: &[u8], terminator: u8) -> Result<String, RotorError> {
        self.transport()?.clear_input()?;
        self.send(command)?;

        let mut filled = 0;
        loop {
            if filled == self.buffer.len() {
                return Err(RotorError::Protocol("reply line too long".into()));
            }

            let transport = self.transport.as_mut().ok_or(RotorError::NotOpen)?;
            let n = transport.read(&mut self.buffer[filled..])?;
            if n == 0 {
                return Err(TransportError::Timeout.into());
            }

            let end = filled + n;
            if let Some(pos) = self.buffer[filled..end].iter().position(|&b| b == terminator) {
                let line = String::from_utf8_lossy(&self.buffer[..filled + pos]);
                let line = line.trim().to_owned();
                debug!("{} -> {:?}", self.name, line);
                return Ok(line);
            }
            filled = end;
        }
    }
}

/// Parses a number that may carry a leading sign and zero padding.
pub(crate) fn parse_angle(text: &str) -> Result<Degrees, RotorError> {
    text.trim()
        .parse::<Degrees>()
        .map_err(|_| RotorError::Protocol(format!("bad angle {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWire;

    #[test]
    fn closed_link_refuses_io() {
        let mut link = Link::new("test");

        assert!(matches!(link.send(b"S\r"), Err(RotorError::NotOpen)));
        assert!(matches!(link.exchange(b"C2\r", 4), Err(RotorError::NotOpen)));
    }

    #[test]
    fn exchange_reads_fixed_length() {
        let wire = MockWire::new();
        wire.queue_reply(b"abcdef");

        let mut link = Link::new("test");
        link.attach(wire.transport());

        assert_eq!(link.exchange(b"?", 4).unwrap(), b"abcd");
        assert_eq!(wire.take_written(), b"?");
    }

    #[test]
    fn exchange_times_out_on_short_reply() {
        let wire = MockWire::new();
        wire.queue_reply(b"ab");

        let mut link = Link::new("test");
        link.attach(wire.transport());

        let result = link.exchange(b"?", 4);
        assert!(matches!(
            result,
            Err(RotorError::Transport(TransportError::Timeout))
        ));
    }

    #[test]
    fn query_line_strips_terminator() {
        let wire = MockWire::new();
        wire.queue_reply(b"AZ=010  EL=020\r\n");

        let mut link = Link::new("test");
        link.attach(wire.transport());

        assert_eq!(link.query_line(b"C2\r", b'\r').unwrap(), "AZ=010  EL=020");
    }

    #[test]
    fn record_tracks_last_failure() {
        let mut link = Link::new("test");

        let _ = link.record::<()>(Err(RotorError::NotOpen));
        assert_eq!(link.error(), "Port is not open");

        let _ = link.record(Ok(()));
        assert_eq!(link.error(), "");
    }

    #[test]
    fn angles_parse_with_padding() {
        assert_eq!(parse_angle("+0123").unwrap(), 123.0);
        assert_eq!(parse_angle(" 045 ").unwrap(), 45.0);
        assert!(parse_angle("4x5").is_err());
    }
}
