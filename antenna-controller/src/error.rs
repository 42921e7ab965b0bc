use std::{fmt, io};

/// Failure of the byte pipe underneath a backend.
#[derive(Debug)]
pub enum TransportError {
    /// The port or socket could not be opened.
    Open(String),
    Io(io::Error),
    /// The device did not answer within the transport timeout.
    Timeout,
    /// The peer closed the connection.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Open(reason) => write!(f, "Unable to open port: {}", reason),
            TransportError::Io(err) => write!(f, "I/O error: {}", err),
            TransportError::Timeout => write!(f, "Timeout waiting for rotor reply"),
            TransportError::Closed => write!(f, "Connection closed by peer"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Open(err.to_string())
    }
}

/// Errors reported by rotor backends and the [`Rotor`](crate::Rotor) facade.
#[derive(Debug)]
pub enum RotorError {
    /// The backend's port is closed.
    NotOpen,
    Transport(TransportError),
    /// The controller answered with something we could not understand.
    Protocol(String),
    /// The operation has no meaning for the selected rotor family.
    Unsupported(&'static str),
    /// The requested angle is not a finite number.
    InvalidTarget(f64),
}

impl fmt::Display for RotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotorError::NotOpen => write!(f, "Port is not open"),
            RotorError::Transport(err) => write!(f, "{}", err),
            RotorError::Protocol(reason) => write!(f, "Protocol error: {}", reason),
            RotorError::Unsupported(what) => {
                write!(f, "{} is not supported by the selected rotor", what)
            }
            RotorError::InvalidTarget(value) => write!(f, "Invalid target angle {}", value),
        }
    }
}

impl std::error::Error for RotorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RotorError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for RotorError {
    fn from(err: TransportError) -> Self {
        RotorError::Transport(err)
    }
}

/// Errors loading or saving a settings file.
#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Format(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "Error accessing settings file: {}", err),
            SettingsError::Format(err) => write!(f, "Malformed settings file: {}", err),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Format(err)
    }
}
