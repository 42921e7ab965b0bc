use crate::{error::TransportError, transport::Transport};
use std::{
    io::{Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

/// A rotor controller behind a TCP bridge.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|err| TransportError::Open(format!("{}:{}: {}", host, port, err)))?
            .next()
            .ok_or_else(|| TransportError::Open(format!("{}:{}: no address", host, port)))?;

        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|err| TransportError::Open(format!("{}: {}", addr, err)))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.stream.write(data)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf)? {
            0 if !buf.is_empty() => Err(TransportError::Closed),
            n => Ok(n),
        }
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 64];
        let drained = loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => break Err(TransportError::Closed),
                Ok(_) => continue,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(err.into()),
            }
        };
        self.stream.set_nonblocking(false)?;
        drained
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
