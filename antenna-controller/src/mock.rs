//! Scripted transports for exercising backends without hardware.

use crate::{
    error::TransportError,
    transport::{Connector, ParallelParams, ParallelPort, SerialParams, Transport},
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

#[derive(Debug, Default)]
struct WireState {
    written: Vec<u8>,
    writes: usize,
    pending: VecDeque<Vec<u8>>,
    readable: VecDeque<u8>,
    fail_writes: bool,
}

/// Shared end of a mock serial line.
///
/// Replies queued with [`queue_reply`](MockWire::queue_reply) are delivered
/// one per command: each write moves the next queued reply into the input
/// buffer, the way a controller answers a request.
#[derive(Debug, Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<WireState>>,
}

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues the answer to the next command written.
    pub fn queue_reply(&self, reply: &[u8]) {
        self.lock().pending.push_back(reply.to_vec());
    }

    /// Returns and clears everything written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    /// Number of write calls seen so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Makes every following write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(MockTransport { wire: self.clone() })
    }
}

struct MockTransport {
    wire: MockWire,
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.wire.lock();
        if state.fail_writes {
            return Err(TransportError::Closed);
        }

        state.written.extend_from_slice(data);
        state.writes += 1;
        if let Some(reply) = state.pending.pop_front() {
            state.readable.extend(reply);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.wire.lock();
        let n = buf.len().min(state.readable.len());
        for (slot, byte) in buf.iter_mut().zip(state.readable.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.wire.lock().readable.clear();
        Ok(())
    }
}

/// Shared record of the bytes latched onto a mock parallel port.
#[derive(Debug, Clone, Default)]
pub struct MockParallel {
    latched: Arc<Mutex<Vec<u8>>>,
}

impl MockParallel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value written to the data register, in order.
    pub fn latched(&self) -> Vec<u8> {
        self.latched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.latched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl ParallelPort for MockParallel {
    fn write_data(&mut self, value: u8) -> Result<(), TransportError> {
        self.latched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(value);
        Ok(())
    }
}

/// Connector handing out mock transports that share one wire and one
/// parallel port.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub wire: MockWire,
    pub parallel: MockParallel,
    opened: Arc<Mutex<Vec<String>>>,
    refuse: Arc<Mutex<bool>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following open fail.
    pub fn refuse_open(&self, refuse: bool) {
        *self.refuse.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = refuse;
    }

    /// Descriptions of every transport opened so far, e.g.
    /// `serial:/dev/ttyUSB0` or `network:10.0.0.1:4001`.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn open(&self, what: String) -> Result<(), TransportError> {
        if *self.refuse.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) {
            return Err(TransportError::Open(format!("{} refused", what)));
        }
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(what);
        Ok(())
    }
}

impl Connector for MockConnector {
    fn serial(&self, params: &SerialParams) -> Result<Box<dyn Transport>, TransportError> {
        self.open(format!("serial:{}", params.port_name))?;
        Ok(self.wire.transport())
    }

    fn network(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.open(format!("network:{}:{}", host, port))?;
        Ok(self.wire.transport())
    }

    fn parallel(&self, params: &ParallelParams) -> Result<Box<dyn ParallelPort>, TransportError> {
        self.open(format!("parallel:{}", params.device))?;
        Ok(Box::new(self.parallel.clone()))
    }
}
