use crate::{
    error::TransportError,
    transport::{ParallelParams, ParallelPort},
};
use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
};

/// Parallel port data register written through the raw I/O port device.
///
/// Needs permission to open `/dev/port` (normally root or CAP_SYS_RAWIO).
pub struct DevPortParallel {
    file: File,
    address: u64,
}

impl DevPortParallel {
    pub fn open(params: &ParallelParams) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .write(true)
            .open(&params.device)
            .map_err(|err| TransportError::Open(format!("{}: {}", params.device, err)))?;

        Ok(Self {
            file,
            address: params.base_address.into(),
        })
    }
}

impl ParallelPort for DevPortParallel {
    fn write_data(&mut self, value: u8) -> Result<(), TransportError> {
        self.file.seek(SeekFrom::Start(self.address))?;
        self.file.write_all(&[value])?;
        Ok(())
    }
}
