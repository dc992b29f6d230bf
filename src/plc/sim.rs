//! In-memory PLC for tests and demos (no real controller required).
//!
//! Behavior:
//! - data blocks grow on demand and read back zero-padded
//! - an optional program runs after every write to its input block and may
//!   rewrite its output block, standing in for the controller's scan
//! - connect, read and write failures and the reported status are
//!   configurable
//!
//! The handle is cheap to clone and every clone shares the same memory and
//! counters, so a test can keep one clone while the runner owns another.

use super::{PlcConnection, PlcStatus, TransportError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Scan logic: maps the input image onto the output image.
pub type Program = Box<dyn FnMut(&[u8], &mut Vec<u8>) + Send>;

/// Calls observed by the simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    pub connects: usize,
    pub disconnects: usize,
    pub reads: usize,
    pub writes: usize,
}

struct Scan {
    input_block: u16,
    output_block: u16,
    program: Program,
}

struct Inner {
    status: PlcStatus,
    pdu_length: usize,
    connected: bool,
    connect_error: Option<TransportError>,
    read_error: Option<TransportError>,
    write_error: Option<TransportError>,
    blocks: HashMap<u16, Vec<u8>>,
    scan: Option<Scan>,
    stats: SimStats,
}

#[derive(Clone)]
pub struct SimulatedPlc {
    inner: Arc<Mutex<Inner>>,
}

impl Default for SimulatedPlc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlc {
    /// A controller in RUN mode with a 240 byte PDU.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                status: PlcStatus::Run,
                pdu_length: 240,
                connected: false,
                connect_error: None,
                read_error: None,
                write_error: None,
                blocks: HashMap::new(),
                scan: None,
                stats: SimStats::default(),
            })),
        }
    }

    pub fn with_status(self, status: PlcStatus) -> Self {
        self.inner.lock().status = status;
        self
    }

    pub fn with_pdu_length(self, pdu_length: usize) -> Self {
        self.inner.lock().pdu_length = pdu_length;
        self
    }

    pub fn with_connect_error(self, error: TransportError) -> Self {
        self.inner.lock().connect_error = Some(error);
        self
    }

    /// Install scan logic run after each write to `input_block`.
    pub fn with_program<F>(self, input_block: u16, output_block: u16, program: F) -> Self
    where
        F: FnMut(&[u8], &mut Vec<u8>) + Send + 'static,
    {
        self.inner.lock().scan = Some(Scan {
            input_block,
            output_block,
            program: Box::new(program),
        });
        self
    }

    /// Make every following read fail with `error` (`None` clears it).
    pub fn fail_reads(&self, error: Option<TransportError>) {
        self.inner.lock().read_error = error;
    }

    /// Make every following write fail with `error` (`None` clears it).
    /// A failed write leaves the blocks untouched and runs no scan.
    pub fn fail_writes(&self, error: Option<TransportError>) {
        self.inner.lock().write_error = error;
    }

    pub fn set_block(&self, block: u16, data: Vec<u8>) {
        self.inner.lock().blocks.insert(block, data);
    }

    pub fn block(&self, block: u16) -> Option<Vec<u8>> {
        self.inner.lock().blocks.get(&block).cloned()
    }

    pub fn stats(&self) -> SimStats {
        self.inner.lock().stats
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}

fn not_connected() -> TransportError {
    TransportError::new(0x0001, "not connected")
}

impl PlcConnection for SimulatedPlc {
    fn connect(&mut self, _address: &str, _rack: u16, _slot: u16) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.stats.connects += 1;
        if let Some(error) = inner.connect_error.clone() {
            return Err(error);
        }
        inner.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut inner = self.inner.lock();
        inner.stats.disconnects += 1;
        inner.connected = false;
    }

    fn read_status(&mut self) -> Result<PlcStatus, TransportError> {
        let inner = self.inner.lock();
        if !inner.connected {
            return Err(not_connected());
        }
        Ok(inner.status)
    }

    fn pdu_length(&self) -> usize {
        self.inner.lock().pdu_length
    }

    fn read_data_block(&mut self, block: u16, size: usize) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock();
        inner.stats.reads += 1;
        if !inner.connected {
            return Err(not_connected());
        }
        if let Some(error) = inner.read_error.clone() {
            return Err(error);
        }
        let mut data = inner.blocks.get(&block).cloned().unwrap_or_default();
        data.resize(size, 0);
        Ok(data)
    }

    fn write_data_block(&mut self, block: u16, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.stats.writes += 1;
        if !inner.connected {
            return Err(not_connected());
        }
        if let Some(error) = inner.write_error.clone() {
            return Err(error);
        }
        let stored = inner.blocks.entry(block).or_default();
        if stored.len() < data.len() {
            stored.resize(data.len(), 0);
        }
        stored[..data.len()].copy_from_slice(data);

        if let Some(scan) = inner.scan.as_mut() {
            if scan.input_block == block {
                let input = inner.blocks.get(&block).cloned().unwrap_or_default();
                let output = inner.blocks.entry(scan.output_block).or_default();
                (scan.program)(&input, output);
            }
        }
        Ok(())
    }
}
