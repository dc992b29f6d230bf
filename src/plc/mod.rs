//! The PLC transport contract.
//!
//! The engine never talks to a wire protocol directly; it drives any
//! [`PlcConnection`]. [`sim::SimulatedPlc`] implements it in memory for tests
//! and demos.

pub mod sim;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operating mode reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlcStatus {
    Run,
    Stop,
    Unknown,
}

impl fmt::Display for PlcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => f.write_str("RUN"),
            Self::Stop => f.write_str("STOP"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// A failure reported by the transport layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport error {code:#06x}: {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Operations consumed from the PLC transport.
///
/// Only the test worker calls these during a run. Implementations are free
/// to block; the engine imposes no timeouts of its own.
pub trait PlcConnection {
    fn connect(&mut self, address: &str, rack: u16, slot: u16) -> Result<(), TransportError>;

    fn disconnect(&mut self);

    fn read_status(&mut self) -> Result<PlcStatus, TransportError>;

    /// Negotiated maximum payload of a single exchange, in bytes.
    fn pdu_length(&self) -> usize;

    fn read_data_block(&mut self, block: u16, size: usize) -> Result<Vec<u8>, TransportError>;

    fn write_data_block(&mut self, block: u16, data: &[u8]) -> Result<(), TransportError>;
}

impl<C: PlcConnection + ?Sized> PlcConnection for Box<C> {
    fn connect(&mut self, address: &str, rack: u16, slot: u16) -> Result<(), TransportError> {
        (**self).connect(address, rack, slot)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn read_status(&mut self) -> Result<PlcStatus, TransportError> {
        (**self).read_status()
    }

    fn pdu_length(&self) -> usize {
        (**self).pdu_length()
    }

    fn read_data_block(&mut self, block: u16, size: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read_data_block(block, size)
    }

    fn write_data_block(&mut self, block: u16, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_data_block(block, data)
    }
}
