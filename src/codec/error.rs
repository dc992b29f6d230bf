//! Codec error types.

use thiserror::Error;

/// Errors that can occur while reading or writing an image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not fit inside the image
    #[error("{width} byte(s) at offset {start} exceed the image length {len}")]
    OutOfBounds { start: usize, width: usize, len: usize },

    /// Bit number outside 0-7
    #[error("bit number {bit} is out of range 0-7")]
    InvalidBit { bit: u8 },
}
