//! Protocol error types.

use crate::codec::CodecError;
use crate::core::{InputId, OutputId};
use crate::plc::TransportError;
use thiserror::Error;

/// Errors that end a single state or transition test.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("image does not match the model: {0}")]
    Codec(#[from] CodecError),

    #[error("input {0} is not part of the model")]
    UnknownInput(InputId),

    #[error("output {0} is not part of the model")]
    UnknownOutput(OutputId),
}
