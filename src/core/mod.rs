//! The Moore model of a PLC program.
//!
//! This module contains the data the test engine works from:
//! - Typed PLC values and their parsing rules
//! - Inputs and outputs with their data block addresses
//! - States with expected outputs, transitions with written inputs
//! - The [`Model`] session that owns all of them
//!
//! Validation happens here, at the editing boundary. The test engine only
//! ever sees values that already passed it.

mod error;
mod model;
mod signal;
mod state;
mod transition;
mod value;

pub use error::ModelError;
pub use model::{Model, SignalAdded};
pub use signal::{
    Address, AddressConflict, Input, InputId, Output, OutputId, Signal, SignalDraft, StateOutput,
    TransitionInput,
};
pub use state::{State, StateId};
pub use transition::{Transition, TransitionId, TransitionKind};
pub use value::{PlcDataType, PlcValue, ValueError, REAL_MAX_MAGNITUDE, REAL_MIN_MAGNITUDE};
