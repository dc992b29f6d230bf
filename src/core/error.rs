//! Errors raised at the model editing boundary.

use super::signal::{InputId, OutputId};
use super::state::StateId;
use super::transition::TransitionId;
use super::value::{PlcDataType, ValueError};
use thiserror::Error;

/// Errors that can occur when editing a [`Model`](super::Model).
///
/// A failed edit never leaves a partial change behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),

    #[error("bit address {bit} is out of range 0-7")]
    BitAddressOutOfRange { bit: u8 },

    #[error("name must not be empty")]
    EmptyName,

    #[error("unknown input {0}")]
    UnknownInput(InputId),

    #[error("unknown output {0}")]
    UnknownOutput(OutputId),

    #[error("unknown state {0}")]
    UnknownState(StateId),

    #[error("unknown transition {0}")]
    UnknownTransition(TransitionId),

    #[error("the initial state S0 cannot be deleted")]
    InitialStateNotDeletable,

    #[error("the initial state S0 cannot carry a timer condition")]
    InitialStateTimer,

    #[error("state {state} is still referenced by transition(s) {}", join(.transitions))]
    StateInUse {
        state: StateId,
        transitions: Vec<TransitionId>,
    },

    #[error("aftertime condition is not allowed when start and end state are both {state}")]
    AfterTimeConditionNotAllowed { state: StateId },

    #[error("transition {0} is not a sequential transition")]
    NotSequential(TransitionId),

    #[error("transition {0} is not a combinatorial transition")]
    NotCombinatorial(TransitionId),

    #[error("value of type {found} cannot be bound to a {expected} signal")]
    TypeMismatch {
        expected: PlcDataType,
        found: PlcDataType,
    },
}

fn join(ids: &[TransitionId]) -> String {
    ids.iter()
        .map(TransitionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
