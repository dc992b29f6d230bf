//! Cycle generation errors.

use crate::core::{StateId, TransitionId};
use thiserror::Error;

/// Reasons a covering set of closed walks cannot be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("the model does not contain any transitions")]
    NoTransitions,

    #[error("transition {0} cannot be reached from the initial state S0")]
    Unreachable(TransitionId),

    #[error("no transition path leads from state {0} back to the initial state S0")]
    NoReturn(StateId),
}
