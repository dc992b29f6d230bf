//! Moore states and their expected outputs.

use super::signal::{OutputId, StateOutput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a [`State`]. `"S0"` is reserved for the initial state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub String);

impl StateId {
    pub const INITIAL: &'static str = "S0";

    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A Moore state: a fixed set of expected outputs, optionally switching to
/// a second set once `timer_condition_ms` has elapsed.
///
/// # Example
///
/// ```rust
/// use plc_conformance::core::{State, StateId};
///
/// let state = State::new(StateId::from("S1"), "filling");
/// assert!(!state.has_timer());
/// assert!(state.outputs.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub name: String,
    pub outputs: Vec<StateOutput>,
    pub timer_condition_ms: u64,
    pub timer_condition_tolerance_ms: u64,
}

impl State {
    pub fn new(id: StateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            outputs: Vec::new(),
            timer_condition_ms: 0,
            timer_condition_tolerance_ms: 0,
        }
    }

    /// Whether either timer field is set.
    pub fn has_timer(&self) -> bool {
        self.timer_condition_ms != 0 || self.timer_condition_tolerance_ms != 0
    }

    pub fn output(&self, output: OutputId) -> Option<&StateOutput> {
        self.outputs.iter().find(|binding| binding.output == output)
    }
}
