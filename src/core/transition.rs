//! Transitions between Moore states.

use super::signal::{InputId, TransitionInput};
use super::state::StateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of a [`Transition`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub String);

impl TransitionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransitionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The two transition variants of the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransitionKind {
    /// Fires when all of its inputs hold.
    Sequential,

    /// Fires when none of the excluded sequential transitions fire.
    Combinatorial { excluded: BTreeSet<TransitionId> },
}

/// A labelled edge of the Moore graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub name: String,
    pub start: StateId,
    pub end: StateId,
    pub inputs: Vec<TransitionInput>,
    pub after_time_condition: bool,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn is_sequential(&self) -> bool {
        matches!(self.kind, TransitionKind::Sequential)
    }

    pub fn is_self_loop(&self) -> bool {
        self.start == self.end
    }

    /// Excluded sequential transitions; empty for sequential transitions.
    pub fn excluded(&self) -> Option<&BTreeSet<TransitionId>> {
        match &self.kind {
            TransitionKind::Sequential => None,
            TransitionKind::Combinatorial { excluded } => Some(excluded),
        }
    }

    pub fn references_input(&self, input: InputId) -> bool {
        self.inputs.iter().any(|binding| binding.input == input)
    }

    pub fn touches(&self, state: &StateId) -> bool {
        &self.start == state || &self.end == state
    }
}
