//! Structural checks run before any PLC contact.
//!
//! Every check runs and every violation is collected with stillwater's
//! `Validation`, so one pass reports everything the user must fix. A single
//! violation is still enough to abort the run.

use super::config::TestConfig;
use crate::core::{Model, StateId, TransitionId, TransitionKind};
use std::collections::BTreeSet;
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Longest accepted scaled PLC cycle, in milliseconds.
pub const MAX_SCALED_CYCLE_MS: u64 = 3_600_000;

/// One reason the model or configuration cannot be tested.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("the input list is empty")]
    NoInputs,

    #[error("the output list is empty")]
    NoOutputs,

    #[error("at least two states are required, found {count}")]
    TooFewStates { count: usize },

    #[error("the model does not contain any transitions")]
    NoTransitions,

    #[error("transition {0} does not contain any inputs")]
    TransitionWithoutInputs(TransitionId),

    #[error("combinatorial transition {0} does not exclude any sequential transition")]
    NoExclusions(TransitionId),

    #[error("state {0} has no incoming transition")]
    NoIncomingTransition(StateId),

    #[error("state {0} has no outgoing transition")]
    NoOutgoingTransition(StateId),

    #[error(
        "state {state}: timer condition tolerance {tolerance_ms} ms is smaller than the cycle time {cycle_time_ms} ms"
    )]
    ToleranceBelowCycleTime {
        state: StateId,
        tolerance_ms: u64,
        cycle_time_ms: u64,
    },

    #[error(
        "state {state}: timer condition {timer_ms} ms minus tolerance {tolerance_ms} ms is shorter than twice the cycle time {cycle_time_ms} ms"
    )]
    TimerWindowTooShort {
        state: StateId,
        timer_ms: u64,
        tolerance_ms: u64,
        cycle_time_ms: u64,
    },

    #[error("the cycle time must be greater than 0 ms")]
    ZeroCycleTime,

    #[error("the scaling factor must be a positive number, got {0}")]
    InvalidScalingFactor(f64),

    #[error("the scaled cycle of {scaled_ms} ms exceeds the limit of {max_ms} ms")]
    ScaledCycleTooLong { scaled_ms: f64, max_ms: u64 },

    #[error("input and output image both use data block {0}")]
    SharedDataBlock(u16),
}

/// All violations found by one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }
}

impl From<NonEmptyVec<ValidationError>> for ValidationErrors {
    fn from(errors: NonEmptyVec<ValidationError>) -> Self {
        Self(errors.iter().cloned().collect())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

type Check = Validation<(), NonEmptyVec<ValidationError>>;

fn require(condition: bool, error: impl FnOnce() -> ValidationError) -> Check {
    if condition {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Run every precondition of a test run against `model` and `config`.
///
/// The model should already have had
/// [`Model::materialize_exclusions`](crate::core::Model::materialize_exclusions)
/// applied.
///
/// # Example
///
/// ```rust
/// use plc_conformance::core::{Model, StateId};
/// use plc_conformance::runner::{validate, TestConfig, ValidationError};
/// use stillwater::validation::Validation;
///
/// let mut model = Model::new();
/// let s1 = model.add_state("s1").unwrap();
/// let t0 = model.add_sequential_transition("go", &StateId::initial(), &s1).unwrap();
///
/// match validate(&model, &TestConfig::default()) {
///     Validation::Failure(errors) => {
///         assert!(errors.iter().any(|e| *e == ValidationError::TransitionWithoutInputs(t0.clone())));
///     }
///     Validation::Success(_) => panic!("an empty model cannot be tested"),
/// }
/// ```
pub fn validate(model: &Model, config: &TestConfig) -> Validation<(), NonEmptyVec<ValidationError>> {
    let mut checks: Vec<Check> = Vec::new();

    // Configuration
    checks.push(require(config.cycle_time_ms > 0, || ValidationError::ZeroCycleTime));
    checks.push(require(
        config.scaling_factor.is_finite() && config.scaling_factor > 0.0,
        || ValidationError::InvalidScalingFactor(config.scaling_factor),
    ));
    let scaled_ms = config.cycle_time_ms as f64 * config.scaling_factor;
    checks.push(require(
        scaled_ms.is_nan() || scaled_ms <= MAX_SCALED_CYCLE_MS as f64,
        || ValidationError::ScaledCycleTooLong {
            scaled_ms,
            max_ms: MAX_SCALED_CYCLE_MS,
        },
    ));
    checks.push(require(config.input_block != config.output_block, || {
        ValidationError::SharedDataBlock(config.input_block)
    }));

    // Lists
    checks.push(require(!model.inputs().is_empty(), || ValidationError::NoInputs));
    checks.push(require(!model.outputs().is_empty(), || ValidationError::NoOutputs));
    checks.push(require(model.states().len() >= 2, || ValidationError::TooFewStates {
        count: model.states().len(),
    }));
    checks.push(require(!model.transitions().is_empty(), || {
        ValidationError::NoTransitions
    }));

    // Transitions
    for transition in model.transitions() {
        match &transition.kind {
            TransitionKind::Sequential => checks.push(require(!transition.inputs.is_empty(), || {
                ValidationError::TransitionWithoutInputs(transition.id.clone())
            })),
            TransitionKind::Combinatorial { excluded } => {
                checks.push(require(!excluded.is_empty(), || {
                    ValidationError::NoExclusions(transition.id.clone())
                }))
            }
        }
    }

    // Edges
    if !model.transitions().is_empty() {
        let mut referenced: BTreeSet<&StateId> = BTreeSet::new();
        let mut incoming: BTreeSet<&StateId> = BTreeSet::new();
        let mut outgoing: BTreeSet<&StateId> = BTreeSet::new();
        let initial = StateId::initial();
        referenced.insert(&initial);
        for transition in model.transitions() {
            referenced.insert(&transition.start);
            referenced.insert(&transition.end);
            outgoing.insert(&transition.start);
            incoming.insert(&transition.end);
        }
        for state in referenced {
            checks.push(require(incoming.contains(state), || {
                ValidationError::NoIncomingTransition(state.clone())
            }));
            checks.push(require(outgoing.contains(state), || {
                ValidationError::NoOutgoingTransition(state.clone())
            }));
        }
    }

    // Timers
    let cycle = config.cycle_time_ms;
    for state in model.states().iter().filter(|state| state.has_timer()) {
        let timer = state.timer_condition_ms;
        let tolerance = state.timer_condition_tolerance_ms;
        checks.push(require(tolerance >= cycle, || {
            ValidationError::ToleranceBelowCycleTime {
                state: state.id.clone(),
                tolerance_ms: tolerance,
                cycle_time_ms: cycle,
            }
        }));
        let window_ok = timer
            .checked_sub(tolerance)
            .is_some_and(|window| window >= cycle.saturating_mul(2));
        checks.push(require(window_ok, || ValidationError::TimerWindowTooShort {
            state: state.id.clone(),
            timer_ms: timer,
            tolerance_ms: tolerance,
            cycle_time_ms: cycle,
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}

/// [`validate`] as a `Result`.
pub fn check(model: &Model, config: &TestConfig) -> Result<(), ValidationErrors> {
    match validate(model, config) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.into()),
    }
}
