//! The model session: the single owner of inputs, outputs, states and
//! transitions.
//!
//! Every mutating method validates its arguments completely before touching
//! any list, so a rejected edit leaves the model unchanged. Cascades follow
//! ownership: deleting a signal unbinds it everywhere, deleting a state is
//! refused while a transition still uses it.

use super::error::ModelError;
use super::signal::{
    find_conflicts, AddressConflict, Input, InputId, Output, OutputId, Signal, SignalDraft,
    StateOutput, TransitionInput,
};
use super::state::{State, StateId};
use super::transition::{Transition, TransitionId, TransitionKind};
use super::value::{PlcDataType, PlcValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Result of adding a signal: its new id plus any address it now shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalAdded<Id> {
    pub id: Id,
    pub conflicts: Vec<AddressConflict<Id>>,
}

/// A complete Moore model of the PLC program under test.
///
/// # Example
///
/// ```rust
/// use plc_conformance::core::{Model, PlcDataType, SignalDraft, StateId};
///
/// let mut model = Model::new();
/// let start = model.add_input(SignalDraft::new("start", PlcDataType::Bit, 0)).unwrap().id;
/// let lamp = model.add_output(SignalDraft::new("lamp", PlcDataType::Bit, 0)).unwrap().id;
///
/// let running = model.add_state("running").unwrap();
/// model.set_state_output(&running, lamp, "1", "1").unwrap();
///
/// let go = model
///     .add_sequential_transition("go", &StateId::initial(), &running)
///     .unwrap();
/// model.set_transition_input(&go, start, "1").unwrap();
///
/// assert_eq!(model.states().len(), 2);
/// assert_eq!(model.transition(&go).unwrap().inputs.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    states: Vec<State>,
    transitions: Vec<Transition>,
    next_input: u32,
    next_output: u32,
    next_state: u32,
    next_transition: u32,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Create a model holding only the initial state `S0`.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            states: vec![State::new(StateId::initial(), "Initial")],
            transitions: Vec::new(),
            next_input: 0,
            next_output: 0,
            next_state: 1,
            next_transition: 0,
        }
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn input(&self, id: InputId) -> Option<&Input> {
        self.inputs.iter().find(|input| input.id == id)
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|output| output.id == id)
    }

    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|state| &state.id == id)
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|transition| &transition.id == id)
    }

    // ---------------------------------------------------------------- inputs

    pub fn add_input(&mut self, draft: SignalDraft) -> Result<SignalAdded<InputId>, ModelError> {
        let id = InputId(self.next_input);
        let input = draft.into_signal(id)?;
        self.next_input += 1;
        info!(input = %id, name = %input.name, "add input");
        self.inputs.push(input);
        Ok(SignalAdded {
            id,
            conflicts: self.conflicts_for(id, &self.input_conflicts()),
        })
    }

    /// Replace every field of an input. A changed data type resets the value
    /// bound to it on every transition to the zero value of the new type.
    pub fn update_input(
        &mut self,
        id: InputId,
        draft: SignalDraft,
    ) -> Result<Vec<AddressConflict<InputId>>, ModelError> {
        let index = self
            .inputs
            .iter()
            .position(|input| input.id == id)
            .ok_or(ModelError::UnknownInput(id))?;
        let updated = draft.into_signal(id)?;

        if updated.data_type != self.inputs[index].data_type {
            let zero = PlcValue::zero(updated.data_type);
            for binding in self
                .transitions
                .iter_mut()
                .flat_map(|transition| transition.inputs.iter_mut())
                .filter(|binding| binding.input == id)
            {
                binding.value = zero;
            }
            debug!(input = %id, data_type = %updated.data_type, "reset transition values after type change");
        }

        self.inputs[index] = updated;
        Ok(self.conflicts_for(id, &self.input_conflicts()))
    }

    /// Delete an input and unbind it from every transition.
    pub fn remove_input(&mut self, id: InputId) -> Result<Input, ModelError> {
        let index = self
            .inputs
            .iter()
            .position(|input| input.id == id)
            .ok_or(ModelError::UnknownInput(id))?;
        for transition in &mut self.transitions {
            if transition.references_input(id) {
                debug!(transition = %transition.id, input = %id, "unbind removed input");
                transition.inputs.retain(|binding| binding.input != id);
            }
        }
        info!(input = %id, "remove input");
        Ok(self.inputs.remove(index))
    }

    pub fn input_conflicts(&self) -> Vec<AddressConflict<InputId>> {
        find_conflicts(&self.inputs)
    }

    // --------------------------------------------------------------- outputs

    pub fn add_output(&mut self, draft: SignalDraft) -> Result<SignalAdded<OutputId>, ModelError> {
        let id = OutputId(self.next_output);
        let output = draft.into_signal(id)?;
        self.next_output += 1;
        info!(output = %id, name = %output.name, "add output");
        self.outputs.push(output);
        Ok(SignalAdded {
            id,
            conflicts: self.conflicts_for(id, &self.output_conflicts()),
        })
    }

    /// Replace every field of an output. A changed data type resets both
    /// expected values on every state to the zero value of the new type.
    pub fn update_output(
        &mut self,
        id: OutputId,
        draft: SignalDraft,
    ) -> Result<Vec<AddressConflict<OutputId>>, ModelError> {
        let index = self
            .outputs
            .iter()
            .position(|output| output.id == id)
            .ok_or(ModelError::UnknownOutput(id))?;
        let updated = draft.into_signal(id)?;

        if updated.data_type != self.outputs[index].data_type {
            let zero = PlcValue::zero(updated.data_type);
            for binding in self
                .states
                .iter_mut()
                .flat_map(|state| state.outputs.iter_mut())
                .filter(|binding| binding.output == id)
            {
                binding.value_before_time_condition = zero;
                binding.value_after_time_condition = zero;
            }
            debug!(output = %id, data_type = %updated.data_type, "reset state values after type change");
        }

        self.outputs[index] = updated;
        Ok(self.conflicts_for(id, &self.output_conflicts()))
    }

    /// Delete an output and unbind it from every state.
    pub fn remove_output(&mut self, id: OutputId) -> Result<Output, ModelError> {
        let index = self
            .outputs
            .iter()
            .position(|output| output.id == id)
            .ok_or(ModelError::UnknownOutput(id))?;
        for state in &mut self.states {
            state.outputs.retain(|binding| binding.output != id);
        }
        info!(output = %id, "remove output");
        Ok(self.outputs.remove(index))
    }

    pub fn output_conflicts(&self) -> Vec<AddressConflict<OutputId>> {
        find_conflicts(&self.outputs)
    }

    fn conflicts_for<Id: Copy + PartialEq + std::fmt::Display>(
        &self,
        id: Id,
        conflicts: &[AddressConflict<Id>],
    ) -> Vec<AddressConflict<Id>> {
        let relevant: Vec<AddressConflict<Id>> = conflicts
            .iter()
            .filter(|conflict| conflict.signals.contains(&id))
            .cloned()
            .collect();
        for conflict in &relevant {
            warn!("{conflict}");
        }
        relevant
    }

    // ---------------------------------------------------------------- states

    pub fn add_state(&mut self, name: impl Into<String>) -> Result<StateId, ModelError> {
        let name = non_empty(name.into())?;
        let id = loop {
            let candidate = StateId(format!("S{}", self.next_state));
            self.next_state += 1;
            if self.state(&candidate).is_none() {
                break candidate;
            }
        };
        info!(state = %id, %name, "add state");
        self.states.push(State::new(id.clone(), name));
        Ok(id)
    }

    pub fn rename_state(&mut self, id: &StateId, name: impl Into<String>) -> Result<(), ModelError> {
        let name = non_empty(name.into())?;
        self.state_mut(id)?.name = name;
        Ok(())
    }

    /// Set the timer condition and its tolerance, both in milliseconds.
    ///
    /// Their relation to the cycle time is only checked when a test starts.
    pub fn set_state_timer(
        &mut self,
        id: &StateId,
        timer_condition_ms: u64,
        tolerance_ms: u64,
    ) -> Result<(), ModelError> {
        if id.is_initial() && (timer_condition_ms != 0 || tolerance_ms != 0) {
            return Err(ModelError::InitialStateTimer);
        }
        let state = self.state_mut(id)?;
        state.timer_condition_ms = timer_condition_ms;
        state.timer_condition_tolerance_ms = tolerance_ms;
        Ok(())
    }

    /// Bind `output` to a state with textual expected values.
    pub fn set_state_output(
        &mut self,
        state: &StateId,
        output: OutputId,
        before: &str,
        after: &str,
    ) -> Result<(), ModelError> {
        let data_type = self.output(output).ok_or(ModelError::UnknownOutput(output))?.data_type;
        let binding = StateOutput {
            output,
            value_before_time_condition: PlcValue::parse(data_type, before)?,
            value_after_time_condition: PlcValue::parse(data_type, after)?,
        };
        self.bind_state_output(state, binding)
    }

    /// Bind an already typed output binding, replacing any earlier binding
    /// of the same output.
    pub fn bind_state_output(&mut self, state: &StateId, binding: StateOutput) -> Result<(), ModelError> {
        let data_type = self
            .output(binding.output)
            .ok_or(ModelError::UnknownOutput(binding.output))?
            .data_type;
        check_value(data_type, &binding.value_before_time_condition)?;
        check_value(data_type, &binding.value_after_time_condition)?;

        let state = self.state_mut(state)?;
        match state.outputs.iter_mut().find(|existing| existing.output == binding.output) {
            Some(existing) => *existing = binding,
            None => state.outputs.push(binding),
        }
        Ok(())
    }

    pub fn unbind_state_output(&mut self, state: &StateId, output: OutputId) -> Result<(), ModelError> {
        self.state_mut(state)?.outputs.retain(|binding| binding.output != output);
        Ok(())
    }

    /// Delete a state. `S0` and states still used by a transition are kept.
    pub fn remove_state(&mut self, id: &StateId) -> Result<State, ModelError> {
        if id.is_initial() {
            return Err(ModelError::InitialStateNotDeletable);
        }
        let index = self
            .states
            .iter()
            .position(|state| &state.id == id)
            .ok_or_else(|| ModelError::UnknownState(id.clone()))?;
        let users: Vec<TransitionId> = self
            .transitions
            .iter()
            .filter(|transition| transition.touches(id))
            .map(|transition| transition.id.clone())
            .collect();
        if !users.is_empty() {
            return Err(ModelError::StateInUse {
                state: id.clone(),
                transitions: users,
            });
        }
        info!(state = %id, "remove state");
        Ok(self.states.remove(index))
    }

    fn state_mut(&mut self, id: &StateId) -> Result<&mut State, ModelError> {
        self.states
            .iter_mut()
            .find(|state| &state.id == id)
            .ok_or_else(|| ModelError::UnknownState(id.clone()))
    }

    // ----------------------------------------------------------- transitions

    pub fn add_sequential_transition(
        &mut self,
        name: impl Into<String>,
        start: &StateId,
        end: &StateId,
    ) -> Result<TransitionId, ModelError> {
        self.insert_transition(name.into(), start, end, TransitionKind::Sequential)
    }

    /// Add a transition that fires when none of `excluded` fire. Every
    /// excluded id must name an existing sequential transition.
    pub fn add_combinatorial_transition(
        &mut self,
        name: impl Into<String>,
        start: &StateId,
        end: &StateId,
        excluded: impl IntoIterator<Item = TransitionId>,
    ) -> Result<TransitionId, ModelError> {
        let excluded = self.check_exclusions(excluded)?;
        self.insert_transition(name.into(), start, end, TransitionKind::Combinatorial { excluded })
    }

    fn insert_transition(
        &mut self,
        name: String,
        start: &StateId,
        end: &StateId,
        kind: TransitionKind,
    ) -> Result<TransitionId, ModelError> {
        let name = non_empty(name)?;
        for state in [start, end] {
            if self.state(state).is_none() {
                return Err(ModelError::UnknownState(state.clone()));
            }
        }
        let id = loop {
            let candidate = TransitionId(format!("T{}", self.next_transition));
            self.next_transition += 1;
            if self.transition(&candidate).is_none() {
                break candidate;
            }
        };
        info!(transition = %id, %start, %end, "add transition");
        self.transitions.push(Transition {
            id: id.clone(),
            name,
            start: start.clone(),
            end: end.clone(),
            inputs: Vec::new(),
            after_time_condition: false,
            kind,
        });
        Ok(id)
    }

    fn check_exclusions(
        &self,
        excluded: impl IntoIterator<Item = TransitionId>,
    ) -> Result<BTreeSet<TransitionId>, ModelError> {
        let excluded: BTreeSet<TransitionId> = excluded.into_iter().collect();
        for id in &excluded {
            let transition = self
                .transition(id)
                .ok_or_else(|| ModelError::UnknownTransition(id.clone()))?;
            if !transition.is_sequential() {
                return Err(ModelError::NotSequential(id.clone()));
            }
        }
        Ok(excluded)
    }

    /// Replace the exclusion set of a combinatorial transition.
    pub fn set_exclusions(
        &mut self,
        id: &TransitionId,
        excluded: impl IntoIterator<Item = TransitionId>,
    ) -> Result<(), ModelError> {
        let checked = self.check_exclusions(excluded)?;
        let transition = self.transition_mut(id)?;
        match &mut transition.kind {
            TransitionKind::Combinatorial { excluded } => {
                *excluded = checked;
                Ok(())
            }
            TransitionKind::Sequential => Err(ModelError::NotCombinatorial(id.clone())),
        }
    }

    pub fn rename_transition(&mut self, id: &TransitionId, name: impl Into<String>) -> Result<(), ModelError> {
        let name = non_empty(name.into())?;
        self.transition_mut(id)?.name = name;
        Ok(())
    }

    /// Move a transition to new start and end states.
    pub fn set_transition_endpoints(
        &mut self,
        id: &TransitionId,
        start: &StateId,
        end: &StateId,
    ) -> Result<(), ModelError> {
        for state in [start, end] {
            if self.state(state).is_none() {
                return Err(ModelError::UnknownState(state.clone()));
            }
        }
        let transition = self.transition_mut(id)?;
        if transition.after_time_condition && start == end {
            return Err(ModelError::AfterTimeConditionNotAllowed { state: start.clone() });
        }
        transition.start = start.clone();
        transition.end = end.clone();
        Ok(())
    }

    /// Mark a transition as firing only after its start state's timer.
    /// Refused on self-loops.
    pub fn set_after_time_condition(&mut self, id: &TransitionId, after: bool) -> Result<(), ModelError> {
        let transition = self.transition_mut(id)?;
        if after && transition.is_self_loop() {
            return Err(ModelError::AfterTimeConditionNotAllowed {
                state: transition.start.clone(),
            });
        }
        transition.after_time_condition = after;
        Ok(())
    }

    /// Bind `input` to a transition with a textual value.
    pub fn set_transition_input(
        &mut self,
        transition: &TransitionId,
        input: InputId,
        value: &str,
    ) -> Result<(), ModelError> {
        let data_type = self.input(input).ok_or(ModelError::UnknownInput(input))?.data_type;
        let value = PlcValue::parse(data_type, value)?;
        self.bind_transition_input(transition, TransitionInput { input, value })
    }

    pub fn bind_transition_input(
        &mut self,
        transition: &TransitionId,
        binding: TransitionInput,
    ) -> Result<(), ModelError> {
        let data_type = self
            .input(binding.input)
            .ok_or(ModelError::UnknownInput(binding.input))?
            .data_type;
        check_value(data_type, &binding.value)?;

        let transition = self.transition_mut(transition)?;
        match transition.inputs.iter_mut().find(|existing| existing.input == binding.input) {
            Some(existing) => *existing = binding,
            None => transition.inputs.push(binding),
        }
        Ok(())
    }

    pub fn unbind_transition_input(&mut self, transition: &TransitionId, input: InputId) -> Result<(), ModelError> {
        self.transition_mut(transition)?
            .inputs
            .retain(|binding| binding.input != input);
        Ok(())
    }

    /// Delete a transition and drop it from every exclusion set.
    pub fn remove_transition(&mut self, id: &TransitionId) -> Result<Transition, ModelError> {
        let index = self
            .transitions
            .iter()
            .position(|transition| &transition.id == id)
            .ok_or_else(|| ModelError::UnknownTransition(id.clone()))?;
        let removed = self.transitions.remove(index);
        for transition in &mut self.transitions {
            if let TransitionKind::Combinatorial { excluded } = &mut transition.kind {
                excluded.remove(id);
            }
        }
        info!(transition = %id, "remove transition");
        Ok(removed)
    }

    fn transition_mut(&mut self, id: &TransitionId) -> Result<&mut Transition, ModelError> {
        self.transitions
            .iter_mut()
            .find(|transition| &transition.id == id)
            .ok_or_else(|| ModelError::UnknownTransition(id.clone()))
    }

    /// Bring every transition in line with the live lists: input bindings
    /// whose input no longer exists are dropped, and so are exclusions that
    /// no longer name a sequential transition.
    pub fn materialize_exclusions(&mut self) {
        let sequential: BTreeSet<TransitionId> = self
            .transitions
            .iter()
            .filter(|transition| transition.is_sequential())
            .map(|transition| transition.id.clone())
            .collect();
        let live_inputs: BTreeSet<InputId> = self.inputs.iter().map(|input| input.id).collect();

        for transition in &mut self.transitions {
            let before = transition.inputs.len();
            transition
                .inputs
                .retain(|binding| live_inputs.contains(&binding.input));
            let mut dropped = before - transition.inputs.len();
            if let TransitionKind::Combinatorial { excluded } = &mut transition.kind {
                let before = excluded.len();
                excluded.retain(|id| sequential.contains(id));
                dropped += before - excluded.len();
            }
            if dropped > 0 {
                debug!(transition = %transition.id, dropped, "dropped stale references");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn transitions_mut(&mut self) -> &mut Vec<Transition> {
        &mut self.transitions
    }

    // ---------------------------------------------------------------- images

    /// Bytes needed to hold every input.
    pub fn input_image_size(&self) -> usize {
        image_size(&self.inputs)
    }

    /// Bytes needed to hold every output.
    pub fn output_image_size(&self) -> usize {
        image_size(&self.outputs)
    }
}

fn image_size<Id>(signals: &[Signal<Id>]) -> usize {
    signals
        .iter()
        .map(|signal| signal.address.end(signal.data_type))
        .max()
        .unwrap_or(0)
}

fn non_empty(name: String) -> Result<String, ModelError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ModelError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}

fn check_value(expected: PlcDataType, value: &PlcValue) -> Result<(), ModelError> {
    if value.data_type() != expected {
        return Err(ModelError::TypeMismatch {
            expected,
            found: value.data_type(),
        });
    }
    value.validate()?;
    Ok(())
}
