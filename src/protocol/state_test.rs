//! Reading the output image and comparing it with a state's expectations.

use super::error::ProtocolError;
use super::events::{EventSink, TestEvent};
use crate::codec;
use crate::core::{Model, OutputId, PlcValue, State, StateId};
use crate::plc::PlcConnection;
use chrono::{DateTime, Local};
use std::fmt;
use tracing::{debug, warn};

/// One output whose live value differs from the model.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputMismatch {
    pub output: OutputId,
    pub name: String,
    pub expected: PlcValue,
    pub actual: PlcValue,
}

impl fmt::Display for OutputMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "output {} ({}) expected {} but read {}",
            self.name, self.output, self.expected, self.actual
        )
    }
}

/// Outcome of a single state test.
#[derive(Clone, Debug, PartialEq)]
pub struct StateVerdict {
    pub state: StateId,
    pub state_name: String,
    pub after_time_condition: bool,
    pub mismatches: Vec<OutputMismatch>,
    pub tested_at: DateTime<Local>,
}

impl StateVerdict {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for StateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = if self.after_time_condition {
            "after time condition"
        } else {
            "before time condition"
        };
        write!(
            f,
            "[{}] state {} ({}) {}: {}",
            self.tested_at.format("%H:%M:%S%.3f"),
            self.state,
            self.state_name,
            phase,
            if self.passed() { "PASSED" } else { "FAILED" }
        )?;
        if let Some(first) = self.mismatches.first() {
            write!(f, " - {first}")?;
            if self.mismatches.len() > 1 {
                write!(f, " (+{} more)", self.mismatches.len() - 1)?;
            }
        }
        Ok(())
    }
}

/// Read `block` once and compare every output bound to `state` against its
/// expected value.
///
/// `after_time_condition` selects which of the two expected values applies.
/// Values are compared exactly; REAL outputs must match bit for bit. All
/// mismatches are collected and logged, and the verdict is sent to `events`
/// before returning.
pub fn test_state<C>(
    connection: &mut C,
    model: &Model,
    block: u16,
    state: &State,
    after_time_condition: bool,
    events: &EventSink,
) -> Result<StateVerdict, ProtocolError>
where
    C: PlcConnection + ?Sized,
{
    let size = model.output_image_size();
    let image = if size == 0 {
        Vec::new()
    } else {
        connection.read_data_block(block, size)?
    };

    let mut mismatches = Vec::new();
    for binding in &state.outputs {
        let output = model
            .output(binding.output)
            .ok_or(ProtocolError::UnknownOutput(binding.output))?;
        let expected = binding.expected(after_time_condition);
        let actual = codec::decode(&image, output.address, output.data_type)?;
        if actual != expected {
            warn!(state = %state.id, output = %output.name, %expected, %actual, "output mismatch");
            mismatches.push(OutputMismatch {
                output: output.id,
                name: output.name.clone(),
                expected,
                actual,
            });
        }
    }

    let verdict = StateVerdict {
        state: state.id.clone(),
        state_name: state.name.clone(),
        after_time_condition,
        mismatches,
        tested_at: Local::now(),
    };
    debug!(state = %state.id, passed = verdict.passed(), "state tested");
    events.emit(TestEvent::StateTested(verdict.clone()));
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlcDataType, SignalDraft};
    use crate::plc::sim::SimulatedPlc;
    use crate::plc::TransportError;

    const OUTPUT_BLOCK: u16 = 2;

    fn fixture() -> (Model, StateId) {
        let mut model = Model::new();
        let lamp = model
            .add_output(SignalDraft::new("lamp", PlcDataType::Bit, 0).bit(1))
            .unwrap()
            .id;
        let speed = model
            .add_output(SignalDraft::new("speed", PlcDataType::Real, 2))
            .unwrap()
            .id;
        let s1 = model.add_state("running").unwrap();
        model.set_state_output(&s1, lamp, "1", "0").unwrap();
        model.set_state_output(&s1, speed, "1.5", "0").unwrap();
        (model, s1)
    }

    fn connected(image: Vec<u8>) -> SimulatedPlc {
        let mut plc = SimulatedPlc::new();
        plc.connect("127.0.0.1", 0, 1).unwrap();
        plc.set_block(OUTPUT_BLOCK, image);
        plc
    }

    #[test]
    fn matching_outputs_pass() {
        let (model, s1) = fixture();
        let mut plc = connected(vec![0b0000_0010, 0, 0x3F, 0xC0, 0x00, 0x00]);
        let state = model.state(&s1).unwrap();
        let verdict = test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &EventSink::new()).unwrap();
        assert!(verdict.passed(), "{verdict}");
    }

    #[test]
    fn after_time_condition_selects_second_value() {
        let (model, s1) = fixture();
        let mut plc = connected(vec![0b0000_0010, 0, 0x3F, 0xC0, 0x00, 0x00]);
        let state = model.state(&s1).unwrap();
        let verdict = test_state(&mut plc, &model, OUTPUT_BLOCK, state, true, &EventSink::new()).unwrap();
        assert!(!verdict.passed());
        assert_eq!(verdict.mismatches.len(), 2);
        assert_eq!(verdict.mismatches[0].expected, PlcValue::Bit(false));
        assert_eq!(verdict.mismatches[0].actual, PlcValue::Bit(true));
    }

    #[test]
    fn repeated_tests_agree() {
        let (model, s1) = fixture();
        let mut plc = connected(vec![0, 0, 0x3F, 0xC0, 0x00, 0x00]);
        let state = model.state(&s1).unwrap();
        let sink = EventSink::new();
        let first = test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &sink).unwrap();
        let second = test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &sink).unwrap();
        assert_eq!(first.passed(), second.passed());
        assert_eq!(first.mismatches, second.mismatches);
    }

    #[test]
    fn negative_zero_is_not_zero() {
        let mut model = Model::new();
        let level = model
            .add_output(SignalDraft::new("level", PlcDataType::Real, 0))
            .unwrap()
            .id;
        let s1 = model.add_state("idle").unwrap();
        model.set_state_output(&s1, level, "0", "0").unwrap();
        let mut plc = connected(vec![0x80, 0, 0, 0]);
        let state = model.state(&s1).unwrap();
        let verdict = test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &EventSink::new()).unwrap();
        assert!(!verdict.passed());
    }

    #[test]
    fn verdict_is_published() {
        let (model, s1) = fixture();
        let mut plc = connected(vec![0; 6]);
        let sink = EventSink::new();
        let mut receiver = sink.subscribe(4);
        let state = model.state(&s1).unwrap();
        test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &sink).unwrap();
        match receiver.try_recv().unwrap() {
            TestEvent::StateTested(verdict) => assert_eq!(verdict.state, s1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn transport_failure_is_returned() {
        let (model, s1) = fixture();
        let mut plc = connected(vec![0; 6]);
        plc.fail_reads(Some(TransportError::new(0x0005, "timeout")));
        let state = model.state(&s1).unwrap();
        let result = test_state(&mut plc, &model, OUTPUT_BLOCK, state, false, &EventSink::new());
        assert!(matches!(result, Err(ProtocolError::Transport(_))));
    }
}
