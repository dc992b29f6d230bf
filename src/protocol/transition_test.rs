//! Writing a transition's input assignments to the PLC.

use super::error::ProtocolError;
use super::events::{EventSink, TestEvent};
use crate::codec;
use crate::core::{Model, Transition, TransitionId};
use crate::plc::PlcConnection;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Record of one input image write.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionWrite {
    pub transition: TransitionId,
    pub transition_name: String,
    pub bytes: usize,
    pub written_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl fmt::Display for TransitionWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] transition {} ({}) wrote {} byte(s) in {:.3} ms",
            self.written_at.format("%H:%M:%S%.3f"),
            self.transition,
            self.transition_name,
            self.bytes,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

/// Build the input image for `transition`: a zeroed image sized for every
/// input with each of the transition's assignments encoded into it.
pub fn input_image(model: &Model, transition: &Transition) -> Result<Vec<u8>, ProtocolError> {
    let mut image = vec![0u8; model.input_image_size()];
    for binding in &transition.inputs {
        let input = model
            .input(binding.input)
            .ok_or(ProtocolError::UnknownInput(binding.input))?;
        codec::encode_into(&mut image, input.address, &binding.value)?;
    }
    Ok(image)
}

/// Write the input image of `transition` to `block` in one operation.
///
/// There is no read-back. For combinatorial transitions the caller must
/// have materialized the exclusion set beforehand; nothing exclusion
/// related is written here.
pub fn test_transition<C>(
    connection: &mut C,
    model: &Model,
    block: u16,
    transition: &Transition,
    events: &EventSink,
) -> Result<TransitionWrite, ProtocolError>
where
    C: PlcConnection + ?Sized,
{
    let image = input_image(model, transition)?;
    let written_at = Local::now();
    let started = Instant::now();
    connection.write_data_block(block, &image)?;
    let write = TransitionWrite {
        transition: transition.id.clone(),
        transition_name: transition.name.clone(),
        bytes: image.len(),
        written_at,
        elapsed: started.elapsed(),
    };
    debug!(transition = %transition.id, bytes = write.bytes, "input image written");
    events.emit(TestEvent::TransitionWritten(write.clone()));
    Ok(write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlcDataType, SignalDraft, StateId};
    use crate::plc::sim::SimulatedPlc;

    const INPUT_BLOCK: u16 = 1;

    #[test]
    fn assignments_are_encoded_into_a_zeroed_image() {
        let mut model = Model::new();
        let start = model
            .add_input(SignalDraft::new("start", PlcDataType::Bit, 0).bit(2))
            .unwrap()
            .id;
        let setpoint = model
            .add_input(SignalDraft::new("setpoint", PlcDataType::Word, 1))
            .unwrap()
            .id;
        model
            .add_input(SignalDraft::new("unused", PlcDataType::Byte, 3).value("9"))
            .unwrap();
        let s1 = model.add_state("s1").unwrap();
        let t = model
            .add_sequential_transition("go", &StateId::initial(), &s1)
            .unwrap();
        model.set_transition_input(&t, start, "1").unwrap();
        model.set_transition_input(&t, setpoint, "258").unwrap();

        let image = input_image(&model, model.transition(&t).unwrap()).unwrap();
        assert_eq!(image, vec![0b0000_0100, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn image_is_written_once_and_reported() {
        let mut model = Model::new();
        let start = model
            .add_input(SignalDraft::new("start", PlcDataType::Byte, 0))
            .unwrap()
            .id;
        let s1 = model.add_state("s1").unwrap();
        let t = model
            .add_sequential_transition("go", &StateId::initial(), &s1)
            .unwrap();
        model.set_transition_input(&t, start, "42").unwrap();

        let handle = SimulatedPlc::new();
        let mut plc = handle.clone();
        plc.connect("127.0.0.1", 0, 1).unwrap();
        let sink = EventSink::new();
        let mut receiver = sink.subscribe(2);

        let write = test_transition(&mut plc, &model, INPUT_BLOCK, model.transition(&t).unwrap(), &sink).unwrap();
        assert_eq!(write.bytes, 1);
        assert_eq!(handle.block(INPUT_BLOCK), Some(vec![42]));
        assert_eq!(handle.stats().writes, 1);
        assert_eq!(handle.stats().reads, 0);
        assert!(matches!(receiver.try_recv().unwrap(), TestEvent::TransitionWritten(_)));
    }
}
