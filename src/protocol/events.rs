//! Progress events and their delivery to observers.

use super::state_test::StateVerdict;
use super::transition_test::TransitionWrite;
use crate::cycles::TestPath;
use crate::plc::PlcStatus;
use crate::runner::{PathVerdict, RunOutcome, ValidationError};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything a run reports while it executes.
///
/// `Display` renders the one-line message shown to users.
#[derive(Clone, Debug, PartialEq)]
pub enum TestEvent {
    RunStarted {
        run_id: Uuid,
        at: DateTime<Local>,
    },
    PlcInfo {
        status: PlcStatus,
        pdu_length: usize,
    },
    ValidationFailed(ValidationError),
    RunAborted {
        reason: String,
    },
    PathListed {
        index: usize,
        path: TestPath,
    },
    StateTested(StateVerdict),
    TransitionWritten(TransitionWrite),
    PathFinished {
        index: usize,
        verdict: PathVerdict,
    },
    RunFinished {
        outcome: RunOutcome,
    },
}

impl fmt::Display for TestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { run_id, at } => write!(
                f,
                "==== PLC conformance test {} (run {run_id}) ====",
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            Self::PlcInfo { status, pdu_length } => {
                write!(f, "PLC status: {status}, PDU length: {pdu_length} bytes")
            }
            Self::ValidationFailed(error) => write!(f, "validation failed: {error}"),
            Self::RunAborted { reason } => write!(f, "test aborted: {reason}"),
            Self::PathListed { index, path } => write!(f, "path {}: {path}", index + 1),
            Self::StateTested(verdict) => write!(f, "{verdict}"),
            Self::TransitionWritten(write) => write!(f, "{write}"),
            Self::PathFinished { index, verdict } => write!(f, "path {}: {verdict}", index + 1),
            Self::RunFinished { outcome } => write!(f, "test finished: {outcome}"),
        }
    }
}

/// Fans events out to any number of bounded observer channels.
///
/// Sending never blocks: when an observer's channel is full the event is
/// dropped for that observer and a warning is logged. Closed channels are
/// forgotten.
#[derive(Clone, Default)]
pub struct EventSink {
    observers: Arc<Mutex<Vec<mpsc::Sender<TestEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new observer with room for `capacity` pending events.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<TestEvent> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.observers.lock().push(sender);
        receiver
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn emit(&self, event: TestEvent) {
        debug!(%event, "event");
        let mut observers = self.observers.lock();
        observers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(event = %dropped, "observer channel full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}
