//! The test orchestrator.
//!
//! A [`TestRunner`] drives one run at a time through
//! `Idle → Validating → Connecting → Running → Disconnecting → Idle`:
//!
//! 1. **Validating** – the model snapshot is cleaned up
//!    ([`Model::materialize_exclusions`]), checked with [`validate`], and
//!    turned into test paths. Any violation ends the run before the PLC is
//!    touched.
//! 2. **Connecting** – the connection is opened and the controller must
//!    report RUN.
//! 3. **Running** – every path is walked: test a state, write the next
//!    transition, wait one scaled cycle, repeat. A failed state ends its path.
//! 4. **Disconnecting** – the connection is closed exactly once, however
//!    the run ended.
//!
//! Failures never escape as errors. They become events for observers and
//! an outcome in the returned [`RunReport`].
//!
//! # Example
//!
//! ```rust
//! use plc_conformance::core::{Model, PlcDataType, SignalDraft, StateId};
//! use plc_conformance::plc::sim::SimulatedPlc;
//! use plc_conformance::runner::{RunOutcome, TestConfig, TestRunner};
//!
//! let mut model = Model::new();
//! let start = model.add_input(SignalDraft::new("start", PlcDataType::Bit, 0)).unwrap().id;
//! let lamp = model.add_output(SignalDraft::new("lamp", PlcDataType::Bit, 0)).unwrap().id;
//! let on = model.add_state("on").unwrap();
//! model.set_state_output(&on, lamp, "1", "1").unwrap();
//! let t0 = model.add_sequential_transition("switch on", &StateId::initial(), &on).unwrap();
//! let t1 = model.add_sequential_transition("switch off", &on, &StateId::initial()).unwrap();
//! model.set_transition_input(&t0, start, "1").unwrap();
//! model.set_transition_input(&t1, start, "0").unwrap();
//!
//! // The "PLC program": lamp follows start.
//! let mut plc = SimulatedPlc::new().with_program(1, 2, |input, output| {
//!     output.resize(1, 0);
//!     output[0] = input[0] & 1;
//! });
//!
//! let runner = TestRunner::new(TestConfig { cycle_time_ms: 1, ..TestConfig::default() });
//! let report = runner.run(&model, &mut plc).unwrap();
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! assert!(report.all_passed());
//! ```

mod config;
mod error;
mod report;
mod validate;

pub use config::{ConnectionConfig, TestConfig};
pub use error::{ConfigError, RunError};
pub use report::{PathReport, PathVerdict, RunOutcome, RunReport};
pub use validate::{check, validate, ValidationError, ValidationErrors};

use crate::core::{Model, StateId};
use crate::cycles::{generate_paths, TestPath};
use crate::plc::{PlcConnection, PlcStatus};
use crate::protocol::{test_state, test_transition, EventSink, TestEvent};
use crate::timing::{wait_for, wait_until};
use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use stillwater::validation::Validation;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where the orchestrator currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Validating,
    Connecting,
    Running,
    Disconnecting,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Validating => "VALIDATING",
            Self::Connecting => "CONNECTING",
            Self::Running => "RUNNING",
            Self::Disconnecting => "DISCONNECTING",
        };
        f.write_str(name)
    }
}

struct Shared {
    phase: Mutex<RunPhase>,
    stop: AtomicBool,
}

/// Runs conformance tests against a PLC, one run at a time.
///
/// The runner is a cheap handle: clones share the phase, the stop flag and
/// the observers, so an editor can keep one clone to call
/// [`stop_request`](Self::stop_request) while a worker thread runs.
#[derive(Clone)]
pub struct TestRunner {
    config: TestConfig,
    shared: Arc<Shared>,
    events: EventSink,
}

impl TestRunner {
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                phase: Mutex::new(RunPhase::Idle),
                stop: AtomicBool::new(false),
            }),
            events: EventSink::new(),
        }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Attach an observer. Its channel holds `event_capacity` events.
    pub fn subscribe(&self) -> mpsc::Receiver<TestEvent> {
        self.events.subscribe(self.config.event_capacity)
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn phase(&self) -> RunPhase {
        *self.shared.phase.lock()
    }

    pub fn is_running(&self) -> bool {
        self.phase() != RunPhase::Idle
    }

    /// Ask the active run to stop at the next state or path boundary.
    ///
    /// A PLC operation or wait already in progress always completes.
    pub fn stop_request(&self) {
        info!("stop requested");
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Start a run on a dedicated worker thread.
    ///
    /// The worker tests a snapshot of `model`, so later edits do not affect
    /// it. Returns `None` without doing anything when a run is already
    /// active.
    pub fn execute<C>(&self, model: &Model, connection: C) -> Option<JoinHandle<RunReport>>
    where
        C: PlcConnection + Send + 'static,
    {
        if !self.claim() {
            return None;
        }
        let runner = self.clone();
        let snapshot = model.clone();
        let spawned = thread::Builder::new()
            .name("plc-test-worker".to_string())
            .spawn(move || {
                let mut connection = connection;
                runner.perform(&snapshot, &mut connection)
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(error = %err, "cannot start test worker");
                self.set_phase(RunPhase::Idle);
                None
            }
        }
    }

    /// Run on the calling thread. Returns `None` when a run is already
    /// active.
    pub fn run<C>(&self, model: &Model, connection: &mut C) -> Option<RunReport>
    where
        C: PlcConnection + ?Sized,
    {
        if !self.claim() {
            return None;
        }
        Some(self.perform(model, connection))
    }

    fn claim(&self) -> bool {
        let mut phase = self.shared.phase.lock();
        if *phase != RunPhase::Idle {
            warn!(phase = %*phase, "a test run is already active");
            return false;
        }
        *phase = RunPhase::Validating;
        self.shared.stop.store(false, Ordering::SeqCst);
        true
    }

    fn set_phase(&self, phase: RunPhase) {
        debug!(%phase, "phase");
        *self.shared.phase.lock() = phase;
    }

    fn perform<C>(&self, model: &Model, connection: &mut C) -> RunReport
    where
        C: PlcConnection + ?Sized,
    {
        let mut session = Session {
            runner: self,
            connection,
            connected: false,
        };
        let run_id = Uuid::new_v4();
        let mut report = RunReport::begin(run_id);
        info!(%run_id, "test run started");
        self.events.emit(TestEvent::RunStarted {
            run_id,
            at: Local::now(),
        });

        let outcome = match self.drive(model, &mut session, &mut report) {
            Ok(outcome) => outcome,
            Err(err) => self.abort(err),
        };
        session.close();
        self.finish(report, outcome)
    }

    fn drive<C>(
        &self,
        model: &Model,
        session: &mut Session<'_, C>,
        report: &mut RunReport,
    ) -> Result<RunOutcome, RunError>
    where
        C: PlcConnection + ?Sized,
    {
        let mut snapshot = model.clone();
        snapshot.materialize_exclusions();
        let paths = self.prepare(&snapshot)?;
        report.list_paths(&paths);

        self.set_phase(RunPhase::Connecting);
        self.connect(&snapshot, session)?;

        self.set_phase(RunPhase::Running);
        for (index, path) in paths.iter().enumerate() {
            self.events.emit(TestEvent::PathListed {
                index,
                path: path.clone(),
            });
        }
        Ok(self.run_paths(&snapshot, &paths, &mut *session.connection, report))
    }

    fn prepare(&self, model: &Model) -> Result<Vec<TestPath>, RunError> {
        match validate(model, &self.config) {
            Validation::Success(_) => {}
            Validation::Failure(errors) => {
                for error in errors.iter() {
                    warn!(%error, "validation failed");
                    self.events.emit(TestEvent::ValidationFailed(error.clone()));
                }
                return Err(RunError::Validation(errors.into()));
            }
        }
        let paths = generate_paths(model)?;
        info!(paths = paths.len(), "test paths generated");
        Ok(paths)
    }

    /// Open the connection and require RUN mode. The session closes the
    /// connection again whenever this fails after a successful connect.
    fn connect<C>(&self, model: &Model, session: &mut Session<'_, C>) -> Result<(), RunError>
    where
        C: PlcConnection + ?Sized,
    {
        let target = &self.config.connection;
        session.connection.connect(&target.address, target.rack, target.slot)?;
        session.connected = true;
        info!(address = %target.address, rack = target.rack, slot = target.slot, "connected");

        let status = session.connection.read_status()?;
        let pdu_length = session.connection.pdu_length();
        self.events.emit(TestEvent::PlcInfo { status, pdu_length });
        if status != PlcStatus::Run {
            return Err(RunError::NotInRunMode(status));
        }

        let input_size = model.input_image_size();
        let output_size = model.output_image_size();
        if input_size > pdu_length || output_size > pdu_length {
            warn!(input_size, output_size, pdu_length, "image larger than the PDU");
        }
        Ok(())
    }

    fn run_paths<C>(
        &self,
        model: &Model,
        paths: &[TestPath],
        connection: &mut C,
        report: &mut RunReport,
    ) -> RunOutcome
    where
        C: PlcConnection + ?Sized,
    {
        let mut failed = false;
        for (index, path) in paths.iter().enumerate() {
            if self.stop_requested() {
                info!(path = index + 1, "stopped before path");
                return RunOutcome::Stopped;
            }
            let verdict = self.run_path(model, path, connection);
            info!(path = index + 1, %verdict, "path finished");
            self.events.emit(TestEvent::PathFinished {
                index,
                verdict: verdict.clone(),
            });
            if let Some(entry) = report.paths.get_mut(index) {
                entry.verdict = verdict.clone();
            }
            match verdict {
                PathVerdict::Stopped => return RunOutcome::Stopped,
                PathVerdict::Failed { .. } => {
                    failed = true;
                    if self.config.stop_on_first_failure {
                        break;
                    }
                }
                PathVerdict::Passed | PathVerdict::NotRun => {}
            }
        }
        if failed {
            RunOutcome::Failed
        } else {
            RunOutcome::Completed
        }
    }

    /// Walk one path. The state reached by a transition is tested with that
    /// transition's after-time flag; the origin is tested with `false`.
    fn run_path<C>(&self, model: &Model, path: &TestPath, connection: &mut C) -> PathVerdict
    where
        C: PlcConnection + ?Sized,
    {
        let config = &self.config;
        let mut current: &StateId = &path.origin;
        let mut after_time_condition = false;
        let mut entered = Instant::now();

        for position in 0..=path.steps.len() {
            if position > 0 && self.stop_requested() {
                return PathVerdict::Stopped;
            }
            let Some(state) = model.state(current) else {
                return failed(current, "state is not part of the model");
            };

            match test_state(
                connection,
                model,
                config.output_block,
                state,
                after_time_condition,
                &self.events,
            ) {
                Ok(verdict) if verdict.passed() => {}
                Ok(verdict) => {
                    let reasons: Vec<String> =
                        verdict.mismatches.iter().map(ToString::to_string).collect();
                    return failed(current, reasons.join("; "));
                }
                Err(err) => return failed(current, err.to_string()),
            }

            let Some(step) = path.steps.get(position) else {
                break;
            };
            let Some(transition) = model.transition(&step.transition) else {
                return failed(current, format!("transition {} is not part of the model", step.transition));
            };

            if transition.after_time_condition && state.has_timer() {
                let hold = state
                    .timer_condition_ms
                    .saturating_add(state.timer_condition_tolerance_ms);
                let Some(deadline) = entered.checked_add(Duration::from_millis(hold)) else {
                    return failed(current, format!("timer condition of {hold} ms exceeds the clock range"));
                };
                debug!(state = %state.id, hold_ms = hold, "waiting for timer condition");
                wait_until(deadline);
            }

            if let Err(err) = test_transition(
                connection,
                model,
                config.input_block,
                transition,
                &self.events,
            ) {
                return failed(current, err.to_string());
            }
            entered = Instant::now();
            wait_for(config.cycle_time_ms, config.scaling_factor);

            after_time_condition = transition.after_time_condition;
            current = &step.target;
        }
        PathVerdict::Passed
    }

    fn abort(&self, err: RunError) -> RunOutcome {
        error!(error = %err, "test run aborted");
        let reason = err.to_string();
        self.events.emit(TestEvent::RunAborted {
            reason: reason.clone(),
        });
        RunOutcome::Aborted { reason }
    }

    fn finish(&self, mut report: RunReport, outcome: RunOutcome) -> RunReport {
        report.outcome = outcome.clone();
        report.finished_at = chrono::Utc::now();
        info!(run_id = %report.run_id, %outcome, "test run finished");
        self.events.emit(TestEvent::RunFinished { outcome });
        report
    }
}

/// The connection of one run. Dropping the session closes a connection
/// that is still open and returns the runner to `Idle`, also when a panic
/// unwinds through the run.
struct Session<'a, C: PlcConnection + ?Sized> {
    runner: &'a TestRunner,
    connection: &'a mut C,
    connected: bool,
}

impl<C: PlcConnection + ?Sized> Session<'_, C> {
    /// Disconnect once. Later calls do nothing.
    fn close(&mut self) {
        if std::mem::take(&mut self.connected) {
            self.runner.set_phase(RunPhase::Disconnecting);
            self.connection.disconnect();
            info!("disconnected");
        }
    }
}

impl<C: PlcConnection + ?Sized> Drop for Session<'_, C> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("test run panicked, releasing the PLC");
        }
        self.close();
        self.runner.set_phase(RunPhase::Idle);
    }
}

fn failed(state: &StateId, reason: impl Into<String>) -> PathVerdict {
    PathVerdict::Failed {
        state: state.clone(),
        reason: reason.into(),
    }
}
