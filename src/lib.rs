//! PLC conformance: model-based testing of live PLC programs
//!
//! The expected behavior of a PLC program is drawn as a Moore machine: states
//! carry the outputs the controller must show, transitions carry the inputs
//! that drive it from one state to the next. This crate turns such a model
//! into a finite set of closed test paths that together cover every
//! transition, then drives a PLC along each path cycle by cycle, writing the
//! input image, waiting one scaled PLC cycle and comparing the output image
//! against the model.
//!
//! # Core Concepts
//!
//! - **Model**: the session object owning inputs, outputs, states and
//!   transitions ([`core`])
//! - **Codec**: big-endian encoding of typed values into data block images
//!   ([`codec`])
//! - **Cycles**: covering closed walks through the initial state `S0`
//!   ([`cycles`])
//! - **Protocols**: one state test reads and compares, one transition test
//!   writes ([`protocol`])
//! - **Runner**: validation, connection, path execution and the cooperative
//!   stop request ([`runner`])
//!
//! The PLC itself is reached through the [`plc::PlcConnection`] trait.
//! [`plc::sim::SimulatedPlc`] implements it in memory.
//!
//! # Example
//!
//! ```rust
//! use plc_conformance::core::{Model, PlcDataType, SignalDraft, StateId};
//! use plc_conformance::cycles::generate_paths;
//!
//! let mut model = Model::new();
//! let button = model.add_input(SignalDraft::new("button", PlcDataType::Bit, 0)).unwrap().id;
//! model.add_output(SignalDraft::new("motor", PlcDataType::Bit, 0)).unwrap();
//!
//! let running = model.add_state("running").unwrap();
//! let start = model.add_sequential_transition("start", &StateId::initial(), &running).unwrap();
//! let stop = model.add_sequential_transition("stop", &running, &StateId::initial()).unwrap();
//! model.set_transition_input(&start, button, "1").unwrap();
//! model.set_transition_input(&stop, button, "0").unwrap();
//!
//! let paths = generate_paths(&model).unwrap();
//! assert_eq!(paths.len(), 1);
//! assert_eq!(paths[0].to_string(), "S0 --T0--> S1 --T1--> S0");
//! ```

pub mod codec;
pub mod core;
pub mod cycles;
pub mod plc;
pub mod protocol;
pub mod runner;
pub mod timing;

// Re-export commonly used types
pub use core::{Model, PlcDataType, PlcValue, StateId, TransitionId};
pub use cycles::{generate_paths, TestPath};
pub use plc::{PlcConnection, PlcStatus, TransportError};
pub use protocol::{EventSink, TestEvent};
pub use runner::{RunOutcome, RunReport, TestConfig, TestRunner};
