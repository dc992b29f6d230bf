//! The two test protocols and the events they publish.
//!
//! - [`test_state`]: read the output image once, compare with a state
//! - [`test_transition`]: write a transition's input image once
//!
//! Both notify an [`EventSink`] before returning.

mod error;
pub mod events;
mod state_test;
mod transition_test;

pub use error::ProtocolError;
pub use events::{EventSink, TestEvent};
pub use state_test::{test_state, OutputMismatch, StateVerdict};
pub use transition_test::{input_image, test_transition, TransitionWrite};
