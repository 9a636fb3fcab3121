//! Progress observability primitives.

pub mod bus;
pub mod event;
pub mod recorder;

pub use bus::ProgressBus;
pub use event::{NodeEventData, PhaseEventData, ProgressEnvelope, ProgressEvent, RunEventData};
pub use recorder::EventRecorder;
