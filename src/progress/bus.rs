//! In-process event bus.

use crate::progress::event::ProgressEnvelope;
use serde::Serialize;
use serde_json::Value;
use std::sync::mpsc::{self, Receiver, SendError, Sender};

#[derive(Clone)]
pub struct ProgressBus {
    tx: Sender<ProgressEnvelope>,
}

impl ProgressBus {
    pub fn new_pair() -> (Self, Receiver<ProgressEnvelope>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn emit(
        &self,
        subject: impl Into<String>,
        event_type: &str,
        data: Value,
    ) -> Result<(), SendError<ProgressEnvelope>> {
        self.tx
            .send(ProgressEnvelope::with_now(subject, event_type, data))
    }

    /// Emit a typed payload. Returns whether the event was delivered; events that cannot be
    /// encoded, or that nobody listens for, are dropped and logged.
    pub fn emit_data<T: Serialize>(
        &self,
        subject: impl Into<String>,
        event_type: &str,
        data: &T,
    ) -> bool {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event_type, error = %e, "Failed to encode progress event");
                return false;
            }
        };
        match self.emit(subject, event_type, value) {
            Ok(()) => true,
            Err(SendError(envelope)) => {
                tracing::trace!(
                    event_type,
                    subject = %envelope.subject,
                    "Progress receiver closed; event dropped"
                );
                false
            }
        }
    }
}
