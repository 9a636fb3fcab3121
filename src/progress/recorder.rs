//! Drains the bus and numbers events in arrival order.

use crate::progress::event::{ProgressEnvelope, ProgressEvent};
use std::sync::mpsc::Receiver;

pub struct EventRecorder {
    rx: Receiver<ProgressEnvelope>,
    next_seq: u64,
    events: Vec<ProgressEvent>,
}

impl EventRecorder {
    pub fn new(rx: Receiver<ProgressEnvelope>) -> Self {
        Self {
            rx,
            next_seq: 1,
            events: Vec::new(),
        }
    }

    /// Pull everything currently on the bus. Returns the number of new events.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            self.events
                .push(ProgressEvent::from_envelope(envelope, self.next_seq));
            self.next_seq += 1;
            count += 1;
        }
        count
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    pub fn of_type<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a ProgressEvent> + 'a {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn for_subject<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a ProgressEvent> + 'a {
        self.events.iter().filter(move |e| e.subject == subject)
    }
}
