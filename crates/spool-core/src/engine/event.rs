//! Events from the audio thread back to the control thread
//!
//! A second `rtrb` queue runs in the opposite direction of the command
//! queue. The engine never waits on it: when the controller falls behind
//! and the queue is full, the event is dropped and counted.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::engine::EngineAtomics;

/// Notifications emitted by the engine
///
/// Serialised as `{"type": "...", ...}` with camelCase field names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Engine constructed and able to accept commands
    Ready,
    /// A track finished decoding and started playing
    Loaded { duration: f64 },
    /// Periodic position report, in seconds
    #[serde(rename_all = "camelCase")]
    Progress { current_time: f64, duration: f64 },
    /// A non-looping track reached its end
    Ended,
}

/// Capacity of the event queue
pub const EVENT_QUEUE_CAPACITY: usize = 256;

pub fn event_channel() -> (rtrb::Producer<EngineEvent>, rtrb::Consumer<EngineEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

/// Engine-side producer that drops (and counts) events on overflow
pub struct EventSender {
    producer: rtrb::Producer<EngineEvent>,
    atomics: Arc<EngineAtomics>,
}

impl EventSender {
    pub fn new(producer: rtrb::Producer<EngineEvent>, atomics: Arc<EngineAtomics>) -> Self {
        Self { producer, atomics }
    }

    #[inline]
    pub fn emit(&mut self, event: EngineEvent) {
        if self.producer.push(event).is_err() {
            self.atomics.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let json = serde_json::to_string(&EngineEvent::Progress {
            current_time: 1.5,
            duration: 10.0,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"progress","currentTime":1.5,"duration":10.0}"#);

        let json = serde_json::to_string(&EngineEvent::Ended).unwrap();
        assert_eq!(json, r#"{"type":"ended"}"#);

        let event: EngineEvent = serde_json::from_str(r#"{"type":"loaded","duration":3.0}"#).unwrap();
        assert_eq!(event, EngineEvent::Loaded { duration: 3.0 });
    }

    #[test]
    fn test_overflow_is_counted_not_blocking() {
        let (tx, mut rx) = event_channel();
        let atomics = Arc::new(EngineAtomics::default());
        let mut sender = EventSender::new(tx, atomics.clone());

        for _ in 0..EVENT_QUEUE_CAPACITY + 3 {
            sender.emit(EngineEvent::Ended);
        }
        assert_eq!(atomics.dropped_events.load(Ordering::Relaxed), 3);

        let mut received = 0;
        while rx.pop().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_QUEUE_CAPACITY);
    }
}
