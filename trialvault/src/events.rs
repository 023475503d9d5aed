//! Ledger event notifications.
//!
//! Emission is fire-and-forget: a sink that cannot deliver drops the event and
//! the operation that emitted it still succeeds.

use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Events raised by the access-request workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerEvent {
    /// A researcher submitted a request
    AccessRequested,
    /// A request reached the approval quorum
    AccessApproved,
    /// A request hit the vote limit without quorum
    AccessRejected,
}

impl LedgerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccessRequested => "AccessRequested",
            Self::AccessApproved => "AccessApproved",
            Self::AccessRejected => "AccessRejected",
        }
    }
}

/// An event as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Vec<u8>,
}

impl EmittedEvent {
    /// Payload as UTF-8, lossily.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Destination for ledger events.
pub trait EventSink {
    /// Emit an event. Must not fail the caller.
    fn emit(&self, name: &str, payload: &[u8]);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _name: &str, _payload: &[u8]) {}
}

/// Sink that keeps every event in memory.
///
/// Clones share the same buffer, so a test can hand one clone to the ledger and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Rc<RefCell<Vec<EmittedEvent>>>,
}

impl RecordingEventSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.borrow().clone()
    }

    /// Names of recorded events, oldest first.
    pub fn names(&self) -> Vec<String> {
        self.events.borrow().iter().map(|e| e.name.clone()).collect()
    }

    /// Number of recorded events named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.name == name).count()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, name: &str, payload: &[u8]) {
        self.events.borrow_mut().push(EmittedEvent {
            name: name.to_string(),
            payload: payload.to_vec(),
        });
    }
}

/// Sink that writes each event to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, name: &str, payload: &[u8]) {
        info!(
            event = %name,
            payload = %String::from_utf8_lossy(payload),
            "Ledger event"
        );
    }
}

/// Sink that fans events out to in-process subscribers.
///
/// `emit` never waits: with no subscriber the event is dropped, and a lagging
/// subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEventSink {
    /// Create a sink buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }

    /// Current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, name: &str, payload: &[u8]) {
        let event = EmittedEvent {
            name: name.to_string(),
            payload: payload.to_vec(),
        };
        if self.sender.send(event).is_err() {
            debug!(event = %name, "No subscribers; event dropped");
        }
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&self, name: &str, payload: &[u8]) {
        (**self).emit(name, payload)
    }
}

/// Emit a workflow event with a request id payload.
pub(crate) fn emit_event(sink: &dyn EventSink, event: LedgerEvent, request_id: &str) {
    debug!(event = event.name(), request_id = %request_id, "Emitting event");
    sink.emit(event.name(), request_id.as_bytes());
}
