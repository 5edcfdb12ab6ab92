//! Attempt-tagged callback sinks handed to providers.
//!
//! Providers may call a sink from any thread or callback. Every event is
//! delivered together with the [`AttemptId`] the sink was created for, so
//! the receiver can drop events from attempts it no longer cares about.

use std::fmt;
use std::sync::Arc;

use crate::session::AttemptId;

use super::on_device::{BoundaryKind, NativeErrorCode, NativeEvent};
use super::remote::ClipEvent;

type Deliver<E> = Arc<dyn Fn(AttemptId, E) + Send + Sync>;

/// Delivers provider events tagged with the attempt that produced them.
pub struct EventSink<E> {
    attempt: AttemptId,
    deliver: Deliver<E>,
}

impl<E> EventSink<E> {
    pub fn new(attempt: AttemptId, deliver: impl Fn(AttemptId, E) + Send + Sync + 'static) -> Self {
        Self {
            attempt,
            deliver: Arc::new(deliver),
        }
    }

    pub const fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn send(&self, event: E) {
        (self.deliver)(self.attempt, event);
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            attempt: self.attempt,
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<E> fmt::Debug for EventSink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Sink for on-device utterance events.
pub type NativeEventSink = EventSink<NativeEvent>;

impl EventSink<NativeEvent> {
    pub fn started(&self) {
        self.send(NativeEvent::Started);
    }

    pub fn boundary(&self, char_index: usize, kind: BoundaryKind) {
        self.send(NativeEvent::Boundary { char_index, kind });
    }

    pub fn ended(&self) {
        self.send(NativeEvent::Ended);
    }

    pub fn error(&self, code: NativeErrorCode) {
        self.send(NativeEvent::Error(code));
    }
}

/// Sink for remote clip playback events.
pub type ClipEventSink = EventSink<ClipEvent>;

impl EventSink<ClipEvent> {
    pub fn ended(&self) {
        self.send(ClipEvent::Ended);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(ClipEvent::Failed(message.into()));
    }
}
