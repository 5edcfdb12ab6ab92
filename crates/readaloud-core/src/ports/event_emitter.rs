//! Event emitter trait for playback events.
//!
//! Implementations handle transport details (channels, terminal output,
//! UI bridges).

use crate::events::PlaybackEvent;

/// Trait for emitting playback events.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and contexts that don't need events
/// - Channel or UI bridges in adapters
pub trait PlaybackEventEmitter: Send + Sync {
    /// Emit a playback event. Must not block.
    fn emit(&self, event: PlaybackEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn PlaybackEventEmitter>;
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl PlaybackEventEmitter for NoopEmitter {
    fn emit(&self, _event: PlaybackEvent) {}

    fn clone_box(&self) -> Box<dyn PlaybackEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn PlaybackEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(PlaybackEvent::SpeakingStopped);
        let _boxed = emitter.clone_box();
    }
}
