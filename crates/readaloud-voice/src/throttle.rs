//! Highlight throttling.
//!
//! At most one highlight is published per window. Updates arriving inside
//! the window replace the pending one, which is flushed when the window
//! closes. Nothing is queued.

use std::time::Duration;

use tokio::time::Instant;

/// A word highlight: index into the word list plus its character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub word_index: usize,
    pub char_index: usize,
}

/// Coalescing rate limiter for [`Highlight`]s.
#[derive(Debug, Clone)]
pub struct HighlightThrottle {
    window: Duration,
    last_publish: Option<Instant>,
    pending: Option<Highlight>,
}

impl HighlightThrottle {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_publish: None,
            pending: None,
        }
    }

    /// Offer a highlight. Returns it if it may be published now, otherwise
    /// keeps it as the pending update.
    pub fn offer(&mut self, highlight: Highlight, now: Instant) -> Option<Highlight> {
        if self
            .last_publish
            .is_none_or(|t| now.saturating_duration_since(t) >= self.window)
        {
            self.last_publish = Some(now);
            self.pending = None;
            Some(highlight)
        } else {
            self.pending = Some(highlight);
            None
        }
    }

    /// When the pending update becomes publishable.
    pub fn flush_at(&self) -> Option<Instant> {
        self.pending.and(self.last_publish).map(|t| t + self.window)
    }

    /// Take the pending update if its window has closed.
    pub fn flush(&mut self, now: Instant) -> Option<Highlight> {
        let due = self.flush_at()?;
        if now < due {
            return None;
        }
        self.last_publish = Some(now);
        self.pending.take()
    }

    pub const fn pending(&self) -> Option<Highlight> {
        self.pending
    }

    pub fn reset(&mut self) {
        self.last_publish = None;
        self.pending = None;
    }
}
