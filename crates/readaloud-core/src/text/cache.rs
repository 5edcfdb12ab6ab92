//! Single-entry memo for [`TextStructure`].
//!
//! A reading UI re-renders on every highlighted word; the structure only
//! changes when the text does.

use std::sync::Arc;

use super::TextStructure;

/// Memoizes the most recent analysis, keyed by the exact text.
#[derive(Debug, Default, Clone)]
pub struct AnalysisCache {
    current: Option<Arc<TextStructure>>,
}

impl AnalysisCache {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Return the structure for `text`, analysing only on a cache miss.
    pub fn get_or_analyze(&mut self, text: &str) -> Arc<TextStructure> {
        if let Some(current) = &self.current {
            if current.text() == text {
                return Arc::clone(current);
            }
        }
        let fresh = Arc::new(TextStructure::analyze(text));
        self.current = Some(Arc::clone(&fresh));
        fresh
    }

    /// The cached structure, if any.
    pub fn current(&self) -> Option<&Arc<TextStructure>> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
