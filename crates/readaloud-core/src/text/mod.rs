//! Text structure analysis and its per-text cache.

mod cache;
mod structure;

pub use cache::AnalysisCache;
pub use structure::{Span, TextStructure};
