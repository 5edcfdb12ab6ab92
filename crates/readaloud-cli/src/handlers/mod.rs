//! Command handlers.

pub mod languages;
pub mod speak;
pub mod voices;
