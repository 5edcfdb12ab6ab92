#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary entry point only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod config;
pub mod handlers;
pub mod parser;
pub mod render;

// Re-export primary types for convenient access
pub use commands::{Commands, SpeakArgs};
pub use config::load_settings;
pub use parser::Cli;
