#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod clip;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod http;
pub mod native;
pub mod remote;
pub mod session;
pub mod simulated;
pub mod throttle;

// Re-export key types for convenience
pub use clip::DecodedClip;
pub use controller::{PlaybackController, PlaybackHandle};
pub use error::{EMPTY_TEXT_MESSAGE, GENERIC_FAILURE_MESSAGE, SpeechError};
pub use fallback::{FallbackController, FallbackDecision, Route, plan_route};
pub use http::{DEFAULT_TTS_URL, HttpRemoteSynthesizer};
pub use native::{NativeLimits, select_voice};
pub use remote::{HighlightSchedule, RemotePacing, ScheduledWord};
pub use simulated::SimulatedSynthesizer;
pub use throttle::{Highlight, HighlightThrottle};
