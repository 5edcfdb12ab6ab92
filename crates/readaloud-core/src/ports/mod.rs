//! Port definitions (trait abstractions) for speech providers and listeners.
//!
//! # Design Rules
//!
//! - No transport or audio-device types in any signature
//! - Providers report progress through attempt-tagged sinks, never by
//!   mutating engine state

pub mod event_emitter;
pub mod on_device;
pub mod remote;
pub mod sink;

pub use event_emitter::{NoopEmitter, PlaybackEventEmitter};
pub use on_device::{
    BoundaryKind, NativeErrorCode, NativeEvent, OnDeviceSynthesizer, UtteranceHandle,
    UtteranceSpec, VoiceDescriptor,
};
pub use remote::{AudioResource, ClipEvent, RemoteError, RemoteSynthesizer};
pub use sink::{ClipEventSink, EventSink, NativeEventSink};
