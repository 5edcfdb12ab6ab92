#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod events;
pub mod isolation;
pub mod language;
pub mod ports;
pub mod session;
pub mod settings;
pub mod text;

// Re-export commonly used types for convenience
pub use events::PlaybackEvent;
pub use isolation::{DIMMED, FOCUSED, IsolationMode, IsolationView};
pub use language::{
    LanguageCapability, LanguageTable, OnDeviceSupport, REMOTE_ACCENTS, RemoteAccent, accents_for,
    primary_subtag,
};
pub use ports::{
    AudioResource, BoundaryKind, ClipEvent, ClipEventSink, EventSink, NativeErrorCode,
    NativeEvent, NativeEventSink, NoopEmitter, OnDeviceSynthesizer, PlaybackEventEmitter,
    RemoteError, RemoteSynthesizer, UtteranceHandle, UtteranceSpec, VoiceDescriptor,
};
pub use session::{AttemptId, PlaybackPhase, ProviderKind, SessionState};
pub use settings::{
    EngineSettings, SettingsError, SpeakSettings, Speed, UtteranceRequest, validate_settings,
};
pub use text::{AnalysisCache, Span, TextStructure};
