//! Core abstractions for rehab coaching sessions.
//!
//! This crate provides the fundamental building blocks:
//! - Data model (`SessionPhase`, `ExerciseProtocol`, `SessionStats`, ...)
//! - `TranscriptLog` - Append-only history + broadcast of exchanged messages
//! - `StatsAggregator` - Bounded session biometrics
//! - `SpeakingState` - Agent speaking flag with timed expiry
//! - Collaborator traits for the backend, call transport and audio playback

pub mod catalog;
pub mod model;
pub mod speaking;
pub mod stats;
pub mod traits;
pub mod transcript;

pub use model::{
    ExerciseProtocol, MagnitudeFrame, Role, SessionPhase, SessionStats, StatsStatus, StatsUpdate,
    TranscriptMessage,
};
pub use speaking::SpeakingState;
pub use stats::StatsAggregator;
pub use traits::{AgentBackend, AudioPlayback, Call, CallClient, CallConnector};
pub use transcript::TranscriptLog;
