//! Session orchestration for rehab coaching.
//!
//! Provides:
//! - `SessionController` - Phase state machine, join handshake and teardown
//! - `Transition` - The table of legal phase transitions
//! - `RemoteAudioAttacher` - Once-per-participant playback wiring
//! - `SessionConfig` - Environment-driven settings

pub mod attacher;
pub mod config;
pub mod controller;
mod handshake;
mod messages;
pub mod transition;

pub use attacher::RemoteAudioAttacher;
pub use config::{ConfigError, SessionConfig};
pub use controller::SessionController;
pub use handshake::HandshakeError;
pub use transition::{Transition, TransitionOutcome};
