//! Collaborator traits: coaching backend, call transport and audio playback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::StatsUpdate;

/// Credentials for joining a call as the local participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    pub token: String,
    pub api_key: String,
}

/// Backend error.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Coaching backend: credential issuance and agent activation.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Issue call credentials for `user_id`.
    async fn fetch_token(&self, user_id: &str) -> Result<ChannelCredentials, BackendError>;

    /// Ask the backend to send the coaching agent into `call_id`.
    async fn start_agent(&self, call_id: &str, exercise: &str) -> Result<(), BackendError>;
}

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Join failed: {0}")]
    Join(String),
    #[error("Leave failed: {0}")]
    Leave(String),
    #[error("Disconnect failed: {0}")]
    Disconnect(String),
}

/// Opaque reference to a remote audio source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioTrack {
    pub track_id: String,
}

/// A remote call participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParticipant {
    /// Stable per-participant session identifier.
    pub session_id: String,
    /// Account identifier; the coaching agent is recognised by a marker in it.
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub audio: Option<AudioTrack>,
}

impl RemoteParticipant {
    /// Whether this participant is the coaching agent.
    #[must_use]
    pub fn is_agent(&self, marker: &str) -> bool {
        is_agent_user(&self.user_id, marker)
    }
}

/// Whether `user_id` belongs to the coaching agent.
#[must_use]
pub fn is_agent_user(user_id: &str, marker: &str) -> bool {
    !marker.is_empty() && user_id.contains(marker)
}

/// Event emitted by a joined call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    /// Current remote participant list.
    ParticipantsChanged { participants: Vec<RemoteParticipant> },
    /// Recognised speech from a participant.
    Utterance { user_id: String, text: String },
    /// Biometrics reported by the coaching agent.
    Stats { update: StatsUpdate },
}

/// A call (channel) handle.
#[async_trait]
pub trait Call: Send + Sync {
    /// Stable call identifier.
    fn id(&self) -> &str;

    /// Join the call.
    async fn join(&self) -> Result<(), TransportError>;

    /// Leave the call.
    async fn leave(&self) -> Result<(), TransportError>;

    /// Remote participants currently in the call.
    fn participants(&self) -> Vec<RemoteParticipant>;

    /// Receiver for call events.
    fn subscribe(&self) -> broadcast::Receiver<CallEvent>;
}

/// An authenticated transport client.
#[async_trait]
pub trait CallClient: Send + Sync {
    /// Construct a handle for `call_type:call_id`. Does not join.
    fn call(&self, call_type: &str, call_id: &str) -> Arc<dyn Call>;

    /// Disconnect the client from the transport.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Builds transport clients from issued credentials.
pub trait CallConnector: Send + Sync {
    /// Create a client authenticated as `user_id`.
    ///
    /// # Errors
    /// Returns error if the credentials are rejected.
    fn connect(
        &self,
        credentials: &ChannelCredentials,
        user_id: &str,
    ) -> Result<Arc<dyn CallClient>, TransportError>;
}

/// Playback error.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),
    #[error("Attach failed: {0}")]
    Attach(String),
}

/// Live playback of one remote audio source.
///
/// Dropping the handle stops playback and releases its device resources.
pub trait PlaybackHandle: Send {
    fn track_id(&self) -> &str;
}

/// Local audio output for remote participants.
pub trait AudioPlayback: Send + Sync {
    /// Start playing `track` for `participant`.
    ///
    /// # Errors
    /// Returns error if the output device cannot play the track.
    fn attach(
        &self,
        participant: &RemoteParticipant,
        track: &AudioTrack,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}
