//! Stand-ins for the call transport and speaker output.
//!
//! The terminal client has no audio/video transport, so every session runs
//! in demo mode after the backend handshake.

use std::sync::Arc;

use rehab_core::{
    AudioPlayback, CallClient, CallConnector,
    traits::{
        AudioTrack, ChannelCredentials, PlaybackError, PlaybackHandle, RemoteParticipant,
        TransportError,
    },
};

pub struct OfflineConnector;

impl CallConnector for OfflineConnector {
    fn connect(
        &self,
        _credentials: &ChannelCredentials,
        user_id: &str,
    ) -> Result<Arc<dyn CallClient>, TransportError> {
        tracing::info!(user_id, "credentials accepted, but no call transport is available");
        Err(TransportError::Connect(
            "terminal client has no call transport".into(),
        ))
    }
}

pub struct NoPlayback;

impl AudioPlayback for NoPlayback {
    fn attach(
        &self,
        participant: &RemoteParticipant,
        _track: &AudioTrack,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        Err(PlaybackError::Unavailable(format!(
            "no audio output for {}",
            participant.session_id
        )))
    }
}
