//! Once-per-participant playback wiring.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use rehab_core::{
    AudioPlayback,
    traits::{PlaybackHandle, RemoteParticipant},
};

/// Attaches each remote participant's audio to local playback at most once.
///
/// Keyed by participant session id. An id that attached successfully is
/// never attached again until [`Self::release_all`]; a failed attach is not
/// recorded, so a later wiring pass retries it.
pub struct RemoteAudioAttacher {
    playback: Arc<dyn AudioPlayback>,
    attached: HashMap<String, Box<dyn PlaybackHandle>>,
}

impl RemoteAudioAttacher {
    #[must_use]
    pub fn new(playback: Arc<dyn AudioPlayback>) -> Self {
        Self {
            playback,
            attached: HashMap::new(),
        }
    }

    /// Attach every participant with audio that is not attached yet.
    ///
    /// Returns how many were newly attached.
    pub fn wire(&mut self, participants: &[RemoteParticipant]) -> usize {
        let mut added = 0;
        for participant in participants {
            let Some(track) = &participant.audio else {
                continue;
            };
            let Entry::Vacant(slot) = self.attached.entry(participant.session_id.clone()) else {
                continue;
            };
            match self.playback.attach(participant, track) {
                Ok(handle) => {
                    tracing::debug!(
                        participant = %participant.session_id,
                        track = %handle.track_id(),
                        "remote audio attached"
                    );
                    slot.insert(handle);
                    added += 1;
                }
                Err(e) => {
                    tracing::warn!(participant = %participant.session_id, "attach failed: {e}");
                }
            }
        }
        added
    }

    #[must_use]
    pub fn is_attached(&self, session_id: &str) -> bool {
        self.attached.contains_key(session_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    /// Stop all playback and forget every attached id.
    ///
    /// Returns how many attachments were released.
    pub fn release_all(&mut self) -> usize {
        let released = self.attached.len();
        self.attached.clear();
        if released > 0 {
            tracing::debug!(released, "remote audio released");
        }
        released
    }
}

impl std::fmt::Debug for RemoteAudioAttacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAudioAttacher")
            .field("attached", &self.attached.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
