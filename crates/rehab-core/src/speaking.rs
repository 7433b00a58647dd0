//! Agent speaking flag with timed expiry.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

/// Whether the coaching agent is currently speaking.
///
/// Set on each agent utterance and cleared automatically once its expiry
/// passes without a newer utterance. The transport carries no end-of-speech
/// signal, so the timeout only approximates when an utterance ends.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct SpeakingState {
    expires_at: Arc<Mutex<Option<Instant>>>,
}

impl SpeakingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the agent as speaking for the next `timeout`.
    ///
    /// A later call replaces the expiry, extending or shortening it.
    pub fn mark(&self, timeout: Duration) {
        *self.lock() = Some(Instant::now() + timeout);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        let expires_at = *self.lock();
        expires_at.is_some_and(|at| Instant::now() < at)
    }

    /// Expiry of the current utterance, if one is still running.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        let expires_at = *self.lock();
        expires_at.filter(|at| Instant::now() < *at)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.expires_at.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
