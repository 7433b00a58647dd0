//! Append-only transcript with broadcast + history.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{Role, TranscriptMessage};

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 1000;

struct Inner {
    history: VecDeque<TranscriptMessage>,
    next_index: u64,
}

/// Ordered, append-only record of exchanged messages.
///
/// Entries are never reordered, deduplicated or edited. Once `capacity`
/// entries are retained the oldest is dropped; indices keep increasing so
/// retained entries stay in insertion order.
pub struct TranscriptLog {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<TranscriptMessage>,
    capacity: usize,
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log retaining at most `capacity` entries (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                next_index: 0,
            }),
            sender,
            capacity: capacity.max(1),
        }
    }

    /// Append a message and notify live listeners.
    pub fn append(&self, role: Role, text: impl Into<String>) -> TranscriptMessage {
        let msg = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let msg = TranscriptMessage {
                index: inner.next_index,
                role,
                text: text.into(),
                timestamp: now(),
            };
            inner.next_index += 1;
            if inner.history.len() == self.capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(msg.clone());
            // Sent under the lock so live order matches history order.
            let _ = self.sender.send(msg.clone());
            msg
        };
        tracing::debug!(index = msg.index, role = ?msg.role, "transcript append");
        msg
    }

    pub fn push_agent<S: Into<String>>(&self, text: S) -> TranscriptMessage {
        self.append(Role::Agent, text)
    }

    pub fn push_user<S: Into<String>>(&self, text: S) -> TranscriptMessage {
        self.append(Role::User, text)
    }

    /// Get a receiver for live appends.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptMessage> {
        self.sender.subscribe()
    }

    /// Snapshot of the retained history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<TranscriptMessage> {
        self.read().history.iter().cloned().collect()
    }

    /// Number of messages ever appended, including dropped ones.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.read().next_index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().history.is_empty()
    }

    /// Stream that yields history first, then live appends.
    ///
    /// Entries already present in history are skipped on the live side.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, TranscriptMessage> {
        let (history, rx) = {
            let inner = self.read();
            (
                inner.history.iter().cloned().collect::<Vec<_>>(),
                self.sender.subscribe(),
            )
        };
        let next = history.last().map_or(0, |m| m.index + 1);

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(move |res| async move {
            res.ok().filter(|m| m.index >= next)
        });

        Box::pin(hist.chain(live))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
