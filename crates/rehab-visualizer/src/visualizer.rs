//! Self-rescheduling visualization loop with scoped activations.
//!
//! Each [`VisualizationLoop::activate`] starts a cycle identified by a
//! generation number. The cycle owns a tick task, a capture acquisition task
//! and (once acquired) a [`FrequencyAnalyzer`]. Frames are only published
//! while the loop's current generation matches the cycle's, checked under
//! the same lock that deactivation takes, so no frame from a finished cycle
//! can appear after [`Activation::deactivate`] returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rehab_core::{MagnitudeFrame, SpeakingState};
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};

use crate::{CaptureSource, ConfigError, FrequencyAnalyzer, VisualizerConfig, synthetic};

/// Where a frame's magnitudes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Live capture analysis.
    Live,
    /// Synthetic pattern while the agent speaks.
    Synthetic,
    /// No capture and nobody speaking.
    Silent,
}

/// One rendered tick.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualFrame {
    /// Activation cycle that produced the frame.
    pub generation: u64,
    /// Tick number within the cycle.
    pub sequence: u64,
    pub source: FrameSource,
    pub speaking: bool,
    pub magnitudes: MagnitudeFrame,
}

#[derive(Default)]
struct LoopState {
    generation: u64,
    active: bool,
    analyzer: Option<FrequencyAnalyzer>,
}

fn lock(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Audio-reactive render loop.
pub struct VisualizationLoop {
    capture: Arc<dyn CaptureSource>,
    speaking: SpeakingState,
    config: Arc<VisualizerConfig>,
    frames: broadcast::Sender<VisualFrame>,
    state: Arc<Mutex<LoopState>>,
}

impl VisualizationLoop {
    /// Create an inactive loop.
    ///
    /// # Errors
    /// Returns error if `config` fails [`VisualizerConfig::validate`].
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        speaking: SpeakingState,
        config: VisualizerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (frames, _) = broadcast::channel(64);
        Ok(Self {
            capture,
            speaking,
            config: Arc::new(config),
            frames,
            state: Arc::new(Mutex::new(LoopState::default())),
        })
    }

    /// Get a receiver for rendered frames.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<VisualFrame> {
        self.frames.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    /// Whether the current cycle has acquired its capture context.
    #[must_use]
    pub fn has_live_capture(&self) -> bool {
        lock(&self.state).analyzer.is_some()
    }

    /// Start a new cycle.
    ///
    /// Any cycle still running is superseded: its capture is released now and
    /// its tasks stop at their next tick. Must be called within a tokio runtime.
    #[must_use = "dropping the activation immediately deactivates the loop"]
    pub fn activate(&self) -> Activation {
        let (generation, superseded) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.active = true;
            (state.generation, state.analyzer.take())
        };
        if superseded.is_some() {
            tracing::warn!(generation, "activation superseded a running cycle");
        }
        drop(superseded);

        let capture_task = tokio::spawn(acquire_capture(
            generation,
            Arc::clone(&self.capture),
            Arc::clone(&self.state),
            Arc::clone(&self.config),
        ));

        let ticker = Ticker {
            generation,
            state: Arc::clone(&self.state),
            frames: self.frames.clone(),
            speaking: self.speaking.clone(),
            config: Arc::clone(&self.config),
            started: Instant::now(),
        };
        let tick_task = tokio::spawn(ticker.run());

        tracing::info!(generation, "visualization activated");
        Activation {
            generation,
            state: Arc::clone(&self.state),
            tick_task,
            capture_task,
        }
    }
}

/// One running cycle of a [`VisualizationLoop`].
///
/// Deactivation happens exactly once: through [`Self::deactivate`] or when
/// the activation is dropped. Either way the tick is cancelled and the
/// capture device is released before control returns.
pub struct Activation {
    generation: u64,
    state: Arc<Mutex<LoopState>>,
    tick_task: JoinHandle<()>,
    capture_task: JoinHandle<()>,
}

impl Activation {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this is still the loop's running cycle.
    #[must_use]
    pub fn is_current(&self) -> bool {
        lock(&self.state).generation == self.generation
    }

    /// Stop the cycle and release its capture.
    pub fn deactivate(self) {
        drop(self);
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.tick_task.abort();
        self.capture_task.abort();

        let mut state = lock(&self.state);
        if state.generation != self.generation {
            return;
        }
        state.generation += 1;
        state.active = false;
        let analyzer = state.analyzer.take();
        drop(state);

        let had_capture = analyzer.is_some();
        drop(analyzer);
        tracing::info!(generation = self.generation, had_capture, "visualization deactivated");
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

async fn acquire_capture(
    generation: u64,
    capture: Arc<dyn CaptureSource>,
    state: Arc<Mutex<LoopState>>,
    config: Arc<VisualizerConfig>,
) {
    match capture.open().await {
        Ok(stream) => {
            let stale = {
                let mut state = lock(&state);
                if state.generation == generation {
                    state.analyzer = Some(FrequencyAnalyzer::new(stream, &config));
                    None
                } else {
                    Some(stream)
                }
            };
            if let Some(stream) = stale {
                drop(stream);
                tracing::debug!(generation, "capture ready after deactivation, released");
            } else {
                tracing::info!(generation, "live capture attached");
            }
        }
        Err(e) => {
            tracing::warn!(generation, "capture unavailable, using fallback signal: {e}");
        }
    }
}

struct Ticker {
    generation: u64,
    state: Arc<Mutex<LoopState>>,
    frames: broadcast::Sender<VisualFrame>,
    speaking: SpeakingState,
    config: Arc<VisualizerConfig>,
    started: Instant,
}

impl Ticker {
    async fn run(self) {
        let mut sequence = 0u64;
        while self.tick(sequence) {
            sequence += 1;
            tokio::time::sleep(self.config.tick_interval).await;
        }
        tracing::debug!(generation = self.generation, ticks = sequence, "tick loop stopped");
    }

    /// Produce and publish one frame. Returns false once the cycle is over.
    fn tick(&self, sequence: u64) -> bool {
        let mut state = lock(&self.state);
        if state.generation != self.generation {
            return false;
        }

        let bins = self.config.bins;
        let speaking = self.speaking.is_speaking();
        let (source, magnitudes) = match state.analyzer.as_mut() {
            Some(analyzer) => (FrameSource::Live, analyzer.magnitudes(bins)),
            None if speaking => (
                FrameSource::Synthetic,
                synthetic::speaking_frame(bins, self.started.elapsed()),
            ),
            None => (FrameSource::Silent, MagnitudeFrame::zeros(bins)),
        };

        // Published under the lock; see module docs.
        let _ = self.frames.send(VisualFrame {
            generation: self.generation,
            sequence,
            source,
            speaking,
            magnitudes,
        });
        true
    }
}
