//! Session phase state machine.
//!
//! All phase changes go through [`Transition::target`] under one lock, so
//! they are totally ordered. Background work (elapsed ticker, call-event
//! pump, a handshake still in flight) is tagged with the epoch of the
//! `start()` that created it and stops acting once that epoch is no longer
//! the active one.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use rehab_core::{
    AgentBackend, AudioPlayback, CallConnector, ExerciseProtocol, SessionPhase, SessionStats,
    SpeakingState, StatsAggregator, StatsUpdate, TranscriptLog,
    traits::{CallEvent, is_agent_user},
};
use rehab_visualizer::{Activation, VisualizationLoop};
use tokio::{
    sync::{broadcast, watch},
    task::{AbortHandle, JoinHandle},
    time::Instant,
};
use uuid::Uuid;

use crate::{
    RemoteAudioAttacher, SessionConfig, Transition, TransitionOutcome,
    handshake::{Handshake, HandshakeError, LiveCall},
    messages,
};

const ELAPSED_TICK: Duration = Duration::from_secs(1);

struct Inner {
    phase: SessionPhase,
    protocol: Option<ExerciseProtocol>,
    stats: StatsAggregator,
    /// Bumped by every `start()`.
    epoch: u64,
    session_id: Option<String>,
    live: Option<LiveCall>,
    attacher: RemoteAudioAttacher,
    ticker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    /// Handshake task of the current epoch, until it finishes.
    handshake: Option<AbortHandle>,
    activation: Option<Activation>,
}

impl Inner {
    /// Whether work started in `epoch` may still act.
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.phase == SessionPhase::Active
    }

    /// Detach everything the active phase owns.
    fn take_active_resources(&mut self) -> (Option<Activation>, Option<LiveCall>) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
        self.attacher.release_all();
        (self.activation.take(), self.live.take())
    }
}

struct Shared {
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<SessionPhase>,
    transcript: Arc<TranscriptLog>,
    speaking: SpeakingState,
    config: SessionConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, inner: &mut Inner, to: SessionPhase) {
        let from = inner.phase;
        inner.phase = to;
        self.phase_tx.send_replace(to);
        tracing::info!(%from, %to, "phase changed");
    }

    fn tick_elapsed(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(epoch) {
            return false;
        }
        inner.stats.tick();
        true
    }

    /// Apply one call event. Returns false once the epoch is over.
    fn apply_call_event(&self, epoch: u64, event: CallEvent) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(epoch) {
            return false;
        }
        match event {
            CallEvent::ParticipantsChanged { participants } => {
                inner.attacher.wire(&participants);
            }
            CallEvent::Utterance { user_id, text } => {
                // Appended under the phase lock so it cannot land after the summary.
                if is_agent_user(&user_id, &self.config.agent_marker) {
                    self.transcript.push_agent(text);
                    self.speaking.mark(self.config.speaking_timeout);
                } else {
                    self.transcript.push_user(text);
                }
            }
            CallEvent::Stats { update } => inner.stats.update(update),
        }
        true
    }

    /// Apply the handshake result, unless the epoch has ended meanwhile.
    fn finish_start(
        self: &Arc<Self>,
        epoch: u64,
        protocol: &ExerciseProtocol,
        result: Result<LiveCall, HandshakeError>,
    ) {
        let mut inner = self.lock();
        if !inner.is_current(epoch) {
            drop(inner);
            match result {
                Ok(live) => {
                    tracing::warn!(call_id = %live.call.id(), "session ended during handshake, leaving call");
                    live.spawn_teardown();
                }
                Err(e) => tracing::debug!("handshake failed after session ended: {e}"),
            }
            return;
        }

        inner.handshake = None;
        match result {
            Ok(live) => {
                let events = live.call.subscribe();
                let present = live.call.participants();
                inner.attacher.wire(&present);
                inner.pump = Some(spawn_pump(Arc::downgrade(self), epoch, events));
                inner.live = Some(live);

                self.transcript.push_agent(messages::protocol_started(protocol));
                self.speaking.mark(self.config.speaking_timeout);
            }
            Err(e) => {
                tracing::warn!(protocol = %protocol.id, "continuing in demo mode: {e}");
                self.transcript.push_agent(messages::demo_mode(protocol));
            }
        }
    }
}

/// Top-level state machine of a rehab session.
///
/// Must be driven from within a tokio runtime: `start()` spawns the
/// handshake, elapsed ticker and call-event pump, and `end()` spawns the
/// call teardown.
pub struct SessionController {
    shared: Arc<Shared>,
    backend: Arc<dyn AgentBackend>,
    connector: Arc<dyn CallConnector>,
    visualizer: Option<Arc<VisualizationLoop>>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AgentBackend>,
        connector: Arc<dyn CallConnector>,
        playback: Arc<dyn AudioPlayback>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        let inner = Inner {
            phase: SessionPhase::Idle,
            protocol: None,
            stats: StatsAggregator::new(),
            epoch: 0,
            session_id: None,
            live: None,
            attacher: RemoteAudioAttacher::new(playback),
            ticker: None,
            pump: None,
            handshake: None,
            activation: None,
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                phase_tx,
                transcript: Arc::new(TranscriptLog::new()),
                speaking: SpeakingState::new(),
                config,
            }),
            backend,
            connector,
            visualizer: None,
        }
    }

    /// Drive `visualizer` with the session: activated on entering Active,
    /// deactivated on leaving it.
    ///
    /// The loop should be built on [`Self::speaking`] so it follows the agent.
    #[must_use]
    pub fn with_visualizer(mut self, visualizer: Arc<VisualizationLoop>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    /// Open the protocol picker.
    pub fn begin_setup(&self) -> TransitionOutcome {
        let mut inner = self.shared.lock();
        let from = inner.phase;
        let Some(to) = Transition::BeginSetup.target(from) else {
            return ignored(Transition::BeginSetup, from);
        };
        self.shared.set_phase(&mut inner, to);
        TransitionOutcome::Applied { from, to }
    }

    /// Choose the protocol for the next session.
    pub fn select_protocol(&self, protocol: ExerciseProtocol) -> TransitionOutcome {
        let mut inner = self.shared.lock();
        let from = inner.phase;
        let Some(to) = Transition::SelectProtocol.target(from) else {
            return ignored(Transition::SelectProtocol, from);
        };
        tracing::info!(protocol = %protocol.id, "protocol selected");
        inner.protocol = Some(protocol);
        TransitionOutcome::Applied { from, to }
    }

    /// Start a session with the selected protocol.
    ///
    /// The phase becomes Active before the first await. The join handshake
    /// runs as its own task and this future resolves once it has finished;
    /// dropping the future does not cancel it. If any step fails the session
    /// continues in demo mode. `end()` aborts a handshake still in flight.
    /// Ignored without a selected protocol or outside Idle/Setup.
    pub async fn start(&self) -> TransitionOutcome {
        let (from, handshake) = {
            let mut inner = self.shared.lock();
            let from = inner.phase;
            let (Some(to), Some(protocol)) =
                (Transition::Start.target(from), inner.protocol.clone())
            else {
                return ignored(Transition::Start, from);
            };

            inner.epoch += 1;
            let epoch = inner.epoch;
            let session_id = new_session_id();
            inner.session_id = Some(session_id.clone());
            inner.stats.seed(&protocol);
            self.shared.set_phase(&mut inner, to);

            inner.ticker = Some(spawn_ticker(Arc::downgrade(&self.shared), epoch));
            inner.activation = self.visualizer.as_ref().map(|v| v.activate());

            tracing::info!(session_id = %session_id, protocol = %protocol.id, "session starting");
            let handshake = tokio::spawn(run_handshake(
                Arc::clone(&self.shared),
                Arc::clone(&self.backend),
                Arc::clone(&self.connector),
                epoch,
                session_id,
                protocol,
            ));
            inner.handshake = Some(handshake.abort_handle());
            (from, handshake)
        };

        if let Err(e) = handshake.await {
            if e.is_cancelled() {
                tracing::debug!("handshake cancelled");
            } else {
                tracing::error!("handshake task failed: {e}");
            }
        }

        TransitionOutcome::Applied {
            from,
            to: SessionPhase::Active,
        }
    }

    /// End the active session and show its summary.
    ///
    /// Leave and disconnect run in the background; their failures are only
    /// logged. Ignored outside Active.
    pub fn end(&self) -> TransitionOutcome {
        let (outcome, live) = self.finish_session();
        if let Some(live) = live {
            live.spawn_teardown();
        }
        outcome
    }

    /// Like [`Self::end`], but waits up to the request timeout for the call
    /// to be left. Use before shutting the runtime down.
    pub async fn close(&self) -> TransitionOutcome {
        let (outcome, live) = self.finish_session();
        if let Some(live) = live {
            let call_id = live.call.id().to_string();
            let limit = self.shared.config.request_timeout;
            if tokio::time::timeout(limit, live.teardown()).await.is_err() {
                tracing::warn!(call_id = %call_id, "call teardown timed out");
            }
        }
        outcome
    }

    fn finish_session(&self) -> (TransitionOutcome, Option<LiveCall>) {
        let mut inner = self.shared.lock();
        let from = inner.phase;
        let Some(to) = Transition::End.target(from) else {
            return (ignored(Transition::End, from), None);
        };

        let (activation, live) = inner.take_active_resources();
        let snapshot = inner.stats.snapshot();
        self.shared.set_phase(&mut inner, to);
        self.shared
            .transcript
            .push_agent(messages::summary(inner.protocol.as_ref(), &snapshot));
        let session_id = inner.session_id.clone().unwrap_or_default();
        drop(inner);

        self.shared.speaking.clear();
        if let Some(activation) = activation {
            activation.deactivate();
        }

        tracing::info!(
            session_id = %session_id,
            elapsed_seconds = snapshot.elapsed_seconds,
            sets_completed = snapshot.sets_completed,
            "session ended"
        );
        (TransitionOutcome::Applied { from, to }, live)
    }

    /// Clear the summary and return to Idle. Ignored outside Summary.
    ///
    /// The selected protocol is kept so the same exercise can be restarted.
    pub fn reset(&self) -> TransitionOutcome {
        let mut inner = self.shared.lock();
        let from = inner.phase;
        let Some(to) = Transition::Reset.target(from) else {
            return ignored(Transition::Reset, from);
        };
        inner.stats.reset();
        inner.session_id = None;
        self.shared.set_phase(&mut inner, to);
        TransitionOutcome::Applied { from, to }
    }

    /// Apply a biometrics update. Returns false unless Active.
    pub fn record_stats(&self, update: StatsUpdate) -> bool {
        let mut inner = self.shared.lock();
        if inner.phase != SessionPhase::Active {
            return false;
        }
        inner.stats.update(update);
        true
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    /// Receiver that observes every phase change.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.shared.phase_tx.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.shared.lock().stats.snapshot()
    }

    #[must_use]
    pub fn selected_protocol(&self) -> Option<ExerciseProtocol> {
        self.shared.lock().protocol.clone()
    }

    /// Id of the running or last ended session; cleared by `reset()`.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.shared.lock().session_id.clone()
    }

    /// Whether the handshake succeeded and the call is held.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.shared.lock().live.is_some()
    }

    /// Number of remote participants with attached playback.
    #[must_use]
    pub fn attached_participants(&self) -> usize {
        self.shared.lock().attacher.len()
    }

    #[must_use]
    pub fn transcript(&self) -> Arc<TranscriptLog> {
        Arc::clone(&self.shared.transcript)
    }

    /// Handle to the agent speaking flag.
    #[must_use]
    pub fn speaking(&self) -> SpeakingState {
        self.shared.speaking.clone()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let (activation, live) = {
            let mut inner = self.shared.lock();
            inner.epoch += 1;
            inner.take_active_resources()
        };
        drop(activation);
        if let Some(live) = live {
            if tokio::runtime::Handle::try_current().is_ok() {
                live.spawn_teardown();
            } else {
                tracing::warn!(call_id = %live.call.id(), "controller dropped outside a runtime, call not left");
            }
        }
    }
}

fn ignored(transition: Transition, phase: SessionPhase) -> TransitionOutcome {
    tracing::debug!(?transition, %phase, "transition ignored");
    TransitionOutcome::Ignored { phase }
}

async fn run_handshake(
    shared: Arc<Shared>,
    backend: Arc<dyn AgentBackend>,
    connector: Arc<dyn CallConnector>,
    epoch: u64,
    session_id: String,
    protocol: ExerciseProtocol,
) {
    let handshake = Handshake {
        config: &shared.config,
        backend: backend.as_ref(),
        connector: connector.as_ref(),
    };
    let result = handshake.run(&session_id, &protocol).await;
    shared.finish_start(epoch, &protocol, result);
}

fn new_session_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("rehab-{}", &id[..12])
}

fn spawn_ticker(shared: Weak<Shared>, epoch: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + ELAPSED_TICK, ELAPSED_TICK);
        loop {
            interval.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if !shared.tick_elapsed(epoch) {
                break;
            }
        }
        tracing::debug!(epoch, "elapsed ticker stopped");
    })
}

fn spawn_pump(
    shared: Weak<Shared>,
    epoch: u64,
    mut events: broadcast::Receiver<CallEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "call events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if !shared.apply_call_event(epoch, event) {
                break;
            }
        }
        tracing::debug!(epoch, "call event pump stopped");
    })
}
