//! In-memory fakes of the backend, call transport and playback.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use rehab_core::{
    AgentBackend, AudioPlayback, Call, CallClient, CallConnector, ExerciseProtocol,
    catalog,
    traits::{
        AudioTrack, BackendError, CallEvent, ChannelCredentials, PlaybackError, PlaybackHandle,
        RemoteParticipant, TransportError,
    },
};
use rehab_session::{SessionConfig, SessionController};
use tokio::sync::{Notify, broadcast};

#[derive(Default)]
pub struct FakeBackend {
    pub fail_token: bool,
    pub fail_agent: bool,
    /// When set, `fetch_token` waits for a permit before answering.
    pub token_gate: Option<Arc<Notify>>,
    /// When set, `start_agent` waits for a permit before answering.
    pub agent_gate: Option<Arc<Notify>>,
    pub token_requests: Mutex<Vec<String>>,
    pub agent_requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AgentBackend for FakeBackend {
    async fn fetch_token(&self, user_id: &str) -> Result<ChannelCredentials, BackendError> {
        self.token_requests.lock().unwrap().push(user_id.to_string());
        if let Some(gate) = &self.token_gate {
            gate.notified().await;
        }
        if self.fail_token {
            return Err(BackendError::Status {
                status: 500,
                body: "STREAM keys missing".into(),
            });
        }
        Ok(ChannelCredentials {
            token: format!("token-{user_id}"),
            api_key: "test-key".into(),
        })
    }

    async fn start_agent(&self, call_id: &str, exercise: &str) -> Result<(), BackendError> {
        self.agent_requests
            .lock()
            .unwrap()
            .push((call_id.to_string(), exercise.to_string()));
        if let Some(gate) = &self.agent_gate {
            gate.notified().await;
        }
        if self.fail_agent {
            return Err(BackendError::Request("connection refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TransportState {
    pub fail_connect: bool,
    pub fail_join: bool,
    pub fail_leave: bool,
    pub fail_disconnect: bool,
    /// Participants already in every call at join time.
    pub roster: Vec<RemoteParticipant>,
    pub calls: Mutex<Vec<Arc<FakeCall>>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl TransportState {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Arc<FakeCall> {
        Arc::clone(self.calls.lock().unwrap().last().expect("no call created"))
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub struct FakeConnector(pub Arc<TransportState>);

impl CallConnector for FakeConnector {
    fn connect(
        &self,
        _credentials: &ChannelCredentials,
        _user_id: &str,
    ) -> Result<Arc<dyn CallClient>, TransportError> {
        if self.0.fail_connect {
            return Err(TransportError::Connect("credentials rejected".into()));
        }
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeClient(Arc::clone(&self.0))))
    }
}

struct FakeClient(Arc<TransportState>);

#[async_trait]
impl CallClient for FakeClient {
    fn call(&self, call_type: &str, call_id: &str) -> Arc<dyn Call> {
        let (events, _) = broadcast::channel(16);
        let call = Arc::new(FakeCall {
            id: call_id.to_string(),
            call_type: call_type.to_string(),
            fail_join: self.0.fail_join,
            fail_leave: self.0.fail_leave,
            roster: self.0.roster.clone(),
            events,
            joins: AtomicUsize::new(0),
            leaves: AtomicUsize::new(0),
        });
        self.0.calls.lock().unwrap().push(Arc::clone(&call));
        call
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.0.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_disconnect {
            return Err(TransportError::Disconnect("socket closed".into()));
        }
        Ok(())
    }
}

pub struct FakeCall {
    pub id: String,
    pub call_type: String,
    fail_join: bool,
    fail_leave: bool,
    roster: Vec<RemoteParticipant>,
    events: broadcast::Sender<CallEvent>,
    pub joins: AtomicUsize,
    pub leaves: AtomicUsize,
}

impl FakeCall {
    pub fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }

    pub fn leaves(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Call for FakeCall {
    fn id(&self) -> &str {
        &self.id
    }

    async fn join(&self) -> Result<(), TransportError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if self.fail_join {
            return Err(TransportError::Join("permission denied".into()));
        }
        Ok(())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        if self.fail_leave {
            return Err(TransportError::Leave("already left".into()));
        }
        Ok(())
    }

    fn participants(&self) -> Vec<RemoteParticipant> {
        self.roster.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct FakePlayback {
    pub attaches: Mutex<Vec<String>>,
    pub live: Arc<AtomicUsize>,
}

impl FakePlayback {
    pub fn attached_ids(&self) -> Vec<String> {
        self.attaches.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    track_id: String,
    live: Arc<AtomicUsize>,
}

impl PlaybackHandle for FakeHandle {
    fn track_id(&self) -> &str {
        &self.track_id
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioPlayback for FakePlayback {
    fn attach(
        &self,
        participant: &RemoteParticipant,
        track: &AudioTrack,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        self.attaches
            .lock()
            .unwrap()
            .push(participant.session_id.clone());
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            track_id: track.track_id.clone(),
            live: Arc::clone(&self.live),
        }))
    }
}

pub struct Harness {
    pub controller: Arc<SessionController>,
    pub backend: Arc<FakeBackend>,
    pub transport: Arc<TransportState>,
    pub playback: Arc<FakePlayback>,
}

impl Harness {
    pub fn new(backend: FakeBackend, transport: TransportState) -> Self {
        Self::build(backend, transport, |c| c)
    }

    pub fn build(
        backend: FakeBackend,
        transport: TransportState,
        configure: impl FnOnce(SessionController) -> SessionController,
    ) -> Self {
        let backend = Arc::new(backend);
        let transport = Arc::new(transport);
        let playback = Arc::new(FakePlayback::default());
        let controller = SessionController::new(
            SessionConfig::default(),
            Arc::clone(&backend) as Arc<dyn AgentBackend>,
            Arc::new(FakeConnector(Arc::clone(&transport))),
            Arc::clone(&playback) as Arc<dyn AudioPlayback>,
        );
        Self {
            controller: Arc::new(configure(controller)),
            backend,
            transport,
            playback,
        }
    }
}

pub fn knee_bend() -> ExerciseProtocol {
    catalog::find("knee_bend").cloned().expect("knee_bend in catalog")
}

pub fn participant(session_id: &str, user_id: &str, audio: bool) -> RemoteParticipant {
    RemoteParticipant {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        name: None,
        audio: audio.then(|| AudioTrack {
            track_id: format!("{session_id}-audio"),
        }),
    }
}

pub fn agent() -> RemoteParticipant {
    participant("agent-session", "rehab-ai-agent", true)
}
