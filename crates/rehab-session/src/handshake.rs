//! Join handshake: credentials, call handle, join, agent activation.

use std::sync::Arc;

use rehab_core::{
    AgentBackend, Call, CallClient, CallConnector, ExerciseProtocol,
    traits::{BackendError, TransportError},
};
use thiserror::Error;

use crate::SessionConfig;

/// Handshake error. Any variant sends the session into demo mode.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Credential request failed: {0}")]
    Credentials(#[source] BackendError),
    #[error("Transport connect failed: {0}")]
    Connect(#[source] TransportError),
    #[error("Call join failed: {0}")]
    Join(#[source] TransportError),
    #[error("Agent activation failed: {0}")]
    AgentActivation(#[source] BackendError),
}

/// A joined call and the client that owns it.
#[derive(Clone)]
pub struct LiveCall {
    pub client: Arc<dyn CallClient>,
    pub call: Arc<dyn Call>,
}

impl LiveCall {
    /// Leave the call, then disconnect the client. Failures are logged only.
    pub async fn teardown(self) {
        let call_id = self.call.id().to_string();
        match self.call.leave().await {
            Ok(()) => tracing::debug!(call_id = %call_id, "left call"),
            Err(e) => tracing::warn!(call_id = %call_id, "leave failed: {e}"),
        }
        disconnect(&self.client, &call_id).await;
    }

    /// Run [`Self::teardown`] in the background.
    pub fn spawn_teardown(self) {
        tokio::spawn(self.teardown());
    }
}

async fn disconnect(client: &Arc<dyn CallClient>, call_id: &str) {
    match client.disconnect().await {
        Ok(()) => tracing::debug!(call_id = %call_id, "client disconnected"),
        Err(e) => tracing::warn!(call_id = %call_id, "disconnect failed: {e}"),
    }
}

/// Tears the call down if the handshake is dropped before it finishes.
struct AbandonGuard(Option<LiveCall>);

impl AbandonGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(live) = self.0.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            tracing::warn!(call_id = %live.call.id(), "handshake abandoned, leaving call");
            live.spawn_teardown();
        } else {
            tracing::warn!(call_id = %live.call.id(), "handshake abandoned outside a runtime, call not left");
        }
    }
}

pub struct Handshake<'a> {
    pub config: &'a SessionConfig,
    pub backend: &'a dyn AgentBackend,
    pub connector: &'a dyn CallConnector,
}

impl Handshake<'_> {
    /// Run the four steps in order. Anything opened before a failing step
    /// is torn down before returning; if the future is dropped once the
    /// call exists, the call is left in the background.
    pub async fn run(
        &self,
        session_id: &str,
        protocol: &ExerciseProtocol,
    ) -> Result<LiveCall, HandshakeError> {
        let user_id = &self.config.local_user_id;
        let credentials = self
            .backend
            .fetch_token(user_id)
            .await
            .map_err(HandshakeError::Credentials)?;

        let client = self
            .connector
            .connect(&credentials, user_id)
            .map_err(HandshakeError::Connect)?;

        let call = client.call(&self.config.call_type, session_id);
        let live = LiveCall { client, call };
        let mut guard = AbandonGuard(Some(live.clone()));
        if let Err(e) = live.call.join().await {
            guard.disarm();
            disconnect(&live.client, session_id).await;
            return Err(HandshakeError::Join(e));
        }

        let activation = self.backend.start_agent(live.call.id(), &protocol.id).await;
        guard.disarm();
        if let Err(e) = activation {
            live.teardown().await;
            return Err(HandshakeError::AgentActivation(e));
        }

        tracing::info!(session_id, protocol = %protocol.id, "call joined, agent requested");
        Ok(live)
    }
}
