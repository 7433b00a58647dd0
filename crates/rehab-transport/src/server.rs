//! Development backend serving `/health`, `/token` and `/start-agent`.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    launcher::{AgentLaunch, AgentLauncher, CommandLauncher, DisabledLauncher},
    protocol::{
        AGENT_LAUNCHING, EnvStatus, ErrorResponse, HealthResponse, StartAgentRequest,
        StartAgentResponse, TokenQuery, TokenResponse,
    },
    token::{JwtIssuer, ProviderKeys, TokenIssuer},
};

pub const ENV_BIND: &str = "REHAB_BIND";
pub const ENV_AGENT_COMMAND: &str = "REHAB_AGENT_COMMAND";
pub const ENV_STREAM_API_KEY: &str = "STREAM_API_KEY";
pub const ENV_STREAM_API_SECRET: &str = "STREAM_API_SECRET";

/// User id of the coaching agent.
pub const AGENT_USER_ID: &str = "rehab-ai-agent";
/// Call type the agent joins.
pub const AGENT_CALL_TYPE: &str = "default";
/// Variables reported by `/health`.
pub const HEALTH_KEYS: [&str; 6] = [
    ENV_STREAM_API_KEY,
    ENV_STREAM_API_SECRET,
    "GOOGLE_API_KEY",
    "ELEVENLABS_API_KEY",
    "DEEPGRAM_API_KEY",
    "ANTHROPIC_API_KEY",
];

/// Server error.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("STREAM keys missing")]
    MissingKeys,
    #[error("Stream setup failed: {0}")]
    Token(String),
    #[error("Invalid value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
    #[error("Bind failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("Server failed: {0}")]
    Serve(#[source] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::warn!("request failed: {self}");
        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Backend process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Shell-style agent command line; no agent is launched when unset.
    pub agent_command: Option<String>,
    /// Grace period before the agent is launched.
    pub launch_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            agent_command: None,
            launch_delay: Duration::from_secs(4),
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns error if the bind address is malformed.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`.
    ///
    /// # Errors
    /// Returns error if the bind address is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            config.bind = bind.trim().parse().map_err(|_| ServerError::Config {
                key: ENV_BIND,
                value: bind.clone(),
            })?;
        }
        config.agent_command = lookup(ENV_AGENT_COMMAND).filter(|v| !v.trim().is_empty());
        Ok(config)
    }

    /// Launcher for the configured agent command.
    #[must_use]
    pub fn launcher(&self) -> Arc<dyn AgentLauncher> {
        let Some(line) = &self.agent_command else {
            return Arc::new(DisabledLauncher);
        };
        match CommandLauncher::from_command_line(line, self.launch_delay) {
            Some(launcher) => Arc::new(launcher),
            None => {
                tracing::warn!(command = %line, "unusable agent command, agent launch disabled");
                Arc::new(DisabledLauncher)
            }
        }
    }
}

/// A user known to the call provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredUser {
    pub id: String,
    pub name: String,
    pub role: String,
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Shared state of the backend router.
pub struct ServerState {
    env: EnvLookup,
    issuer: Arc<dyn TokenIssuer>,
    launcher: Arc<dyn AgentLauncher>,
    agent_user_id: String,
    users: Mutex<BTreeMap<String, RegisteredUser>>,
}

impl ServerState {
    /// State reading the process environment and issuing JWTs.
    #[must_use]
    pub fn new(launcher: Arc<dyn AgentLauncher>) -> Self {
        Self {
            env: Arc::new(|key| std::env::var(key).ok()),
            issuer: Arc::new(JwtIssuer),
            launcher,
            agent_user_id: AGENT_USER_ID.to_string(),
            users: Mutex::new(BTreeMap::new()),
        }
    }

    /// Read provider keys and health variables through `lookup` instead.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Users registered so far, ordered by id.
    #[must_use]
    pub fn users(&self) -> Vec<RegisteredUser> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.is_empty())
    }

    fn provider_keys(&self) -> Result<ProviderKeys, ServerError> {
        match (self.var(ENV_STREAM_API_KEY), self.var(ENV_STREAM_API_SECRET)) {
            (Some(api_key), Some(api_secret)) => Ok(ProviderKeys {
                api_key,
                api_secret,
            }),
            _ => Err(ServerError::MissingKeys),
        }
    }

    fn register(&self, id: &str, name: &str, role: &str) {
        let user = RegisteredUser {
            id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
        };
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id.clone(), user);
    }

    fn register_agent(&self) {
        self.register(&self.agent_user_id, "REHAB AI", "admin");
    }
}

/// Build the backend router with permissive CORS and request tracing.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/token", get(token))
        .route("/start-agent", post(start_agent))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind `config.bind` and serve until the process stops.
///
/// # Errors
/// Returns error if binding or serving fails.
pub async fn serve(config: &ServerConfig, state: Arc<ServerState>) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(ServerError::Bind)?;
    tracing::info!("listening on http://{}", config.bind);
    axum::serve(listener, router(state))
        .await
        .map_err(ServerError::Serve)
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let env = HEALTH_KEYS
        .iter()
        .map(|key| {
            let status = if state.var(key).is_some() {
                EnvStatus::Set
            } else {
                EnvStatus::Missing
            };
            ((*key).to_string(), status)
        })
        .collect();
    Json(HealthResponse {
        status: "ok".to_string(),
        env,
    })
}

async fn token(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ServerError> {
    let keys = state.provider_keys()?;
    state.register(&query.user_id, "Patient", "user");
    state.register_agent();

    let token = state.issuer.issue(&keys, &query.user_id)?;
    tracing::info!(user_id = %query.user_id, "token issued");
    Ok(Json(TokenResponse {
        token,
        api_key: keys.api_key,
    }))
}

async fn start_agent(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<StartAgentRequest>,
) -> Result<Json<StartAgentResponse>, ServerError> {
    let keys = state.provider_keys()?;
    state.register_agent();
    let agent_token = state.issuer.issue(&keys, &state.agent_user_id)?;

    tracing::info!(call_id = %req.call_id, exercise = %req.exercise, "starting agent");
    state.launcher.launch(AgentLaunch {
        call_id: req.call_id.clone(),
        call_type: AGENT_CALL_TYPE.to_string(),
        exercise: req.exercise,
        agent_token,
        agent_user_id: state.agent_user_id.clone(),
    });

    Ok(Json(StartAgentResponse {
        status: AGENT_LAUNCHING.to_string(),
        call_id: req.call_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.launch_delay, Duration::from_secs(4));
    }

    #[test]
    fn test_config_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            ENV_BIND => Some("127.0.0.1:9100".into()),
            ENV_AGENT_COMMAND => Some("python3 rehab_agent.py".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 9100)));
        assert_eq!(config.agent_command.as_deref(), Some("python3 rehab_agent.py"));
    }

    #[test]
    fn test_config_rejects_bad_bind() {
        let err = ServerConfig::from_lookup(|key| (key == ENV_BIND).then(|| "localhost".into()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config { key: ENV_BIND, .. }));
    }
}
