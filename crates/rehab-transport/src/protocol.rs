//! HTTP contract between the session client and the coaching backend.

use std::collections::BTreeMap;

use rehab_core::traits::ChannelCredentials;
use serde::{Deserialize, Serialize};

/// Identity the backend issues tokens for when none is given.
pub const DEFAULT_USER_ID: &str = "patient-001";
/// Exercise sent to the agent when none is given.
pub const DEFAULT_EXERCISE: &str = "general";
/// Status reported by `/start-agent` once a launch is scheduled.
pub const AGENT_LAUNCHING: &str = "agent_launching";

/// Query of `GET /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenQuery {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Body of a successful `GET /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub api_key: String,
}

impl From<TokenResponse> for ChannelCredentials {
    fn from(res: TokenResponse) -> Self {
        Self {
            token: res.token,
            api_key: res.api_key,
        }
    }
}

/// Body of `POST /start-agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAgentRequest {
    pub call_id: String,
    #[serde(default = "default_exercise")]
    pub exercise: String,
}

fn default_exercise() -> String {
    DEFAULT_EXERCISE.to_string()
}

/// Body of a successful `POST /start-agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAgentResponse {
    pub status: String,
    pub call_id: String,
}

/// Whether a backend environment variable is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvStatus {
    Set,
    Missing,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub env: BTreeMap<String, EnvStatus>,
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled_in() {
        let req: StartAgentRequest = serde_json::from_str(r#"{"call_id":"rehab-1"}"#).unwrap();
        assert_eq!(req.exercise, "general");

        let query: TokenQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.user_id, "patient-001");
    }

    #[test]
    fn test_health_wire_format() {
        let health = HealthResponse {
            status: "ok".into(),
            env: BTreeMap::from([
                ("STREAM_API_KEY".to_string(), EnvStatus::Set),
                ("GOOGLE_API_KEY".to_string(), EnvStatus::Missing),
            ]),
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["env"]["STREAM_API_KEY"], "SET");
        assert_eq!(json["env"]["GOOGLE_API_KEY"], "MISSING");
    }

    #[test]
    fn test_token_response_into_credentials() {
        let creds: ChannelCredentials = TokenResponse {
            token: "t".into(),
            api_key: "k".into(),
        }
        .into();
        assert_eq!(creds.token, "t");
        assert_eq!(creds.api_key, "k");
    }
}
