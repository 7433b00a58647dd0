//! Transports for rehab coaching sessions.
//!
//! Provides:
//! - HTTP contract types shared by client and backend
//! - `HttpBackend` - `AgentBackend` over HTTP (feature: http)
//! - Development backend router and agent launcher (feature: server)
//! - Terminal radial renderer and key bindings (feature: tui)

pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "server")]
pub mod launcher;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod token;

#[cfg(feature = "tui")]
pub mod tui;

pub use protocol::{
    EnvStatus, ErrorResponse, HealthResponse, StartAgentRequest, StartAgentResponse, TokenResponse,
};

#[cfg(feature = "http")]
pub use http::HttpBackend;
