//! Discord gateway client library.
//!
//! Provides the realtime WebSocket client (heartbeat, identify/resume,
//! reconnection), the typed payload model for the dispatch events the
//! notification tracker consumes, and snowflake id handling.

pub mod gateway;
pub mod model;
pub mod snowflake;

pub use gateway::{GatewayClient, GatewayConfig, GatewayEvent};
pub use snowflake::Snowflake;

/// Unified error type for the discord-gateway crate.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Gateway closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("Heartbeat was not acknowledged before the next tick")]
    HeartbeatTimeout,

    #[error("Connection timeout")]
    Timeout,

    #[error("Gateway protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Close codes after which retrying with the same token cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Closed {
                code: 4004 | 4010..=4014,
                ..
            }
        )
    }
}
