//! Wire frames: opcodes, the inbound envelope and the outbound requests.

use serde::{Deserialize, Serialize};

pub const OP_DISPATCH: u16 = 0;
pub const OP_HEARTBEAT: u16 = 1;
pub const OP_IDENTIFY: u16 = 2;
pub const OP_RESUME: u16 = 6;
pub const OP_RECONNECT: u16 = 7;
pub const OP_INVALID_SESSION: u16 = 9;
pub const OP_HELLO: u16 = 10;
pub const OP_HEARTBEAT_ACK: u16 = 11;
/// Sent as a text frame on explicit stop, ahead of the WebSocket close.
pub const OP_STOP: u16 = 1000;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES
pub const INTENTS: u64 = 4609;

pub const EVENT_READY: &str = "READY";
pub const EVENT_RESUMED: &str = "RESUMED";
pub const EVENT_MESSAGE_CREATE: &str = "MESSAGE_CREATE";
pub const EVENT_MESSAGE_ACK: &str = "MESSAGE_ACK";
pub const EVENT_USER_GUILD_SETTINGS_UPDATE: &str = "USER_GUILD_SETTINGS_UPDATE";
pub const EVENT_GUILD_DELETE: &str = "GUILD_DELETE";
pub const EVENT_CHANNEL_DELETE: &str = "CHANNEL_DELETE";
pub const EVENT_GUILD_MEMBER_UPDATE: &str = "GUILD_MEMBER_UPDATE";

/// Every inbound frame: `{ op, d, s, t }`.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundFrame {
    pub op: u16,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// A frame the client sends.
#[derive(Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Heartbeat {
        seq: Option<u64>,
    },
    Identify {
        token: String,
    },
    Resume {
        token: String,
        session_id: String,
        seq: Option<u64>,
    },
    Stop,
}

// Tokens never reach the logs.
impl std::fmt::Debug for OutboundFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundFrame::Heartbeat { seq } => f.debug_struct("Heartbeat").field("seq", seq).finish(),
            OutboundFrame::Identify { .. } => f.write_str("Identify"),
            OutboundFrame::Resume { session_id, seq, .. } => f
                .debug_struct("Resume")
                .field("session_id", session_id)
                .field("seq", seq)
                .finish(),
            OutboundFrame::Stop => f.write_str("Stop"),
        }
    }
}

#[derive(Serialize)]
struct Frame<D> {
    op: u16,
    d: D,
}

#[derive(Serialize)]
struct OpOnly {
    op: u16,
}

#[derive(Serialize)]
struct IdentifyData<'a> {
    token: &'a str,
    intents: u64,
    properties: IdentifyProperties,
}

#[derive(Serialize)]
struct IdentifyProperties {
    #[serde(rename = "$os")]
    os: &'static str,
    #[serde(rename = "$browser")]
    browser: &'static str,
    #[serde(rename = "$device")]
    device: &'static str,
}

#[derive(Serialize)]
struct ResumeData<'a> {
    token: &'a str,
    session_id: &'a str,
    seq: Option<u64>,
}

impl OutboundFrame {
    pub fn op(&self) -> u16 {
        match self {
            OutboundFrame::Heartbeat { .. } => OP_HEARTBEAT,
            OutboundFrame::Identify { .. } => OP_IDENTIFY,
            OutboundFrame::Resume { .. } => OP_RESUME,
            OutboundFrame::Stop => OP_STOP,
        }
    }

    /// Serialize to the JSON text frame sent over the socket.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            OutboundFrame::Heartbeat { seq } => serde_json::to_string(&Frame {
                op: OP_HEARTBEAT,
                d: seq,
            }),
            OutboundFrame::Identify { token } => serde_json::to_string(&Frame {
                op: OP_IDENTIFY,
                d: IdentifyData {
                    token,
                    intents: INTENTS,
                    properties: IdentifyProperties {
                        os: "windows",
                        browser: "chrome",
                        device: "desktop",
                    },
                },
            }),
            OutboundFrame::Resume {
                token,
                session_id,
                seq,
            } => serde_json::to_string(&Frame {
                op: OP_RESUME,
                d: ResumeData {
                    token,
                    session_id,
                    seq: *seq,
                },
            }),
            OutboundFrame::Stop => serde_json::to_string(&OpOnly { op: OP_STOP }),
        }
    }
}
