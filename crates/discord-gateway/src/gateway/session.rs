//! Protocol bookkeeping for one gateway session, independent of the socket.
//!
//! The connection task feeds inbound text frames and heartbeat ticks in and
//! executes the returned [`SessionAction`]s.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use super::protocol::*;
use super::GatewayEvent;
use crate::model::EntityUpdate;
use crate::GatewayError;

const API_VERSION: &str = "9";
const ENCODING: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    AwaitingHello,
    Established,
    Closed,
}

#[derive(Debug)]
pub enum SessionAction {
    Send(OutboundFrame),
    StartHeartbeat(Duration),
    Emit(GatewayEvent),
    /// Drop the socket and resume the current session.
    Reconnect,
    /// Drop the socket and identify from scratch on the default endpoint.
    ReconnectFresh,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HeartbeatTick {
    Beat(OutboundFrame),
    /// The previous heartbeat was never acknowledged.
    Zombie,
}

/// Add the version and encoding query parameters to a gateway URL.
pub fn gateway_url(base: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "v" && k != "encoding")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("v", API_VERSION)
        .append_pair("encoding", ENCODING);
    Ok(url.into())
}

pub struct GatewaySession {
    token: String,
    default_url: String,
    sequence: Option<u64>,
    session_id: Option<String>,
    resume_url: Option<String>,
    heartbeat_interval: Option<Duration>,
    awaiting_ack: bool,
    reconnecting: bool,
    stopped: bool,
    synced: bool,
    phase: Phase,
}

impl GatewaySession {
    pub fn new(token: String, default_url: String) -> Self {
        Self {
            token,
            default_url,
            sequence: None,
            session_id: None,
            resume_url: None,
            heartbeat_interval: None,
            awaiting_ack: false,
            reconnecting: false,
            stopped: false,
            synced: false,
            phase: Phase::Connecting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    /// Whether the current connection reached READY or RESUMED.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// URL for the next connection attempt.
    pub fn connect_url(&self) -> &str {
        match (&self.resume_url, self.reconnecting) {
            (Some(url), true) => url,
            _ => &self.default_url,
        }
    }

    /// The socket opened; the server speaks first with HELLO.
    pub fn on_open(&mut self) {
        self.phase = Phase::AwaitingHello;
        self.heartbeat_interval = None;
        self.awaiting_ack = false;
        self.synced = false;
    }

    /// The socket went away without an explicit stop. The next attempt
    /// resumes if a session was ever established.
    pub fn on_disconnect(&mut self) {
        self.phase = Phase::Closed;
        self.heartbeat_interval = None;
        self.awaiting_ack = false;
        self.reconnecting = !self.stopped && self.session_id.is_some();
    }

    /// Explicit stop: no reconnect follows.
    pub fn stop(&mut self) -> OutboundFrame {
        self.stopped = true;
        self.reconnecting = false;
        self.phase = Phase::Closed;
        self.heartbeat_interval = None;
        OutboundFrame::Stop
    }

    fn forget_session(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.sequence = None;
        self.reconnecting = false;
    }

    pub fn heartbeat_tick(&mut self) -> HeartbeatTick {
        if self.awaiting_ack {
            return HeartbeatTick::Zombie;
        }
        self.awaiting_ack = true;
        HeartbeatTick::Beat(OutboundFrame::Heartbeat { seq: self.sequence })
    }

    pub fn handle_text(&mut self, text: &str) -> Result<Vec<SessionAction>, GatewayError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        match frame.op {
            OP_HELLO => self.on_hello(frame.d),
            OP_HEARTBEAT_ACK => {
                self.awaiting_ack = false;
                tracing::trace!("Gateway heartbeat acknowledged");
                Ok(vec![])
            }
            OP_HEARTBEAT => Ok(vec![SessionAction::Send(OutboundFrame::Heartbeat {
                seq: self.sequence,
            })]),
            OP_RECONNECT => {
                tracing::info!("Gateway requested reconnect");
                Ok(vec![SessionAction::Reconnect])
            }
            OP_INVALID_SESSION => {
                tracing::warn!(
                    reconnecting = self.reconnecting,
                    "Gateway session invalidated, identifying from scratch"
                );
                self.forget_session();
                Ok(vec![
                    SessionAction::Emit(GatewayEvent::SessionInvalidated),
                    SessionAction::ReconnectFresh,
                ])
            }
            OP_DISPATCH => {
                if let Some(s) = frame.s {
                    self.sequence = Some(self.sequence.map_or(s, |prev| prev.max(s)));
                }
                let Some(event_type) = frame.t else {
                    return Err(GatewayError::Protocol("dispatch frame without event type".into()));
                };
                Ok(self.on_dispatch(&event_type, frame.d))
            }
            other => {
                tracing::debug!(op = other, "Unhandled gateway opcode");
                Ok(vec![])
            }
        }
    }

    fn on_hello(&mut self, d: serde_json::Value) -> Result<Vec<SessionAction>, GatewayError> {
        if self.phase != Phase::AwaitingHello {
            tracing::debug!(phase = ?self.phase, "Ignoring repeated HELLO");
            return Ok(vec![]);
        }
        let hello: HelloPayload = serde_json::from_value(d)?;
        let interval = Duration::from_millis(hello.heartbeat_interval);
        self.heartbeat_interval = Some(interval);

        let handshake = match (&self.session_id, self.reconnecting) {
            (Some(session_id), true) => OutboundFrame::Resume {
                token: self.token.clone(),
                session_id: session_id.clone(),
                seq: self.sequence,
            },
            _ => OutboundFrame::Identify {
                token: self.token.clone(),
            },
        };
        tracing::debug!(
            heartbeat_ms = hello.heartbeat_interval,
            handshake = ?handshake,
            "Gateway HELLO"
        );
        // Dispatches may arrive right after the handshake is written.
        self.phase = Phase::Established;
        Ok(vec![
            SessionAction::StartHeartbeat(interval),
            SessionAction::Send(handshake),
        ])
    }

    fn on_dispatch(&mut self, event_type: &str, d: serde_json::Value) -> Vec<SessionAction> {
        let event = match event_type {
            EVENT_READY => decode(event_type, d).map(|ready: crate::model::Ready| {
                self.capture_ready(&ready);
                GatewayEvent::Ready(Box::new(ready))
            }),
            EVENT_RESUMED => {
                tracing::info!(seq = ?self.sequence, "Gateway session resumed");
                self.reconnecting = false;
                self.synced = true;
                return vec![];
            }
            EVENT_MESSAGE_CREATE => decode(event_type, d).map(GatewayEvent::MessageCreate),
            EVENT_MESSAGE_ACK => decode(event_type, d).map(GatewayEvent::MessageAck),
            EVENT_USER_GUILD_SETTINGS_UPDATE => decode(event_type, d)
                .map(|s| GatewayEvent::Update(EntityUpdate::GuildSettings(s))),
            EVENT_GUILD_DELETE => {
                decode(event_type, d).map(|g| GatewayEvent::Update(EntityUpdate::GuildDelete(g)))
            }
            EVENT_CHANNEL_DELETE => decode(event_type, d)
                .map(|c| GatewayEvent::Update(EntityUpdate::ChannelDelete(c))),
            EVENT_GUILD_MEMBER_UPDATE => decode(event_type, d)
                .map(|m| GatewayEvent::Update(EntityUpdate::GuildMemberUpdate(m))),
            other => {
                tracing::trace!(event_type = other, "Ignoring gateway dispatch");
                None
            }
        };
        event.map(SessionAction::Emit).into_iter().collect()
    }

    fn capture_ready(&mut self, ready: &crate::model::Ready) {
        self.session_id = Some(ready.session_id.clone());
        self.resume_url = ready
            .resume_gateway_url
            .as_deref()
            .and_then(|url| match gateway_url(url) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Unusable resume URL, resuming on default endpoint");
                    None
                }
            });
        self.reconnecting = false;
        self.synced = true;
        tracing::info!(
            session_id = %ready.session_id,
            user_id = %ready.user.id,
            "Gateway READY"
        );
    }
}

/// Malformed payloads of known dispatches are skipped, not fatal.
fn decode<T: DeserializeOwned>(event_type: &str, d: serde_json::Value) -> Option<T> {
    match serde_json::from_value(d) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(event_type, error = %e, "Skipping malformed dispatch payload");
            None
        }
    }
}
