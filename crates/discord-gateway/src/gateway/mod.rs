//! Gateway WebSocket client for realtime account events.
//!
//! Connects to the gateway, answers HELLO with Identify or Resume, keeps the
//! heartbeat going and decodes the dispatches the notification tracker
//! needs. Unexpected drops resume the session on the URL captured at READY;
//! an invalid session starts over with a fresh Identify.

mod connection;
pub mod protocol;
pub mod session;
#[cfg(test)]
mod tests;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::GatewayError;
use crate::model::{EntityUpdate, MessageAck, MessageCreate, Ready};

pub use session::{GatewaySession, HeartbeatTick, Phase, SessionAction};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A decoded gateway event, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Box<Ready>),
    MessageCreate(MessageCreate),
    MessageAck(MessageAck),
    Update(EntityUpdate),
    /// The server rejected the session; state built from the previous READY
    /// is stale until the next one arrives.
    SessionInvalidated,
}

/// Gateway client configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub gateway_url: String,
    /// Bound on the WebSocket handshake and on the wait for HELLO.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    /// Config for the default gateway endpoint.
    pub fn new(token: String) -> Self {
        Self {
            token,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_gateway_url(mut self, gateway_url: String) -> Self {
        self.gateway_url = gateway_url;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Gateway client with auto-reconnect.
///
/// Events are delivered via `mpsc::Receiver<GatewayEvent>`.
pub struct GatewayClient;

/// How a single connection ended without an error.
enum ConnectOutcome {
    Stopped,
    Resume,
    Fresh,
}

impl GatewayClient {
    /// Start the gateway loop. Returns an event receiver and shutdown sender.
    pub async fn connect(
        config: GatewayConfig,
    ) -> Result<(mpsc::Receiver<GatewayEvent>, mpsc::Sender<()>), GatewayError> {
        let gateway_url = session::gateway_url(&config.gateway_url)?;
        let (event_tx, event_rx) = mpsc::channel::<GatewayEvent>(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let session = GatewaySession::new(config.token, gateway_url);
        tokio::spawn(Self::run_loop(
            session,
            config.connect_timeout,
            event_tx,
            shutdown_rx,
        ));
        Ok((event_rx, shutdown_tx))
    }

    async fn run_loop(
        mut session: GatewaySession,
        connect_timeout: Duration,
        event_tx: mpsc::Sender<GatewayEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut failures: u32 = 0;
        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("Gateway shutdown requested");
                return;
            }
            let result =
                Self::connect_once(&mut session, connect_timeout, &event_tx, &mut shutdown_rx)
                    .await;
            if session.is_synced() {
                failures = 0;
            }
            match result {
                Ok(ConnectOutcome::Stopped) => {
                    tracing::info!("Gateway connection closed cleanly");
                    return;
                }
                Ok(ConnectOutcome::Resume) => {
                    session.on_disconnect();
                    continue;
                }
                Ok(ConnectOutcome::Fresh) => {
                    failures += 1;
                    session.on_disconnect();
                }
                Err(e) => {
                    if e.is_fatal() {
                        tracing::error!(
                            error = %e,
                            "Gateway rejected the account; giving up on this connection"
                        );
                        return;
                    }
                    failures += 1;
                    session.on_disconnect();
                    tracing::warn!(
                        error = %e,
                        attempt = failures,
                        resume = session.is_reconnecting(),
                        "Gateway connection lost, will reconnect"
                    );
                }
            }

            let backoff = Self::backoff_duration(failures);
            if backoff.is_zero() {
                continue;
            }
            tracing::info!(backoff_secs = backoff.as_secs(), "Gateway reconnect delayed");
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Gateway shutdown requested during reconnect backoff");
                    return;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// First retry is immediate; consecutive failures back off exponentially.
    pub(crate) fn backoff_duration(failures: u32) -> Duration {
        if failures <= 1 {
            return Duration::ZERO;
        }
        let d = BASE_BACKOFF * 2u32.saturating_pow(failures.saturating_sub(2));
        d.min(MAX_BACKOFF)
    }
}
