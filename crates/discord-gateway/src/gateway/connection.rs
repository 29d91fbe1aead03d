use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as Msg;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::*;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

impl GatewayClient {
    pub(super) async fn connect_once(
        session: &mut GatewaySession,
        connect_timeout: Duration,
        event_tx: &mpsc::Sender<GatewayEvent>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<ConnectOutcome, GatewayError> {
        let url = session.connect_url().to_string();
        tracing::info!(
            resume = session.is_reconnecting(),
            "Connecting to gateway WebSocket"
        );
        let (mut ws, _) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| GatewayError::Timeout)??;
        session.on_open();

        let hello_deadline = Instant::now() + connect_timeout;
        let mut heartbeat: Option<Interval> = None;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Gateway shutdown during listen");
                    Self::send_stop(&mut ws, session).await;
                    return Ok(ConnectOutcome::Stopped);
                }
                _ = tokio::time::sleep_until(hello_deadline), if heartbeat.is_none() => {
                    tracing::warn!("Gateway HELLO not received in time");
                    return Err(GatewayError::Timeout);
                }
                _ = next_tick(&mut heartbeat) => {
                    match session.heartbeat_tick() {
                        HeartbeatTick::Beat(frame) => {
                            tracing::trace!(seq = ?session.sequence(), "Sending heartbeat");
                            ws.send(Msg::text(frame.encode()?)).await?;
                        }
                        HeartbeatTick::Zombie => {
                            tracing::warn!("Gateway heartbeat not acknowledged, dropping connection");
                            let _ = ws.close(None).await;
                            return Err(GatewayError::HeartbeatTimeout);
                        }
                    }
                }
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Msg::Text(text))) => {
                            for action in session.handle_text(&text)? {
                                match action {
                                    SessionAction::Send(frame) => {
                                        tracing::debug!(op = frame.op(), "Sending gateway frame");
                                        ws.send(Msg::text(frame.encode()?)).await?;
                                    }
                                    SessionAction::StartHeartbeat(period) => {
                                        let mut interval =
                                            tokio::time::interval_at(Instant::now() + period, period);
                                        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                                        heartbeat = Some(interval);
                                    }
                                    SessionAction::Emit(event) => {
                                        if event_tx.send(event).await.is_err() {
                                            tracing::info!("Gateway event receiver dropped, stopping");
                                            Self::send_stop(&mut ws, session).await;
                                            return Ok(ConnectOutcome::Stopped);
                                        }
                                    }
                                    SessionAction::Reconnect => {
                                        let _ = ws.close(None).await;
                                        return Ok(ConnectOutcome::Resume);
                                    }
                                    SessionAction::ReconnectFresh => {
                                        let _ = ws.close(None).await;
                                        return Ok(ConnectOutcome::Fresh);
                                    }
                                }
                            }
                        }
                        Some(Ok(Msg::Ping(data))) => {
                            let _ = ws.send(Msg::Pong(data)).await;
                        }
                        Some(Ok(Msg::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((ABNORMAL_CLOSURE, String::new()));
                            tracing::warn!(code, reason = %reason, "Gateway WebSocket closed by server");
                            return Err(GatewayError::Closed { code, reason });
                        }
                        None => {
                            return Err(GatewayError::Closed {
                                code: ABNORMAL_CLOSURE,
                                reason: "stream ended".into(),
                            });
                        }
                        Some(Err(e)) => return Err(GatewayError::WebSocket(e)),
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    async fn send_stop(ws: &mut Socket, session: &mut GatewaySession) {
        let frame = session.stop();
        match frame.encode() {
            Ok(text) => {
                if let Err(e) = ws.send(Msg::text(text)).await {
                    tracing::debug!(error = %e, "Failed to send stop frame");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Failed to encode stop frame"),
        }
        let _ = ws.close(None).await;
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
