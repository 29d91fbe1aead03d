use std::time::Duration;

use serde_json::json;

use super::protocol::OutboundFrame;
use super::*;
use crate::Snowflake;

const TOKEN: &str = "token-abc";

fn new_session() -> GatewaySession {
    GatewaySession::new(TOKEN.into(), DEFAULT_GATEWAY_URL.into())
}

fn hello(session: &mut GatewaySession, interval_ms: u64) -> Vec<SessionAction> {
    session
        .handle_text(&json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}).to_string())
        .unwrap()
}

fn ready_frame(seq: u64, session_id: &str) -> String {
    json!({
        "op": 0,
        "s": seq,
        "t": "READY",
        "d": {
            "user": {"id": "100"},
            "session_id": session_id,
            "resume_gateway_url": "wss://gateway-us-east1-b.discord.gg",
            "guilds": [],
            "read_state": [],
            "user_guild_settings": [],
            "notification_settings": {"flags": 0}
        }
    })
    .to_string()
}

fn sent_frames(actions: &[SessionAction]) -> Vec<&OutboundFrame> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::Send(frame) => Some(frame),
            _ => None,
        })
        .collect()
}

#[test]
fn test_outbound_frames_match_wire_format() {
    assert_eq!(
        OutboundFrame::Heartbeat { seq: None }.encode().unwrap(),
        r#"{"op":1,"d":null}"#
    );
    assert_eq!(
        OutboundFrame::Heartbeat { seq: Some(42) }.encode().unwrap(),
        r#"{"op":1,"d":42}"#
    );
    assert_eq!(
        OutboundFrame::Identify { token: "tok".into() }.encode().unwrap(),
        r#"{"op":2,"d":{"token":"tok","intents":4609,"properties":{"$os":"windows","$browser":"chrome","$device":"desktop"}}}"#
    );
    assert_eq!(
        OutboundFrame::Resume {
            token: "tok".into(),
            session_id: "sess".into(),
            seq: Some(7),
        }
        .encode()
        .unwrap(),
        r#"{"op":6,"d":{"token":"tok","session_id":"sess","seq":7}}"#
    );
    assert_eq!(OutboundFrame::Stop.encode().unwrap(), r#"{"op":1000}"#);
}

#[test]
fn test_debug_output_hides_token() {
    let frame = OutboundFrame::Identify { token: TOKEN.into() };
    assert!(!format!("{frame:?}").contains(TOKEN));
}

#[test]
fn test_hello_starts_heartbeat_and_identifies() {
    let mut session = new_session();
    session.on_open();
    assert_eq!(session.phase(), Phase::AwaitingHello);

    let actions = hello(&mut session, 41250);
    assert!(matches!(
        actions[0],
        SessionAction::StartHeartbeat(d) if d == Duration::from_millis(41250)
    ));
    assert_eq!(
        sent_frames(&actions),
        vec![&OutboundFrame::Identify { token: TOKEN.into() }]
    );
    assert_eq!(session.phase(), Phase::Established);
    assert_eq!(session.heartbeat_interval(), Some(Duration::from_millis(41250)));
}

#[test]
fn test_missing_ack_is_detected_on_next_tick() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);

    assert_eq!(
        session.heartbeat_tick(),
        HeartbeatTick::Beat(OutboundFrame::Heartbeat { seq: None })
    );
    assert_eq!(session.heartbeat_tick(), HeartbeatTick::Zombie);
}

#[test]
fn test_ack_allows_next_heartbeat() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.handle_text(&ready_frame(3, "sess-1")).unwrap();

    assert!(matches!(session.heartbeat_tick(), HeartbeatTick::Beat(_)));
    session.handle_text(r#"{"op":11}"#).unwrap();
    assert_eq!(
        session.heartbeat_tick(),
        HeartbeatTick::Beat(OutboundFrame::Heartbeat { seq: Some(3) })
    );
}

#[test]
fn test_server_heartbeat_request_is_answered() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    let actions = session.handle_text(r#"{"op":1,"d":null}"#).unwrap();
    assert_eq!(
        sent_frames(&actions),
        vec![&OutboundFrame::Heartbeat { seq: None }]
    );
}

#[test]
fn test_unexpected_close_resumes_with_ready_session() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.handle_text(&ready_frame(1, "sess-1")).unwrap();
    session
        .handle_text(r#"{"op":0,"s":5,"t":"TYPING_START","d":{}}"#)
        .unwrap();
    assert_eq!(session.sequence(), Some(5));

    session.on_disconnect();
    assert!(session.is_reconnecting());
    assert_eq!(
        session.connect_url(),
        "wss://gateway-us-east1-b.discord.gg/?v=9&encoding=json"
    );

    session.on_open();
    let actions = hello(&mut session, 1000);
    assert_eq!(
        sent_frames(&actions),
        vec![&OutboundFrame::Resume {
            token: TOKEN.into(),
            session_id: "sess-1".into(),
            seq: Some(5),
        }]
    );

    session.handle_text(r#"{"op":0,"s":6,"t":"RESUMED","d":{}}"#).unwrap();
    assert!(!session.is_reconnecting());
    assert!(session.is_synced());
}

#[test]
fn test_invalid_session_during_resume_identifies_fresh() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.handle_text(&ready_frame(4, "sess-1")).unwrap();
    session.on_disconnect();
    session.on_open();
    hello(&mut session, 1000);

    let actions = session.handle_text(r#"{"op":9,"d":false}"#).unwrap();
    assert!(matches!(
        actions[0],
        SessionAction::Emit(GatewayEvent::SessionInvalidated)
    ));
    assert!(matches!(actions[1], SessionAction::ReconnectFresh));

    session.on_disconnect();
    assert!(!session.is_reconnecting());
    assert_eq!(session.session_id(), None);
    assert_eq!(session.sequence(), None);
    assert_eq!(session.connect_url(), DEFAULT_GATEWAY_URL);

    session.on_open();
    let actions = hello(&mut session, 1000);
    assert_eq!(
        sent_frames(&actions),
        vec![&OutboundFrame::Identify { token: TOKEN.into() }]
    );
}

#[test]
fn test_drop_before_ready_identifies_again() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.on_disconnect();
    assert!(!session.is_reconnecting());

    session.on_open();
    let actions = hello(&mut session, 1000);
    assert!(matches!(sent_frames(&actions)[0], OutboundFrame::Identify { .. }));
}

#[test]
fn test_stop_suppresses_resume() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.handle_text(&ready_frame(1, "sess-1")).unwrap();

    assert_eq!(session.stop(), OutboundFrame::Stop);
    session.on_disconnect();
    assert!(session.is_stopped());
    assert!(!session.is_reconnecting());
}

#[test]
fn test_reconnect_request_keeps_session() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    session.handle_text(&ready_frame(1, "sess-1")).unwrap();

    let actions = session.handle_text(r#"{"op":7,"d":null}"#).unwrap();
    assert!(matches!(actions[0], SessionAction::Reconnect));
    session.on_disconnect();
    assert!(session.is_reconnecting());
}

#[test]
fn test_dispatch_decoding() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);

    let actions = session
        .handle_text(
            &json!({
                "op": 0, "s": 2, "t": "MESSAGE_CREATE",
                "d": {
                    "id": "1200", "channel_id": "300", "guild_id": "400",
                    "author": {"id": "7"}, "content": "hi",
                    "mentions": [], "mention_roles": ["55"], "mention_everyone": false
                }
            })
            .to_string(),
        )
        .unwrap();
    match &actions[0] {
        SessionAction::Emit(GatewayEvent::MessageCreate(m)) => {
            assert_eq!(m.id, Snowflake(1200));
            assert_eq!(m.guild_id, Some(Snowflake(400)));
            assert_eq!(m.mention_roles, vec![Snowflake(55)]);
        }
        other => panic!("unexpected action: {other:?}"),
    }

    let actions = session
        .handle_text(r#"{"op":0,"s":3,"t":"GUILD_DELETE","d":{"id":"400","unavailable":false}}"#)
        .unwrap();
    assert!(matches!(
        &actions[0],
        SessionAction::Emit(GatewayEvent::Update(crate::model::EntityUpdate::GuildDelete(g)))
            if g.id == Snowflake(400)
    ));
}

#[test]
fn test_unknown_dispatch_is_ignored_but_sequenced() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    let actions = session
        .handle_text(r#"{"op":0,"s":9,"t":"PRESENCE_UPDATE","d":{"status":"idle"}}"#)
        .unwrap();
    assert!(actions.is_empty());
    assert_eq!(session.sequence(), Some(9));
}

#[test]
fn test_malformed_dispatch_payload_is_skipped() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    let actions = session
        .handle_text(r#"{"op":0,"s":4,"t":"MESSAGE_ACK","d":{"channel_id":"1"}}"#)
        .unwrap();
    assert!(actions.is_empty());
    assert_eq!(session.sequence(), Some(4));
}

#[test]
fn test_malformed_frame_is_an_error() {
    let mut session = new_session();
    session.on_open();
    assert!(matches!(
        session.handle_text("{not json"),
        Err(GatewayError::Json(_))
    ));
}

#[test]
fn test_ready_accepts_versioned_lists() {
    let mut session = new_session();
    session.on_open();
    hello(&mut session, 1000);
    let actions = session
        .handle_text(
            &json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {
                    "user": {"id": "100"},
                    "session_id": "s",
                    "read_state": {"version": 3, "partial": false, "entries": [
                        {"id": "300", "last_message_id": "900", "mention_count": 2}
                    ]},
                    "user_guild_settings": {"version": 1, "partial": false, "entries": [
                        {"guild_id": null, "muted": false, "flags": 0, "channel_overrides": []}
                    ]}
                }
            })
            .to_string(),
        )
        .unwrap();
    let SessionAction::Emit(GatewayEvent::Ready(ready)) = &actions[0] else {
        panic!("expected READY");
    };
    let read_state = ready.read_state.clone().into_vec();
    assert_eq!(read_state.len(), 1);
    assert_eq!(read_state[0].last_message_id, Some(Snowflake(900)));
    assert_eq!(ready.user_guild_settings.clone().into_vec().len(), 1);
}

#[test]
fn test_gateway_url_adds_protocol_params() {
    assert_eq!(
        session::gateway_url("wss://gateway.discord.gg").unwrap(),
        "wss://gateway.discord.gg/?v=9&encoding=json"
    );
    assert_eq!(
        session::gateway_url("wss://gw.example.com/?encoding=etf&compress=zlib-stream").unwrap(),
        "wss://gw.example.com/?compress=zlib-stream&v=9&encoding=json"
    );
    assert!(session::gateway_url("not a url").is_err());
}

#[test]
fn test_backoff_duration() {
    assert_eq!(GatewayClient::backoff_duration(1), Duration::ZERO);
    assert_eq!(GatewayClient::backoff_duration(2), Duration::from_secs(2));
    assert_eq!(GatewayClient::backoff_duration(3), Duration::from_secs(4));
    assert_eq!(GatewayClient::backoff_duration(20), Duration::from_secs(60));
}

#[test]
fn test_fatal_close_codes() {
    let auth = GatewayError::Closed {
        code: 4004,
        reason: "Authentication failed.".into(),
    };
    let transient = GatewayError::Closed {
        code: 4000,
        reason: "Unknown error".into(),
    };
    assert!(auth.is_fatal());
    assert!(!transient.is_fatal());
    assert!(!GatewayError::HeartbeatTimeout.is_fatal());
}

mod socket {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
    use tokio_tungstenite::{WebSocketStream, accept_async};

    use super::*;

    type ServerSocket = WebSocketStream<TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> ServerSocket {
        let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("client did not connect")
            .unwrap();
        accept_async(stream).await.unwrap()
    }

    async fn send_json(ws: &mut ServerSocket, value: serde_json::Value) {
        ws.send(Message::text(value.to_string())).await.unwrap();
    }

    /// Next JSON text frame from the client, `None` once it closes.
    async fn next_json(ws: &mut ServerSocket) -> Option<serde_json::Value> {
        tokio::time::timeout(WAIT, async {
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        return Some(serde_json::from_str(text.as_str()).unwrap());
                    }
                    Ok(Message::Close(_)) | Err(_) => return None,
                    Ok(_) => {}
                }
            }
            None
        })
        .await
        .expect("client went silent")
    }

    async fn close_with(ws: &mut ServerSocket, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from_static("closing"),
        };
        let _ = ws.close(Some(frame)).await;
    }

    async fn expect_loop_ended(events: &mut mpsc::Receiver<GatewayEvent>, within: Duration) {
        loop {
            match tokio::time::timeout(within, events.recv()).await {
                Ok(None) => return,
                Ok(Some(_)) => {}
                Err(_) => panic!("gateway loop still running"),
            }
        }
    }

    #[tokio::test]
    async fn test_zombie_connection_resumes_on_ready_url_then_stops() {
        let (listener, url) = listen().await;
        let config = GatewayConfig::new(TOKEN.into()).with_gateway_url(url.clone());
        let (mut events, shutdown) = GatewayClient::connect(config).await.unwrap();

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 100}})).await;
        let identify = next_json(&mut ws).await.unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], TOKEN);
        send_json(
            &mut ws,
            json!({
                "op": 0,
                "s": 1,
                "t": "READY",
                "d": {
                    "user": {"id": "100"},
                    "session_id": "S1",
                    "resume_gateway_url": url,
                    "guilds": [],
                    "read_state": [],
                    "user_guild_settings": [],
                    "notification_settings": {"flags": 0}
                }
            }),
        )
        .await;
        assert!(matches!(events.recv().await, Some(GatewayEvent::Ready(_))));

        // Never acknowledged, so the following tick drops the socket.
        let beat = next_json(&mut ws).await.unwrap();
        assert_eq!(beat["op"], 1);
        assert!(next_json(&mut ws).await.is_none());

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45000}})).await;
        assert_eq!(
            next_json(&mut ws).await,
            Some(json!({"op": 6, "d": {"token": TOKEN, "session_id": "S1", "seq": 1}}))
        );

        shutdown.send(()).await.unwrap();
        assert_eq!(next_json(&mut ws).await, Some(json!({"op": 1000})));
        assert!(next_json(&mut ws).await.is_none());
        expect_loop_ended(&mut events, WAIT).await;
    }

    #[tokio::test]
    async fn test_missing_hello_times_out_and_redials() {
        let (listener, url) = listen().await;
        let config = GatewayConfig::new(TOKEN.into())
            .with_gateway_url(url)
            .with_connect_timeout(Duration::from_millis(200));
        let (mut events, shutdown) = GatewayClient::connect(config).await.unwrap();

        let mut silent = accept(&listener).await;
        assert!(next_json(&mut silent).await.is_none());

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45000}})).await;
        let identify = next_json(&mut ws).await.unwrap();
        assert_eq!(identify["op"], 2);

        shutdown.send(()).await.unwrap();
        assert_eq!(next_json(&mut ws).await, Some(json!({"op": 1000})));
        expect_loop_ended(&mut events, WAIT).await;
    }

    #[tokio::test]
    async fn test_authentication_failure_ends_loop() {
        let (listener, url) = listen().await;
        let config = GatewayConfig::new(TOKEN.into()).with_gateway_url(url);
        let (mut events, _shutdown) = GatewayClient::connect(config).await.unwrap();

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45000}})).await;
        assert_eq!(next_json(&mut ws).await.unwrap()["op"], 2);
        close_with(&mut ws, 4004).await;

        expect_loop_ended(&mut events, WAIT).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(300), listener.accept())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_reconnect_backoff() {
        let (listener, url) = listen().await;
        let config = GatewayConfig::new(TOKEN.into()).with_gateway_url(url);
        let (mut events, shutdown) = GatewayClient::connect(config).await.unwrap();

        // Two failures in a row put the next attempt two seconds out.
        for _ in 0..2 {
            let mut ws = accept(&listener).await;
            close_with(&mut ws, 1001).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        shutdown.send(()).await.unwrap();
        expect_loop_ended(&mut events, Duration::from_secs(1)).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(300), listener.accept())
                .await
                .is_err()
        );
    }
}
