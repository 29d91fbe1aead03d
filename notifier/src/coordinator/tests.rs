use std::sync::Arc;

use discord_gateway::GatewayEvent;
use discord_gateway::model::{MessageCreate, Ready};
use serde_json::json;
use tokio::sync::mpsc;
use unread_state::AccountStatus;

use super::*;
use crate::config::AccountCredentials;
use crate::directory::StaticAccountDirectory;

fn ready_event(user_id: &str) -> GatewayEvent {
    let ready: Ready = serde_json::from_value(json!({
        "user": {"id": user_id},
        "session_id": format!("session-{user_id}"),
        "guilds": [{"id": "500", "members": [{"user": {"id": user_id}, "roles": []}]}],
        "read_state": [],
        "user_guild_settings": [{
            "guild_id": "500", "muted": false, "flags": 0,
            "suppress_everyone": false, "suppress_roles": false,
            "channel_overrides": []
        }],
        "notification_settings": {"flags": 0}
    }))
    .unwrap();
    GatewayEvent::Ready(Box::new(ready))
}

fn guild_message(id: u64, mentions: &[&str]) -> GatewayEvent {
    let mentions: Vec<_> = mentions.iter().map(|m| json!({"id": m})).collect();
    let message: MessageCreate = serde_json::from_value(json!({
        "id": id.to_string(),
        "channel_id": "600",
        "guild_id": "500",
        "author": {"id": "999"},
        "mentions": mentions,
        "mention_roles": [],
        "mention_everyone": false
    }))
    .unwrap();
    GatewayEvent::MessageCreate(message)
}

#[test]
fn test_board_aggregate_severity() {
    let mut board = StatusBoard::new(["a".to_string(), "b".to_string(), "c".to_string()], None);
    assert_eq!(board.aggregate(), AccountStatus::Clear);
    assert_eq!(board.update("a", AccountStatus::Badge), AccountStatus::Badge);
    assert_eq!(board.update("b", AccountStatus::Ping), AccountStatus::Ping);
    assert_eq!(board.update("b", AccountStatus::Clear), AccountStatus::Badge);
    assert_eq!(board.update("unknown", AccountStatus::Ping), AccountStatus::Badge);
    assert_eq!(board.status_of("a"), Some(AccountStatus::Badge));
    assert_eq!(board.status_of("unknown"), None);
}

#[test]
fn test_board_excludes_active_account() {
    let mut board = StatusBoard::new(["a".to_string(), "b".to_string()], Some("a".into()));
    assert_eq!(board.update("a", AccountStatus::Ping), AccountStatus::Clear);
    assert_eq!(board.update("b", AccountStatus::Badge), AccountStatus::Badge);
    assert_eq!(board.set_active(None), AccountStatus::Ping);
    assert_eq!(board.set_active(Some("b".into())), AccountStatus::Ping);
}

#[test]
fn test_coordinator_skips_accounts_without_token() {
    struct PartialDirectory;
    impl AccountDirectory for PartialDirectory {
        fn list_accounts(&self) -> Vec<String> {
            vec!["main".into(), "orphan".into()]
        }
        fn token(&self, account_id: &str) -> Option<String> {
            (account_id == "main").then(|| "tok".to_string())
        }
    }

    let coordinator = Coordinator::new(
        Arc::new(PartialDirectory),
        discord_gateway::gateway::DEFAULT_GATEWAY_URL,
        None,
    );
    assert_eq!(coordinator.account_ids(), vec!["main"]);

    let directory = StaticAccountDirectory::new(vec![AccountCredentials {
        account_id: "alt".into(),
        token: "tok".into(),
    }]);
    let coordinator = Coordinator::new(Arc::new(directory), "wss://gateway.discord.gg", None);
    assert_eq!(coordinator.account_ids(), vec!["alt"]);
}

#[tokio::test]
async fn test_inactive_account_unread_raises_badge() {
    let board = StatusBoard::new(["a".to_string(), "b".to_string()], Some("a".into()));
    let (status_tx, status_rx) = mpsc::channel(16);
    let (control_tx, control_rx) = mpsc::channel(4);
    let (aggregate_tx, mut aggregate_rx) = mpsc::channel(16);
    let (events_a, events_a_rx) = mpsc::channel(16);
    let (events_b, events_b_rx) = mpsc::channel(16);

    tokio::spawn(run_account("a".into(), events_a_rx, status_tx.clone()));
    tokio::spawn(run_account("b".into(), events_b_rx, status_tx));
    let aggregator = tokio::spawn(run_aggregator(board, status_rx, control_rx, aggregate_tx));

    events_a.send(ready_event("1")).await.unwrap();
    assert_eq!(aggregate_rx.recv().await, Some(AccountStatus::Clear));

    // The active account pinging does not surface.
    events_a.send(guild_message(1000, &["1"])).await.unwrap();
    assert_eq!(aggregate_rx.recv().await, Some(AccountStatus::Clear));

    events_b.send(ready_event("2")).await.unwrap();
    assert_eq!(aggregate_rx.recv().await, Some(AccountStatus::Clear));

    events_b.send(guild_message(1001, &[])).await.unwrap();
    assert_eq!(aggregate_rx.recv().await, Some(AccountStatus::Badge));

    control_tx.send(Control::SetActive(None)).await.unwrap();
    assert_eq!(aggregate_rx.recv().await, Some(AccountStatus::Ping));

    drop(events_a);
    drop(events_b);
    aggregator.await.unwrap();
    assert_eq!(aggregate_rx.recv().await, None);
}
