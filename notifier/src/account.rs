//! Per-account worker: one gateway event stream feeding one engine.

use discord_gateway::GatewayEvent;
use tokio::sync::mpsc;
use unread_state::{AccountStatus, NotificationEngine};

/// Status computed for one account after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatusChanged {
    pub account_id: String,
    pub status: AccountStatus,
}

/// Apply the account's gateway events in arrival order and publish every
/// computed status. The engine, and with it the account's unread state,
/// is dropped when the gateway stops.
pub async fn run_account(
    account_id: String,
    mut events: mpsc::Receiver<GatewayEvent>,
    status_tx: mpsc::Sender<AccountStatusChanged>,
) {
    let mut engine = NotificationEngine::new();
    while let Some(event) = events.recv().await {
        let Some(status) = engine.apply(event) else {
            continue;
        };
        tracing::debug!(account = %account_id, %status, "Account status computed");
        let update = AccountStatusChanged {
            account_id: account_id.clone(),
            status,
        };
        if status_tx.send(update).await.is_err() {
            tracing::debug!(account = %account_id, "Status receiver dropped");
            return;
        }
    }
    tracing::info!(account = %account_id, "Account event stream ended");
}
