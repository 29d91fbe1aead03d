//! Multi-account coordinator.
//!
//! Runs one gateway client and notification engine per account and folds
//! their statuses into a single signal: the most severe status among every
//! account except the active one.

mod board;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use discord_gateway::{GatewayClient, GatewayConfig, GatewayError};
use tokio::sync::mpsc;
use unread_state::AccountStatus;

use crate::account::{AccountStatusChanged, run_account};
use crate::directory::AccountDirectory;

pub use board::StatusBoard;

const STATUS_CHANNEL_CAPACITY: usize = 256;
const AGGREGATE_CHANNEL_CAPACITY: usize = 64;

/// Requests handled by the aggregation task.
#[derive(Debug)]
pub(crate) enum Control {
    SetActive(Option<String>),
}

/// Accounts resolved from the directory, not yet connected.
pub struct Coordinator {
    accounts: Vec<(String, GatewayConfig)>,
    board: StatusBoard,
}

/// Live coordinator returned by [`Coordinator::connect`].
pub struct CoordinatorHandle {
    shutdowns: Vec<(String, mpsc::Sender<()>)>,
    control_tx: mpsc::Sender<Control>,
}

impl Coordinator {
    /// Resolve every account in the directory. Accounts without a token are
    /// skipped.
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        gateway_url: &str,
        active_account: Option<String>,
    ) -> Self {
        let mut accounts = Vec::new();
        for account_id in directory.list_accounts() {
            match directory.token(&account_id) {
                Some(token) => {
                    let config =
                        GatewayConfig::new(token).with_gateway_url(gateway_url.to_string());
                    accounts.push((account_id, config));
                }
                None => {
                    tracing::warn!(account = %account_id, "No token for account, skipping");
                }
            }
        }
        let board = StatusBoard::new(accounts.iter().map(|(id, _)| id.clone()), active_account);
        Self { accounts, board }
    }

    pub fn account_ids(&self) -> Vec<&str> {
        self.accounts.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Start every account's gateway. Returns the aggregate status receiver
    /// and a handle to stop the gateways or change the active account.
    pub async fn connect(
        self,
    ) -> Result<(mpsc::Receiver<AccountStatus>, CoordinatorHandle), GatewayError> {
        let (status_tx, status_rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
        let (aggregate_tx, aggregate_rx) = mpsc::channel(AGGREGATE_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(8);

        let mut shutdowns = Vec::with_capacity(self.accounts.len());
        for (account_id, config) in self.accounts {
            let (events, shutdown) = GatewayClient::connect(config).await?;
            tracing::info!(account = %account_id, "Account gateway started");
            tokio::spawn(run_account(account_id.clone(), events, status_tx.clone()));
            shutdowns.push((account_id, shutdown));
        }
        drop(status_tx);

        tokio::spawn(run_aggregator(self.board, status_rx, control_rx, aggregate_tx));
        Ok((
            aggregate_rx,
            CoordinatorHandle {
                shutdowns,
                control_tx,
            },
        ))
    }
}

impl CoordinatorHandle {
    /// Change which account is foregrounded; the aggregate is re-emitted.
    pub async fn set_active_account(&self, account_id: Option<String>) {
        if self.control_tx.send(Control::SetActive(account_id)).await.is_err() {
            tracing::warn!("Coordinator aggregation task is gone");
        }
    }

    /// Stop every account's gateway. No reconnect follows.
    pub async fn stop(&self) {
        for (account_id, shutdown) in &self.shutdowns {
            if shutdown.send(()).await.is_ok() {
                tracing::info!(account = %account_id, "Account gateway stop signal sent");
            } else {
                tracing::debug!(account = %account_id, "Account gateway already stopped");
            }
        }
    }
}

/// Fold account statuses into the aggregate, emitting it after every
/// account update and every active-account change.
pub(crate) async fn run_aggregator(
    mut board: StatusBoard,
    mut status_rx: mpsc::Receiver<AccountStatusChanged>,
    mut control_rx: mpsc::Receiver<Control>,
    aggregate_tx: mpsc::Sender<AccountStatus>,
) {
    loop {
        let aggregate = tokio::select! {
            update = status_rx.recv() => {
                let Some(update) = update else {
                    tracing::info!("All account streams ended, aggregation finished");
                    return;
                };
                if board.status_of(&update.account_id) != Some(update.status) {
                    tracing::info!(
                        account = %update.account_id,
                        status = %update.status,
                        "Account status changed"
                    );
                }
                board.update(&update.account_id, update.status)
            }
            Some(control) = control_rx.recv() => match control {
                Control::SetActive(account_id) => board.set_active(account_id),
            },
        };
        tracing::debug!(status = %aggregate, "Aggregate status");
        if aggregate_tx.send(aggregate).await.is_err() {
            tracing::debug!("Aggregate receiver dropped");
            return;
        }
    }
}
