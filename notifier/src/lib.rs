//! Multi-account notification tracker.
//!
//! Keeps a gateway connection open for every configured account, mirrors
//! each account's unread state locally and reports one combined status for
//! all accounts other than the one in the foreground.

pub mod account;
pub mod config;
pub mod coordinator;
pub mod directory;

use std::sync::Arc;

use config::AppConfig;
use coordinator::Coordinator;
use directory::StaticAccountDirectory;

/// Load `.env` and the environment, then resolve the configured accounts.
pub fn init_coordinator() -> Result<Coordinator, anyhow::Error> {
    config::load_dotenv();
    let config = AppConfig::load()?;
    tracing::info!(
        accounts = config.accounts.len(),
        active_account = config.active_account.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );
    let directory = Arc::new(StaticAccountDirectory::new(config.accounts));
    Ok(Coordinator::new(
        directory,
        &config.gateway_url,
        config.active_account,
    ))
}
