//! Runtime application configuration loaded from the environment.

use std::fmt;

use discord_gateway::gateway::DEFAULT_GATEWAY_URL;

use super::validation;

pub const ENV_ACCOUNTS: &str = "NOTIFIER_ACCOUNTS";
pub const ENV_ACTIVE_ACCOUNT: &str = "NOTIFIER_ACTIVE_ACCOUNT";
pub const ENV_GATEWAY_URL: &str = "NOTIFIER_GATEWAY_URL";

/// One tracked account and its bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account_id: String,
    pub token: String,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub accounts: Vec<AccountCredentials>,
    /// Foreground account excluded from the aggregate status.
    pub active_account: Option<String>,
    pub gateway_url: String,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String { lookup(key).unwrap_or_default().trim().to_string() };

        let accounts = validation::parse_accounts(&g(ENV_ACCOUNTS))
            .map_err(|e| anyhow::anyhow!("{ENV_ACCOUNTS}: {e}"))?;

        let active_account = Some(g(ENV_ACTIVE_ACCOUNT)).filter(|id| !id.is_empty());
        if let Some(active) = &active_account {
            if !accounts.iter().any(|a| &a.account_id == active) {
                tracing::warn!(
                    active_account = %active,
                    "Active account is not among the tracked accounts"
                );
            }
        }

        let gateway_url = {
            let url = g(ENV_GATEWAY_URL);
            if url.is_empty() { DEFAULT_GATEWAY_URL.to_string() } else { url }
        };
        validation::validate_gateway_url(&gateway_url)
            .map_err(|e| anyhow::anyhow!("{ENV_GATEWAY_URL}: {e}"))?;

        Ok(Self {
            accounts,
            active_account,
            gateway_url,
        })
    }
}
