//! Setting value validation.

use std::collections::HashSet;

use discord_gateway::gateway::session::gateway_url;

use super::AccountCredentials;

/// Parse `id=token` pairs separated by commas.
pub fn parse_accounts(value: &str) -> Result<Vec<AccountCredentials>, String> {
    let mut accounts = Vec::new();
    for (index, pair) in value.split(',').map(str::trim).enumerate() {
        if pair.is_empty() {
            continue;
        }
        let Some((id, token)) = pair.split_once('=') else {
            return Err(format!("entry {} must look like 'account_id=token'", index + 1));
        };
        accounts.push(AccountCredentials {
            account_id: id.trim().to_string(),
            token: token.trim().to_string(),
        });
    }
    validate_accounts(&accounts)?;
    Ok(accounts)
}

/// Validate the account list. Returns `Ok(())` if valid, or an error message.
pub fn validate_accounts(accounts: &[AccountCredentials]) -> Result<(), String> {
    if accounts.is_empty() {
        return Err("at least one account is required".into());
    }
    let mut seen = HashSet::new();
    for account in accounts {
        if account.account_id.is_empty() {
            return Err("account id must not be empty".into());
        }
        if account.token.is_empty() {
            return Err(format!("token for '{}' must not be empty", account.account_id));
        }
        if !seen.insert(account.account_id.as_str()) {
            return Err(format!("duplicate account id '{}'", account.account_id));
        }
    }
    Ok(())
}

/// The gateway URL must use a WebSocket scheme and parse with a host.
pub fn validate_gateway_url(value: &str) -> Result<(), String> {
    if !(value.starts_with("wss://") || value.starts_with("ws://")) {
        return Err("must be a ws:// or wss:// URL".into());
    }
    gateway_url(value)
        .map(|_| ())
        .map_err(|e| format!("invalid URL: {e}"))
}
