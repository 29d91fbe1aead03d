//! Source of tracked accounts and their tokens.

use crate::config::AccountCredentials;

/// Lists known accounts and hands out their auth tokens.
pub trait AccountDirectory: Send + Sync {
    fn list_accounts(&self) -> Vec<String>;
    fn token(&self, account_id: &str) -> Option<String>;
}

/// Directory backed by the configured account list.
pub struct StaticAccountDirectory {
    accounts: Vec<AccountCredentials>,
}

impl StaticAccountDirectory {
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        Self { accounts }
    }
}

impl AccountDirectory for StaticAccountDirectory {
    fn list_accounts(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.account_id.clone()).collect()
    }

    fn token(&self, account_id: &str) -> Option<String> {
        self.accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .map(|a| a.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_directory_lookup() {
        let directory = StaticAccountDirectory::new(vec![
            AccountCredentials {
                account_id: "main".into(),
                token: "tok-a".into(),
            },
            AccountCredentials {
                account_id: "alt".into(),
                token: "tok-b".into(),
            },
        ]);
        assert_eq!(directory.list_accounts(), vec!["main", "alt"]);
        assert_eq!(directory.token("alt").as_deref(), Some("tok-b"));
        assert_eq!(directory.token("missing"), None);
    }
}
