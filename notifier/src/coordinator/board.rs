use unread_state::AccountStatus;

/// Latest published status per account, in directory order.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    entries: Vec<(String, AccountStatus)>,
    active: Option<String>,
}

impl StatusBoard {
    pub fn new(account_ids: impl IntoIterator<Item = String>, active: Option<String>) -> Self {
        Self {
            entries: account_ids
                .into_iter()
                .map(|id| (id, AccountStatus::Clear))
                .collect(),
            active,
        }
    }

    /// Record an account's status and return the new aggregate.
    pub fn update(&mut self, account_id: &str, status: AccountStatus) -> AccountStatus {
        match self.entries.iter_mut().find(|(id, _)| id == account_id) {
            Some(entry) => entry.1 = status,
            None => tracing::warn!(account = %account_id, "Status for unknown account ignored"),
        }
        self.aggregate()
    }

    pub fn set_active(&mut self, active: Option<String>) -> AccountStatus {
        self.active = active;
        self.aggregate()
    }

    /// Most severe status among all accounts except the active one.
    pub fn aggregate(&self) -> AccountStatus {
        self.entries
            .iter()
            .filter(|(id, _)| self.active.as_deref() != Some(id.as_str()))
            .map(|(_, status)| *status)
            .max()
            .unwrap_or_default()
    }

    pub fn status_of(&self, account_id: &str) -> Option<AccountStatus> {
        self.entries
            .iter()
            .find(|(id, _)| id == account_id)
            .map(|(_, status)| *status)
    }
}
