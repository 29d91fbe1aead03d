//! Local mirror of per-account unread and mute state.
//!
//! Applies decoded gateway events to an [`AccountNotificationState`] and
//! derives a coarse [`AccountStatus`] without asking the server.

pub mod engine;
pub mod state;

use serde::{Deserialize, Serialize};

pub use engine::NotificationEngine;
pub use state::AccountNotificationState;

/// Coarse notification status of one account. Ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Clear,
    Badge,
    Ping,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Clear => "clear",
            AccountStatus::Badge => "badge",
            AccountStatus::Ping => "ping",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
