use std::collections::{HashMap, HashSet};

use discord_gateway::Snowflake;

use crate::AccountStatus;

/// Guild settings flag: the guild reports coarse "new activity" unreads.
pub const GUILD_NEW_ACTIVITY: u64 = 1 << 11;
/// Channel override flag: the channel follows coarse unread mode.
pub const CHANNEL_NEW_ACTIVITY: u64 = 1 << 10;
/// Account notification flags value that switches on coarse unread mode.
pub const COARSE_UNREAD_FLAGS: u64 = 16;

/// A channel with unacknowledged, notification-worthy content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadEntry {
    pub last_message_id: Snowflake,
    pub is_mention: bool,
    /// Owning guild when known; `None` for DMs and unmapped channels.
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOverrideState {
    pub guild_id: Option<Snowflake>,
    pub effective_muted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildState {
    pub muted: bool,
    pub has_coarse_unread: bool,
    pub suppress_roles: bool,
    pub suppress_everyone: bool,
    pub member_role_ids: Vec<Snowflake>,
}

/// Everything the engine knows about one account.
#[derive(Debug, Clone, Default)]
pub struct AccountNotificationState {
    /// Set only from READY.
    pub user_id: Option<Snowflake>,
    pub uses_coarse_unread_flag: bool,
    /// DM channel ids whose notifications are muted.
    pub muted_dm_peers: HashSet<Snowflake>,
    pub unread_channels: HashMap<Snowflake, UnreadEntry>,
    pub channel_overrides: HashMap<Snowflake, ChannelOverrideState>,
    pub guild_state: HashMap<Snowflake, GuildState>,
    /// Channel to guild index from the READY guild channel lists.
    pub channel_guilds: HashMap<Snowflake, Snowflake>,
}

impl AccountNotificationState {
    /// `ping` if any unread entry is a mention, `badge` if any entry exists.
    pub fn status(&self) -> AccountStatus {
        if self.unread_channels.values().any(|e| e.is_mention) {
            AccountStatus::Ping
        } else if !self.unread_channels.is_empty() {
            AccountStatus::Badge
        } else {
            AccountStatus::Clear
        }
    }

    /// Effective mute of a channel override under the current unread mode.
    pub fn effective_channel_mute(&self, muted: bool, flags: u64) -> bool {
        if !self.uses_coarse_unread_flag {
            return muted;
        }
        muted || flags & CHANNEL_NEW_ACTIVITY != 0
    }

    pub fn guild_of(&self, channel_id: Snowflake) -> Option<Snowflake> {
        self.channel_overrides
            .get(&channel_id)
            .and_then(|c| c.guild_id)
            .or_else(|| self.channel_guilds.get(&channel_id).copied())
    }
}
