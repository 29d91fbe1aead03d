//! Server notification rules replicated locally.

use discord_gateway::model::MessageCreate;
use discord_gateway::Snowflake;

use crate::state::AccountNotificationState;

impl AccountNotificationState {
    /// Whether the message addresses this account directly, via @everyone, or
    /// via one of the account's roles in the message's guild.
    pub fn mentions_self(&self, message: &MessageCreate) -> bool {
        if let Some(user_id) = self.user_id {
            if message.mentions.iter().any(|m| m.id == user_id) {
                return true;
            }
        }
        let Some(guild_id) = message.guild_id else {
            return false;
        };
        // An unknown guild suppresses nothing and has no roles.
        let guild = self.guild_state.get(&guild_id);
        let suppress_everyone = guild.is_some_and(|g| g.suppress_everyone);
        if message.mention_everyone && !suppress_everyone {
            return true;
        }
        match guild {
            Some(g) if !g.suppress_roles => message
                .mention_roles
                .iter()
                .any(|role| g.member_role_ids.contains(role)),
            _ => false,
        }
    }

    pub fn is_muted_dm(&self, channel_id: Snowflake) -> bool {
        self.muted_dm_peers.contains(&channel_id)
    }

    /// Whether a message would produce an unread indicator.
    pub fn is_unread(&self, message: &MessageCreate) -> bool {
        let Some(guild_id) = message.guild_id else {
            return !self.is_muted_dm(message.channel_id) || self.mentions_self(message);
        };
        let Some(guild) = self.guild_state.get(&guild_id) else {
            return false;
        };
        if guild.muted {
            return false;
        }
        match self.channel_overrides.get(&message.channel_id) {
            None if self.uses_coarse_unread_flag => guild.has_coarse_unread,
            None => true,
            Some(channel) if self.uses_coarse_unread_flag && !channel.effective_muted => {
                guild.has_coarse_unread
            }
            Some(channel) => !channel.effective_muted,
        }
    }
}
