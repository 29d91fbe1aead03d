//! Notification state engine.
//!
//! Rebuilt from every READY snapshot and patched by later dispatches. Every
//! event that touches unread state yields the recomputed status, changed or
//! not; deduplication is left to the consumer.

mod rules;

use std::collections::{HashMap, HashSet};

use discord_gateway::{GatewayEvent, Snowflake};
use discord_gateway::model::{
    ChannelDelete, EntityUpdate, GuildDelete, GuildMemberUpdate, GuildSettings, MessageAck,
    MessageCreate, Ready,
};

use crate::AccountStatus;
use crate::state::{
    AccountNotificationState, COARSE_UNREAD_FLAGS, ChannelOverrideState, GUILD_NEW_ACTIVITY,
    GuildState, UnreadEntry,
};

#[derive(Debug, Default)]
pub struct NotificationEngine {
    state: AccountNotificationState,
}

impl NotificationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AccountNotificationState {
        &self.state
    }

    pub fn status(&self) -> AccountStatus {
        self.state.status()
    }

    /// Apply one gateway event. Returns the recomputed status, or `None` when
    /// the event cannot affect notification state.
    pub fn apply(&mut self, event: GatewayEvent) -> Option<AccountStatus> {
        match event {
            GatewayEvent::Ready(ready) => {
                self.on_ready(*ready);
                Some(self.status())
            }
            GatewayEvent::MessageCreate(message) => self.on_message_create(&message),
            GatewayEvent::MessageAck(ack) => {
                self.on_message_ack(&ack);
                Some(self.status())
            }
            GatewayEvent::Update(update) => self.on_update(update),
            GatewayEvent::SessionInvalidated => {
                tracing::info!("Session invalidated, unread state reset until next READY");
                self.state = AccountNotificationState::default();
                Some(self.status())
            }
        }
    }

    fn on_ready(&mut self, ready: Ready) {
        let mut state = AccountNotificationState {
            user_id: Some(ready.user.id),
            uses_coarse_unread_flag: ready.notification_settings.flags == COARSE_UNREAD_FLAGS,
            ..Default::default()
        };

        for guild in &ready.guilds {
            for channel in &guild.channels {
                state.channel_guilds.insert(channel.id, guild.id);
            }
        }

        let settings = ready.user_guild_settings.into_vec();
        for block in &settings {
            for o in &block.channel_overrides {
                let effective_muted = state.effective_channel_mute(o.muted, o.flags);
                state.channel_overrides.insert(
                    o.channel_id,
                    ChannelOverrideState {
                        guild_id: block.guild_id,
                        effective_muted,
                    },
                );
            }
        }

        let mut by_guild: HashMap<_, _> = settings
            .iter()
            .filter_map(|s| s.guild_id.map(|id| (id, s)))
            .collect();
        for guild in &ready.guilds {
            let roles = guild
                .members
                .iter()
                .find(|m| m.user.id == ready.user.id)
                .map(|m| m.roles.clone())
                .unwrap_or_default();
            let guild_state = match by_guild.remove(&guild.id) {
                Some(s) => GuildState {
                    muted: s.muted,
                    has_coarse_unread: s.flags & GUILD_NEW_ACTIVITY != 0,
                    suppress_roles: s.suppress_roles,
                    suppress_everyone: s.suppress_everyone,
                    member_role_ids: roles,
                },
                None => GuildState {
                    member_role_ids: roles,
                    ..Default::default()
                },
            };
            state.guild_state.insert(guild.id, guild_state);
        }

        if let Some(dm) = settings.iter().find(|s| s.guild_id.is_none()) {
            state.muted_dm_peers = muted_channels(dm);
        }

        for entry in ready.read_state.into_vec() {
            if entry.mention_count == 0 {
                continue;
            }
            let guild_id = state.guild_of(entry.id);
            state.unread_channels.insert(
                entry.id,
                UnreadEntry {
                    last_message_id: entry.last_message_id.unwrap_or_default(),
                    is_mention: true,
                    guild_id,
                },
            );
        }

        tracing::info!(
            user_id = %ready.user.id,
            guilds = state.guild_state.len(),
            unread = state.unread_channels.len(),
            coarse_unread = state.uses_coarse_unread_flag,
            "Notification state rebuilt from READY"
        );
        self.state = state;
    }

    fn on_message_create(&mut self, message: &MessageCreate) -> Option<AccountStatus> {
        if self.state.user_id == Some(message.author.id) {
            return None;
        }
        let mention = self.state.mentions_self(message);
        match message.guild_id {
            Some(guild_id) => {
                if mention {
                    self.mark_unread(message, true, Some(guild_id));
                } else if !self.state.unread_channels.contains_key(&message.channel_id)
                    && self.state.is_unread(message)
                {
                    self.mark_unread(message, false, Some(guild_id));
                }
            }
            None => {
                if mention || !self.state.is_muted_dm(message.channel_id) {
                    self.mark_unread(message, true, None);
                }
            }
        }
        Some(self.status())
    }

    fn mark_unread(
        &mut self,
        message: &MessageCreate,
        is_mention: bool,
        guild_id: Option<Snowflake>,
    ) {
        tracing::debug!(
            channel_id = %message.channel_id,
            message_id = %message.id,
            sent_at = ?message.id.timestamp(),
            is_mention,
            "Channel marked unread"
        );
        self.state.unread_channels.insert(
            message.channel_id,
            UnreadEntry {
                last_message_id: message.id,
                is_mention,
                guild_id,
            },
        );
    }

    fn on_message_ack(&mut self, ack: &MessageAck) {
        let Some(&entry) = self.state.unread_channels.get(&ack.channel_id) else {
            return;
        };
        if entry.last_message_id <= ack.message_id {
            self.state.unread_channels.remove(&ack.channel_id);
            tracing::debug!(channel_id = %ack.channel_id, "Channel acknowledged");
        } else {
            tracing::debug!(
                channel_id = %ack.channel_id,
                acked = %ack.message_id,
                last = %entry.last_message_id,
                acked_at = ?ack.message_id.timestamp(),
                last_at = ?entry.last_message_id.timestamp(),
                "Ignoring stale ack"
            );
        }
    }

    fn on_update(&mut self, update: EntityUpdate) -> Option<AccountStatus> {
        match update {
            EntityUpdate::GuildSettings(settings) => self.on_guild_settings(settings),
            EntityUpdate::GuildDelete(guild) => self.on_guild_delete(&guild),
            EntityUpdate::ChannelDelete(channel) => self.on_channel_delete(&channel),
            EntityUpdate::GuildMemberUpdate(member) => return self.on_member_update(member),
        }
        Some(self.status())
    }

    fn on_guild_settings(&mut self, settings: GuildSettings) {
        let Some(guild_id) = settings.guild_id else {
            self.state.muted_dm_peers = muted_channels(&settings);
            return;
        };

        let roles = self
            .state
            .guild_state
            .remove(&guild_id)
            .map(|g| g.member_role_ids)
            .unwrap_or_default();
        let muted = settings.muted;
        self.state.guild_state.insert(
            guild_id,
            GuildState {
                muted,
                has_coarse_unread: settings.flags & GUILD_NEW_ACTIVITY != 0,
                suppress_roles: settings.suppress_roles,
                suppress_everyone: settings.suppress_everyone,
                member_role_ids: roles,
            },
        );

        for o in &settings.channel_overrides {
            let effective_muted = self.state.effective_channel_mute(o.muted, o.flags);
            self.state.channel_overrides.insert(
                o.channel_id,
                ChannelOverrideState {
                    guild_id: Some(guild_id),
                    effective_muted,
                },
            );
            if effective_muted && self.state.unread_channels.remove(&o.channel_id).is_some() {
                tracing::debug!(channel_id = %o.channel_id, "Muted channel no longer unread");
            }
        }

        // Mentions survive a guild mute.
        if muted {
            self.state
                .unread_channels
                .retain(|_, e| e.is_mention || e.guild_id != Some(guild_id));
        }
    }

    fn on_guild_delete(&mut self, guild: &GuildDelete) {
        self.state.guild_state.remove(&guild.id);
        self.state.channel_guilds.retain(|_, g| *g != guild.id);
        self.state
            .channel_overrides
            .retain(|_, c| c.guild_id != Some(guild.id));
        self.state
            .unread_channels
            .retain(|_, e| e.guild_id != Some(guild.id));
    }

    fn on_channel_delete(&mut self, channel: &ChannelDelete) {
        self.state.channel_overrides.remove(&channel.id);
        self.state.channel_guilds.remove(&channel.id);
        self.state.unread_channels.remove(&channel.id);
    }

    fn on_member_update(&mut self, member: GuildMemberUpdate) -> Option<AccountStatus> {
        if let (Some(user), Some(self_id)) = (&member.user, self.state.user_id) {
            if user.id != self_id {
                return None;
            }
        }
        let guild = self.state.guild_state.get_mut(&member.guild_id)?;
        guild.member_role_ids = member.roles;
        Some(self.status())
    }
}

fn muted_channels(settings: &GuildSettings) -> HashSet<Snowflake> {
    settings
        .channel_overrides
        .iter()
        .filter(|o| o.muted)
        .map(|o| o.channel_id)
        .collect()
}
