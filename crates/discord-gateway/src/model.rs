//! Typed payloads for the dispatch events the tracker consumes.
//!
//! Only the fields needed for unread bookkeeping are modelled; everything
//! else in a payload is ignored. Optional collections default to empty so
//! that older and newer server payload generations both decode.

use serde::{Deserialize, Serialize};

use crate::Snowflake;

/// A bare `{ "id": ... }` object (users, mentions, channels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: Snowflake,
}

/// A list that the server sends either bare or wrapped in a versioned
/// `{ "entries": [...] }` object depending on client capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Versioned<T> {
    Entries { entries: Vec<T> },
    List(Vec<T>),
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Versioned::List(Vec::new())
    }
}

impl<T> Versioned<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Versioned::Entries { entries } => entries,
            Versioned::List(list) => list,
        }
    }
}

/// The READY snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: IdRef,
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub guilds: Vec<ReadyGuild>,
    #[serde(default)]
    pub read_state: Versioned<ReadStateEntry>,
    #[serde(default)]
    pub user_guild_settings: Versioned<GuildSettings>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub members: Vec<GuildMember>,
    #[serde(default)]
    pub channels: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    pub user: IdRef,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

/// Per-channel read marker reported in READY.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadStateEntry {
    pub id: Snowflake,
    #[serde(default)]
    pub last_message_id: Option<Snowflake>,
    #[serde(default)]
    pub mention_count: u32,
}

/// Account-wide notification settings block from READY.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub flags: u64,
}

/// Notification settings for one guild, or for direct messages when
/// `guild_id` is null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuildSettings {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub suppress_everyone: bool,
    #[serde(default)]
    pub suppress_roles: bool,
    #[serde(default)]
    pub channel_overrides: Vec<ChannelOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelOverride {
    pub channel_id: Snowflake,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub flags: u64,
}

/// MESSAGE_CREATE payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: IdRef,
    #[serde(default)]
    pub mentions: Vec<IdRef>,
    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,
    #[serde(default)]
    pub mention_everyone: bool,
}

/// MESSAGE_ACK payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageAck {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildDelete {
    #[serde(alias = "guild_id")]
    pub id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDelete {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub user: Option<IdRef>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

/// Settings and entity changes that patch notification state in place.
#[derive(Debug, Clone)]
pub enum EntityUpdate {
    GuildSettings(GuildSettings),
    GuildDelete(GuildDelete),
    ChannelDelete(ChannelDelete),
    GuildMemberUpdate(GuildMemberUpdate),
}
