//! # Chat platform
//!
//! The bot's view of the chat service: guild enumeration, leaving guilds,
//! audit-log lookups and message delivery. Monitors depend on the
//! [`ChatPlatform`] trait only; [`discord::DiscordClient`] is the production
//! implementation.

pub mod discord;
pub mod embed;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub use discord::DiscordClient;
pub use embed::{Embed, EmbedField};

pub type GuildId = u64;
pub type UserId = u64;
pub type ChannelId = u64;

/// A guild the bot is a member of.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
    /// Approximate member count; `None` when the platform did not report one.
    pub member_count: Option<u64>,
    pub owner_id: Option<UserId>,
    /// When the bot joined the guild; `None` when unknown.
    pub joined_at: Option<DateTime<Utc>>,
}

/// One `bot_add` audit-log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotAddEntry {
    /// User who performed the add.
    pub user_id: Option<UserId>,
    /// Bot that was added.
    pub target_id: Option<UserId>,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Recipient cannot be reached (DMs closed, missing permission).
    #[error("cannot deliver to {recipient}: {reason}")]
    Delivery { recipient: String, reason: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("rate limited by platform (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<f64> },
    #[error("platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("platform request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed platform response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Resolves once the client is authenticated and able to serve requests.
    async fn wait_until_ready(&self);

    /// Every guild the bot currently belongs to.
    ///
    /// The listing is shallow: `owner_id` and `joined_at` may be `None` even
    /// when known. Use [`ChatPlatform::guild`] or [`ChatPlatform::join_time`]
    /// for those.
    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError>;

    /// Full details of one guild, or `None` if the bot is not in it.
    async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildSummary>, PlatformError>;

    /// When the bot joined `guild_id`; `None` when unknown.
    async fn join_time(&self, guild_id: GuildId) -> Result<Option<DateTime<Utc>>, PlatformError>;

    /// Leaves a guild. Leaving a guild the bot is not in succeeds.
    async fn leave_guild(&self, guild_id: GuildId) -> Result<(), PlatformError>;

    async fn send_direct(&self, user_id: UserId, embed: &Embed) -> Result<(), PlatformError>;

    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        embed: &Embed,
    ) -> Result<(), PlatformError>;

    /// Most recent `bot_add` audit-log entries, newest first.
    async fn bot_add_entries(
        &self,
        guild_id: GuildId,
        limit: u8,
    ) -> Result<Vec<BotAddEntry>, PlatformError>;

    /// The bot's own user id.
    async fn bot_user_id(&self) -> Result<UserId, PlatformError>;
}
