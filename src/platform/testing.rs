//! Recording platform for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    BotAddEntry, ChannelId, ChatPlatform, Embed, GuildId, GuildSummary, PlatformError, UserId,
};

/// Delivers every message into memory. With `closed` set, direct messages
/// fail as if the recipient blocked the bot.
#[derive(Default)]
pub struct RecordingPlatform {
    pub closed: bool,
    direct: Mutex<Vec<(UserId, Embed)>>,
    channel: Mutex<Vec<(ChannelId, Embed)>>,
}

impl RecordingPlatform {
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn direct_titles(&self) -> Vec<String> {
        self.direct
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, embed)| embed.title.clone())
            .collect()
    }

    pub fn channel_posts(&self) -> Vec<(ChannelId, Embed)> {
        self.channel.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn wait_until_ready(&self) {}

    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError> {
        Ok(Vec::new())
    }

    async fn guild(&self, _guild_id: GuildId) -> Result<Option<GuildSummary>, PlatformError> {
        Ok(None)
    }

    async fn join_time(&self, _guild_id: GuildId) -> Result<Option<DateTime<Utc>>, PlatformError> {
        Ok(None)
    }

    async fn leave_guild(&self, _guild_id: GuildId) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn send_direct(&self, user_id: UserId, embed: &Embed) -> Result<(), PlatformError> {
        if self.closed {
            return Err(PlatformError::Delivery {
                recipient: user_id.to_string(),
                reason: "cannot send messages to this user".to_string(),
            });
        }
        self.direct.lock().unwrap().push((user_id, embed.clone()));
        Ok(())
    }

    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        embed: &Embed,
    ) -> Result<(), PlatformError> {
        self.channel.lock().unwrap().push((channel_id, embed.clone()));
        Ok(())
    }

    async fn bot_add_entries(
        &self,
        _guild_id: GuildId,
        _limit: u8,
    ) -> Result<Vec<BotAddEntry>, PlatformError> {
        Ok(Vec::new())
    }

    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        Ok(1)
    }
}
