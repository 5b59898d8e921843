//! Test utilities shared by the integration tests.
//!
//! In-memory SQLite with migrations, a recording [`ChatPlatform`] fake and
//! weather configuration pointed at a wiremock server.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use guildkeeper::{
    config::{AppConfig, WeatherConfig},
    platform::{
        BotAddEntry, ChannelId, ChatPlatform, Embed, GuildId, GuildSummary, PlatformError, UserId,
    },
    repositories::{WeatherProfileRepository, WeatherStatsRepository},
    runtime::{self, Services},
    store::{ConfigStore, DbConfigStore},
    weather::{AlertKind, WeatherClient, ZipCodeTable, alerts::AlertContext},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use wiremock::MockServer;

pub const BOT_ID: UserId = 999;
pub const OPERATOR_TOKEN: &str = "test-operator-token";

/// Postal code resolving to the point `40.7506,-73.9972`.
pub const NYC_ZIP: &str = "10001";
pub const NYC_POINT: &str = "40.7506,-73.9972";
/// Postal code resolving to the point `41.8858,-87.6181`.
pub const CHICAGO_ZIP: &str = "60601";
pub const CHICAGO_POINT: &str = "41.8858,-87.6181";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_test_store() -> Result<Arc<dyn ConfigStore>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(DbConfigStore::new(Arc::new(db))))
}

pub fn zip_table() -> ZipCodeTable {
    ZipCodeTable::parse(&format!(
        "zip,latitude,longitude\n{NYC_ZIP},40.7506,-73.9972\n{CHICAGO_ZIP},41.8858,-87.6181\n"
    ))
}

pub fn weather_config(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        nws_api_base: server.uri(),
        open_meteo_api_base: server.uri(),
        user_agent: "guildkeeper-tests".to_string(),
        ..WeatherConfig::default()
    }
}

pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        operator_tokens: vec![OPERATOR_TOKEN.to_string()],
        weather: weather_config(server),
        ..AppConfig::default()
    }
}

/// Builds the full service graph over a fresh database and `platform`.
pub async fn setup_services(config: AppConfig, platform: Arc<FakePlatform>) -> Result<Services> {
    let db = setup_test_db().await?;
    runtime::assemble(Arc::new(config), Arc::new(db), platform, zip_table())
}

/// Alert dependencies over a fresh store, fetching from `server`.
pub async fn setup_alert_context(
    platform: Arc<FakePlatform>,
    server: &MockServer,
) -> Result<AlertContext> {
    let store = setup_test_store().await?;
    Ok(AlertContext {
        platform,
        client: Arc::new(WeatherClient::new(&weather_config(server))?),
        zip_codes: Arc::new(zip_table()),
        profiles: WeatherProfileRepository::new(Arc::clone(&store)),
        stats: WeatherStatsRepository::new(store),
    })
}

/// Stores `zip_code` for `user_id` and turns on the `kind` subscription.
pub async fn subscribe(
    context: &AlertContext,
    user_id: UserId,
    zip_code: &str,
    kind: AlertKind,
) -> Result<()> {
    context.profiles.set_zip_code(user_id, zip_code).await?;
    context.profiles.set_alert(user_id, kind, true).await?;
    Ok(())
}

pub fn joined(day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).single()
}

pub fn guild(id: GuildId, name: &str, member_count: Option<u64>) -> GuildSummary {
    GuildSummary {
        id,
        name: name.to_string(),
        member_count,
        owner_id: Some(id * 10),
        joined_at: joined(1),
    }
}

/// Recording chat platform. Leaving a guild removes it from the guild list.
///
/// Like Discord, the guild listing omits owners and join times; `guild` and
/// `join_time` return them.
#[derive(Default)]
pub struct FakePlatform {
    guilds: Mutex<Vec<GuildSummary>>,
    direct: Mutex<Vec<(UserId, Embed)>>,
    channel: Mutex<Vec<(ChannelId, Embed)>>,
    left: Mutex<Vec<GuildId>>,
    unreachable: Mutex<HashSet<UserId>>,
    stuck: Mutex<HashSet<GuildId>>,
    audit: Mutex<HashMap<GuildId, Vec<BotAddEntry>>>,
    audit_forbidden: Mutex<HashSet<GuildId>>,
    rate_limited_members: Mutex<HashSet<GuildId>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_guilds(guilds: Vec<GuildSummary>) -> Arc<Self> {
        let platform = Self::default();
        *platform.guilds.lock().unwrap() = guilds;
        Arc::new(platform)
    }

    pub fn add_guild(&self, guild: GuildSummary) {
        self.guilds.lock().unwrap().push(guild);
    }

    /// Direct messages to `user_id` fail with a delivery error.
    pub fn make_unreachable(&self, user_id: UserId) {
        self.unreachable.lock().unwrap().insert(user_id);
    }

    /// Leaving `guild_id` fails with an HTTP error.
    pub fn make_stuck(&self, guild_id: GuildId) {
        self.stuck.lock().unwrap().insert(guild_id);
    }

    /// Audit-log reads for `guild_id` fail as if the bot lacked permission.
    pub fn forbid_audit_log(&self, guild_id: GuildId) {
        self.audit_forbidden.lock().unwrap().insert(guild_id);
    }

    /// Join-time lookups for `guild_id` fail with a rate limit.
    pub fn rate_limit_member_lookup(&self, guild_id: GuildId) {
        self.rate_limited_members.lock().unwrap().insert(guild_id);
    }

    pub fn record_bot_add(&self, guild_id: GuildId, adder: UserId) {
        self.audit.lock().unwrap().entry(guild_id).or_default().push(BotAddEntry {
            user_id: Some(adder),
            target_id: Some(BOT_ID),
        });
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.guilds.lock().unwrap().iter().map(|g| g.id).collect()
    }

    pub fn left(&self) -> Vec<GuildId> {
        self.left.lock().unwrap().clone()
    }

    pub fn direct_messages(&self) -> Vec<(UserId, Embed)> {
        self.direct.lock().unwrap().clone()
    }

    /// Titles of the direct messages delivered to `user_id`, in order.
    pub fn titles_for(&self, user_id: UserId) -> Vec<String> {
        self.direct
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user_id)
            .filter_map(|(_, embed)| embed.title.clone())
            .collect()
    }

    pub fn channel_posts(&self) -> Vec<(ChannelId, Embed)> {
        self.channel.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn wait_until_ready(&self) {}

    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError> {
        Ok(self
            .guilds
            .lock()
            .unwrap()
            .iter()
            .map(|g| GuildSummary {
                owner_id: None,
                joined_at: None,
                ..g.clone()
            })
            .collect())
    }

    async fn join_time(&self, guild_id: GuildId) -> Result<Option<DateTime<Utc>>, PlatformError> {
        if self.rate_limited_members.lock().unwrap().contains(&guild_id) {
            return Err(PlatformError::RateLimited {
                retry_after: Some(1.0),
            });
        }
        Ok(self
            .guilds
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == guild_id)
            .and_then(|g| g.joined_at))
    }

    async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildSummary>, PlatformError> {
        Ok(self
            .guilds
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == guild_id)
            .cloned())
    }

    async fn leave_guild(&self, guild_id: GuildId) -> Result<(), PlatformError> {
        if self.stuck.lock().unwrap().contains(&guild_id) {
            return Err(PlatformError::Http {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        let mut guilds = self.guilds.lock().unwrap();
        if let Some(index) = guilds.iter().position(|g| g.id == guild_id) {
            guilds.remove(index);
            self.left.lock().unwrap().push(guild_id);
        }
        Ok(())
    }

    async fn send_direct(&self, user_id: UserId, embed: &Embed) -> Result<(), PlatformError> {
        if self.unreachable.lock().unwrap().contains(&user_id) {
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
        guild_id: GuildId,
        limit: u8,
    ) -> Result<Vec<BotAddEntry>, PlatformError> {
        if self.audit_forbidden.lock().unwrap().contains(&guild_id) {
            return Err(PlatformError::Delivery {
                recipient: format!("guild {guild_id}"),
                reason: "Missing Permissions".to_string(),
            });
        }
        let audit = self.audit.lock().unwrap();
        Ok(audit
            .get(&guild_id)
            .map(|entries| entries.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        Ok(BOT_ID)
    }
}
