//! # Compliance Settings Repository
//!
//! Global guild-compliance settings. Every field lives under its own global
//! key so concurrent admin operations on different settings do not contend.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::platform::{ChannelId, GuildId};
use crate::store::{ConfigKey, ConfigStore, StoreError};

const REQUIREMENTS_ENABLED: &str = "requirements_enabled";
const ALLOWED_GUILDS: &str = "allowed_guilds";
const BLOCKED_GUILDS: &str = "blocked_guilds";
const BLOCKED_GUILD_REASONS: &str = "blocked_guild_reasons";
const MIN_MEMBER_COUNT: &str = "min_member_count";
const MAX_GUILDS: &str = "max_guilds";
const ENFORCEMENT_INTERVAL: &str = "enforcement_interval";
const LOG_CHANNEL: &str = "log_channel";

pub const DEFAULT_ENFORCEMENT_INTERVAL_SECONDS: u64 = 3600;

/// Snapshot of every compliance setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComplianceSettings {
    pub requirements_enabled: bool,
    pub allowed_guilds: Vec<GuildId>,
    pub blocked_guilds: Vec<GuildId>,
    /// Block reasons keyed by guild id.
    pub blocked_guild_reasons: BTreeMap<String, String>,
    pub min_member_count: u64,
    /// Zero means unlimited.
    pub max_guilds: u64,
    pub enforcement_interval: u64,
    pub log_channel: Option<ChannelId>,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            requirements_enabled: false,
            allowed_guilds: Vec::new(),
            blocked_guilds: Vec::new(),
            blocked_guild_reasons: BTreeMap::new(),
            min_member_count: 0,
            max_guilds: 0,
            enforcement_interval: DEFAULT_ENFORCEMENT_INTERVAL_SECONDS,
            log_channel: None,
        }
    }
}

impl ComplianceSettings {
    pub fn is_blocked(&self, guild_id: GuildId) -> bool {
        self.blocked_guilds.contains(&guild_id)
    }

    pub fn block_reason(&self, guild_id: GuildId) -> Option<&str> {
        self.blocked_guild_reasons
            .get(&guild_id.to_string())
            .map(String::as_str)
    }
}

/// Result of toggling a guild on a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListToggle {
    Added,
    Removed,
}

#[derive(Clone)]
pub struct ComplianceSettingsRepository {
    store: Arc<dyn ConfigStore>,
    /// Serialises block-list toggles, which touch two keys.
    blocklist: Arc<Mutex<()>>,
}

impl ComplianceSettingsRepository {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            blocklist: Arc::new(Mutex::new(())),
        }
    }

    pub async fn snapshot(&self) -> Result<ComplianceSettings, StoreError> {
        let defaults = ComplianceSettings::default();
        Ok(ComplianceSettings {
            requirements_enabled: self
                .store
                .load_opt(&ConfigKey::global(REQUIREMENTS_ENABLED))
                .await?
                .unwrap_or(defaults.requirements_enabled),
            allowed_guilds: self.store.load(&ConfigKey::global(ALLOWED_GUILDS)).await?,
            blocked_guilds: self.store.load(&ConfigKey::global(BLOCKED_GUILDS)).await?,
            blocked_guild_reasons: self
                .store
                .load(&ConfigKey::global(BLOCKED_GUILD_REASONS))
                .await?,
            min_member_count: self.store.load(&ConfigKey::global(MIN_MEMBER_COUNT)).await?,
            max_guilds: self.store.load(&ConfigKey::global(MAX_GUILDS)).await?,
            enforcement_interval: self.enforcement_interval_seconds().await?,
            log_channel: self.store.load_opt(&ConfigKey::global(LOG_CHANNEL)).await?,
        })
    }

    pub async fn enforcement_interval_seconds(&self) -> Result<u64, StoreError> {
        Ok(self
            .store
            .load_opt(&ConfigKey::global(ENFORCEMENT_INTERVAL))
            .await?
            .unwrap_or(DEFAULT_ENFORCEMENT_INTERVAL_SECONDS))
    }

    pub async fn enforcement_interval(&self) -> Result<Duration, StoreError> {
        Ok(Duration::from_secs(self.enforcement_interval_seconds().await?))
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::global(REQUIREMENTS_ENABLED), &enabled)
            .await
    }

    pub async fn toggle_allowed(&self, guild_id: GuildId) -> Result<ListToggle, StoreError> {
        let allowed: Vec<GuildId> = self
            .store
            .modify(&ConfigKey::global(ALLOWED_GUILDS), move |guilds: &mut Vec<GuildId>| {
                toggle(guilds, guild_id);
            })
            .await?;
        Ok(if allowed.contains(&guild_id) {
            ListToggle::Added
        } else {
            ListToggle::Removed
        })
    }

    /// Blocks or unblocks a guild. A reason is kept only while blocked.
    ///
    /// The reason is written before the guild joins the block list and
    /// dropped after it leaves, so readers never see a blocked guild lose
    /// its reason.
    pub async fn toggle_blocked(
        &self,
        guild_id: GuildId,
        reason: Option<String>,
    ) -> Result<ListToggle, StoreError> {
        let _guard = self.blocklist.lock().await;
        let blocked: Vec<GuildId> = self.store.load(&ConfigKey::global(BLOCKED_GUILDS)).await?;
        let blocking = !blocked.contains(&guild_id);
        let reason = reason.filter(|r| !r.trim().is_empty());

        if blocking {
            if let Some(reason) = reason {
                self.store
                    .modify(
                        &ConfigKey::global(BLOCKED_GUILD_REASONS),
                        move |reasons: &mut BTreeMap<String, String>| {
                            reasons.insert(guild_id.to_string(), reason);
                        },
                    )
                    .await?;
            }
            self.store
                .modify(&ConfigKey::global(BLOCKED_GUILDS), move |guilds: &mut Vec<GuildId>| {
                    if !guilds.contains(&guild_id) {
                        guilds.push(guild_id);
                    }
                })
                .await?;
            return Ok(ListToggle::Added);
        }

        self.store
            .modify(&ConfigKey::global(BLOCKED_GUILDS), move |guilds: &mut Vec<GuildId>| {
                guilds.retain(|id| *id != guild_id);
            })
            .await?;
        self.store
            .modify(
                &ConfigKey::global(BLOCKED_GUILD_REASONS),
                move |reasons: &mut BTreeMap<String, String>| {
                    reasons.remove(&guild_id.to_string());
                },
            )
            .await?;
        Ok(ListToggle::Removed)
    }

    pub async fn set_min_member_count(&self, count: u64) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::global(MIN_MEMBER_COUNT), &count)
            .await
    }

    pub async fn set_max_guilds(&self, max: u64) -> Result<(), StoreError> {
        self.store.store(&ConfigKey::global(MAX_GUILDS), &max).await
    }

    pub async fn set_enforcement_interval(&self, seconds: u64) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::global(ENFORCEMENT_INTERVAL), &seconds)
            .await
    }

    pub async fn set_log_channel(&self, channel: Option<ChannelId>) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::global(LOG_CHANNEL), &channel)
            .await
    }
}

fn toggle(guilds: &mut Vec<GuildId>, guild_id: GuildId) {
    if let Some(position) = guilds.iter().position(|id| *id == guild_id) {
        guilds.remove(position);
    } else {
        guilds.push(guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DbConfigStore;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn repository() -> ComplianceSettingsRepository {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        ComplianceSettingsRepository::new(Arc::new(DbConfigStore::new(Arc::new(db))))
    }

    #[tokio::test]
    async fn test_snapshot_defaults_are_permissive() {
        let repo = repository().await;
        assert_eq!(repo.snapshot().await.unwrap(), ComplianceSettings::default());
        assert_eq!(
            repo.enforcement_interval().await.unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[tokio::test]
    async fn test_toggle_allowed_adds_then_removes() {
        let repo = repository().await;
        assert_eq!(repo.toggle_allowed(10).await.unwrap(), ListToggle::Added);
        assert_eq!(repo.snapshot().await.unwrap().allowed_guilds, vec![10]);
        assert_eq!(repo.toggle_allowed(10).await.unwrap(), ListToggle::Removed);
        assert!(repo.snapshot().await.unwrap().allowed_guilds.is_empty());
    }

    #[tokio::test]
    async fn test_unblock_removes_reason() {
        let repo = repository().await;
        repo.toggle_blocked(7, Some("spam".to_string()))
            .await
            .unwrap();
        let settings = repo.snapshot().await.unwrap();
        assert!(settings.is_blocked(7));
        assert_eq!(settings.block_reason(7), Some("spam"));

        assert_eq!(
            repo.toggle_blocked(7, None).await.unwrap(),
            ListToggle::Removed
        );
        let settings = repo.snapshot().await.unwrap();
        assert!(!settings.is_blocked(7));
        assert_eq!(settings.block_reason(7), None);
    }

    #[tokio::test]
    async fn test_concurrent_block_toggles_keep_reason_consistent() {
        let repo = repository().await;

        let (first, second) = tokio::join!(
            repo.toggle_blocked(7, Some("spam".to_string())),
            repo.toggle_blocked(7, Some("raids".to_string()))
        );

        let mut outcomes = [first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|outcome| *outcome == ListToggle::Removed);
        assert_eq!(outcomes, [ListToggle::Added, ListToggle::Removed]);
        let settings = repo.snapshot().await.unwrap();
        assert!(!settings.is_blocked(7));
        assert!(settings.blocked_guild_reasons.is_empty());
    }

    #[tokio::test]
    async fn test_setters_persist() {
        let repo = repository().await;
        repo.set_enabled(true).await.unwrap();
        repo.set_min_member_count(25).await.unwrap();
        repo.set_max_guilds(3).await.unwrap();
        repo.set_enforcement_interval(120).await.unwrap();
        repo.set_log_channel(Some(555)).await.unwrap();

        let settings = repo.snapshot().await.unwrap();
        assert!(settings.requirements_enabled);
        assert_eq!(settings.min_member_count, 25);
        assert_eq!(settings.max_guilds, 3);
        assert_eq!(settings.enforcement_interval, 120);
        assert_eq!(settings.log_channel, Some(555));

        repo.set_log_channel(None).await.unwrap();
        assert_eq!(repo.snapshot().await.unwrap().log_channel, None);
    }
}
