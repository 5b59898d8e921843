use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    monitor::{Check, MonitorError, TickReport},
    platform::{ChatPlatform, Embed, GuildId, GuildSummary, PlatformError, UserId},
    repositories::{
        ComplianceSettings, ComplianceSettingsRepository,
        compliance_settings::DEFAULT_ENFORCEMENT_INTERVAL_SECONDS,
    },
};

use super::{LeaveReason, evaluate, notices};

const INVITER_LOOKUP_LIMIT: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeftGuild {
    pub guild_id: GuildId,
    pub name: String,
    pub reason: LeaveReason,
}

/// Outcome of one enforcement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct EnforcementReport {
    pub evaluated: u64,
    pub left: Vec<LeftGuild>,
    /// Guilds that should have been left but the leave call failed.
    pub failed: Vec<GuildId>,
}

#[derive(Clone)]
pub struct ComplianceEnforcer {
    platform: Arc<dyn ChatPlatform>,
    settings: ComplianceSettingsRepository,
}

impl ComplianceEnforcer {
    pub fn new(platform: Arc<dyn ChatPlatform>, settings: ComplianceSettingsRepository) -> Self {
        Self { platform, settings }
    }

    pub fn settings(&self) -> &ComplianceSettingsRepository {
        &self.settings
    }

    /// Leaves every non-compliant guild and reports the leaves to the log
    /// channel, if one is configured.
    #[instrument(skip_all)]
    pub async fn enforce(&self) -> Result<EnforcementReport, MonitorError> {
        let settings = self.settings.snapshot().await?;
        if !settings.requirements_enabled {
            return Ok(EnforcementReport::default());
        }

        let mut guilds = self.platform.guilds().await?;
        if settings.max_guilds > 0 && guilds.len() as u64 > settings.max_guilds {
            self.fill_join_times(&mut guilds).await;
        }
        let mut report = EnforcementReport {
            evaluated: guilds.len() as u64,
            ..EnforcementReport::default()
        };

        for decision in evaluate(&settings, &guilds) {
            let guild = decision.guild;
            if decision.reason == LeaveReason::Blocked {
                let notice = notices::block_notice(&guild, settings.block_reason(guild.id));
                self.notify_inviter(&guild, &notice).await;
            }

            match self.platform.leave_guild(guild.id).await {
                Ok(()) => {
                    counter!("compliance_guilds_left_total", "reason" => decision.reason.as_str())
                        .increment(1);
                    info!(guild_id = guild.id, reason = %decision.reason, "Left guild");
                    report.left.push(LeftGuild {
                        guild_id: guild.id,
                        name: guild.name,
                        reason: decision.reason,
                    });
                }
                Err(err) => {
                    warn!(guild_id = guild.id, reason = %decision.reason, error = %err, "Failed to leave guild");
                    report.failed.push(guild.id);
                }
            }
        }

        if !report.left.is_empty() {
            self.post_summary(&settings, &report).await;
        }

        Ok(report)
    }

    /// Checks a newly joined guild. Returns the reason the bot left, if it did.
    #[instrument(skip_all, fields(guild_id = guild.id))]
    pub async fn on_guild_join(
        &self,
        guild: &GuildSummary,
    ) -> Result<Option<LeaveReason>, MonitorError> {
        let settings = self.settings.snapshot().await?;

        let reason = if settings.max_guilds > 0
            && self.platform.guilds().await?.len() as u64 > settings.max_guilds
        {
            let notice = notices::waitlist_notice(guild, settings.max_guilds);
            self.notify_inviter(guild, &notice).await;
            LeaveReason::OverMaxGuilds
        } else if settings.is_blocked(guild.id) {
            let notice = notices::block_notice(guild, settings.block_reason(guild.id));
            self.notify_inviter(guild, &notice).await;
            LeaveReason::Blocked
        } else {
            return Ok(None);
        };

        self.platform.leave_guild(guild.id).await?;
        counter!("compliance_guilds_left_total", "reason" => reason.as_str()).increment(1);
        info!(reason = %reason, "Left newly joined guild");
        Ok(Some(reason))
    }

    /// Join times are only needed to rank guilds for `max_guilds`. A failed
    /// lookup leaves the join time unknown.
    async fn fill_join_times(&self, guilds: &mut [GuildSummary]) {
        for guild in guilds.iter_mut().filter(|guild| guild.joined_at.is_none()) {
            match self.platform.join_time(guild.id).await {
                Ok(joined_at) => guild.joined_at = joined_at,
                Err(err) => warn!(guild_id = guild.id, error = %err, "Join time lookup failed"),
            }
        }
    }

    /// The user who added the bot, falling back to the guild owner.
    pub async fn resolve_inviter(&self, guild: &GuildSummary) -> Option<UserId> {
        match self.find_adder(guild.id).await {
            Ok(Some(user_id)) => return Some(user_id),
            Ok(None) => {}
            Err(err) => warn!(guild_id = guild.id, error = %err, "Audit log lookup failed"),
        }
        if guild.owner_id.is_some() {
            return guild.owner_id;
        }
        // Guild listings do not carry the owner.
        match self.platform.guild(guild.id).await {
            Ok(details) => details.and_then(|details| details.owner_id),
            Err(err) => {
                warn!(guild_id = guild.id, error = %err, "Guild owner lookup failed");
                None
            }
        }
    }

    async fn find_adder(&self, guild_id: GuildId) -> Result<Option<UserId>, PlatformError> {
        let bot_id = self.platform.bot_user_id().await?;
        let entries = self
            .platform
            .bot_add_entries(guild_id, INVITER_LOOKUP_LIMIT)
            .await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.target_id == Some(bot_id))
            .and_then(|entry| entry.user_id))
    }

    async fn notify_inviter(&self, guild: &GuildSummary, notice: &Embed) {
        let Some(user_id) = self.resolve_inviter(guild).await else {
            warn!(guild_id = guild.id, "No inviter or owner to notify");
            return;
        };
        if let Err(err) = self.platform.send_direct(user_id, notice).await {
            warn!(guild_id = guild.id, user_id, error = %err, "Could not notify inviter");
        }
    }

    async fn post_summary(&self, settings: &ComplianceSettings, report: &EnforcementReport) {
        let Some(channel_id) = settings.log_channel else {
            return;
        };
        let summary = notices::enforcement_summary(&report.left);
        if let Err(err) = self.platform.send_to_channel(channel_id, &summary).await {
            warn!(channel_id, error = %err, "Failed to post enforcement summary");
        }
    }
}

#[async_trait]
impl Check for ComplianceEnforcer {
    fn name(&self) -> &'static str {
        "compliance"
    }

    async fn interval(&self) -> Duration {
        match self.settings.enforcement_interval().await {
            Ok(interval) => interval,
            Err(err) => {
                warn!(error = %err, "Falling back to default enforcement interval");
                Duration::from_secs(DEFAULT_ENFORCEMENT_INTERVAL_SECONDS)
            }
        }
    }

    async fn tick(&self) -> Result<TickReport, MonitorError> {
        let report = self.enforce().await?;
        Ok(TickReport {
            evaluated: report.evaluated,
            acted: report.left.len() as u64,
            skipped: 0,
            failed: report.failed.len() as u64,
        })
    }
}
