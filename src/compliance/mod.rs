//! # Guild compliance
//!
//! Decides which guilds the bot must leave given the global
//! [`ComplianceSettings`], and enforces those decisions periodically and when
//! the bot joins a new guild.

pub mod enforcer;
pub mod notices;

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use crate::platform::GuildSummary;
use crate::repositories::ComplianceSettings;

pub use enforcer::{ComplianceEnforcer, EnforcementReport, LeftGuild};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Blocked,
    NotAllowed,
    TooSmall,
    OverMaxGuilds,
}

impl LeaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Blocked => "blocked",
            LeaveReason::NotAllowed => "not allowed",
            LeaveReason::TooSmall => "too small",
            LeaveReason::OverMaxGuilds => "over max_guilds",
        }
    }
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveDecision {
    pub guild: GuildSummary,
    pub reason: LeaveReason,
}

/// Compliance verdict for a single guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GuildComplianceStatus {
    EnforcementDisabled,
    Blocked { reason: Option<String> },
    NotAllowed,
    TooSmall { member_count: u64, min_member_count: u64 },
    Compliant,
}

fn predicate_reason(settings: &ComplianceSettings, guild: &GuildSummary) -> Option<LeaveReason> {
    if settings.is_blocked(guild.id) {
        return Some(LeaveReason::Blocked);
    }
    if !settings.allowed_guilds.is_empty() && !settings.allowed_guilds.contains(&guild.id) {
        return Some(LeaveReason::NotAllowed);
    }
    if settings.min_member_count > 0
        && guild
            .member_count
            .is_some_and(|count| count < settings.min_member_count)
    {
        return Some(LeaveReason::TooSmall);
    }
    None
}

/// Every guild the bot should leave, in the order leaves should happen.
///
/// Predicate leaves come first in input order. If the remaining guilds still
/// exceed `max_guilds`, the oldest `max_guilds` by join time are kept (unknown
/// join time counts as oldest) and the rest are left newest first.
pub fn evaluate(settings: &ComplianceSettings, guilds: &[GuildSummary]) -> Vec<LeaveDecision> {
    if !settings.requirements_enabled {
        return Vec::new();
    }

    let mut decisions = Vec::new();
    let mut remaining = Vec::new();
    for guild in guilds {
        match predicate_reason(settings, guild) {
            Some(reason) => decisions.push(LeaveDecision {
                guild: guild.clone(),
                reason,
            }),
            None => remaining.push(guild),
        }
    }

    let max = settings.max_guilds as usize;
    if max > 0 && remaining.len() > max {
        // Stable sort keeps input order among equal join times.
        remaining.sort_by_key(|guild| guild.joined_at);
        decisions.extend(remaining[max..].iter().rev().map(|guild| LeaveDecision {
            guild: (*guild).clone(),
            reason: LeaveReason::OverMaxGuilds,
        }));
    }

    decisions
}

pub fn guild_status(settings: &ComplianceSettings, guild: &GuildSummary) -> GuildComplianceStatus {
    if !settings.requirements_enabled {
        return GuildComplianceStatus::EnforcementDisabled;
    }
    match predicate_reason(settings, guild) {
        Some(LeaveReason::Blocked) => GuildComplianceStatus::Blocked {
            reason: settings.block_reason(guild.id).map(str::to_string),
        },
        Some(LeaveReason::NotAllowed) => GuildComplianceStatus::NotAllowed,
        Some(LeaveReason::TooSmall) => GuildComplianceStatus::TooSmall {
            member_count: guild.member_count.unwrap_or_default(),
            min_member_count: settings.min_member_count,
        },
        Some(LeaveReason::OverMaxGuilds) | None => GuildComplianceStatus::Compliant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    fn guild(id: u64, members: u64, joined: Option<DateTime<Utc>>) -> GuildSummary {
        GuildSummary {
            id,
            name: format!("guild-{id}"),
            member_count: Some(members),
            owner_id: Some(1000 + id),
            joined_at: joined,
        }
    }

    fn enabled() -> ComplianceSettings {
        ComplianceSettings {
            requirements_enabled: true,
            ..ComplianceSettings::default()
        }
    }

    fn ids(decisions: &[LeaveDecision]) -> Vec<(u64, LeaveReason)> {
        decisions.iter().map(|d| (d.guild.id, d.reason)).collect()
    }

    #[test]
    fn test_disabled_enforcement_leaves_nothing() {
        let mut settings = enabled();
        settings.requirements_enabled = false;
        settings.blocked_guilds = vec![1];
        assert!(evaluate(&settings, &[guild(1, 10, None)]).is_empty());
    }

    #[test]
    fn test_predicates_apply_in_priority_order() {
        let mut settings = enabled();
        settings.blocked_guilds = vec![1];
        settings.allowed_guilds = vec![1, 3];
        settings.min_member_count = 50;

        let guilds = [guild(1, 100, None), guild(2, 100, None), guild(3, 10, None), guild(4, 5, None)];
        assert_eq!(
            ids(&evaluate(&settings, &guilds)),
            vec![
                (1, LeaveReason::Blocked),
                (2, LeaveReason::NotAllowed),
                (3, LeaveReason::TooSmall),
                (4, LeaveReason::NotAllowed),
            ]
        );
    }

    #[test]
    fn test_unknown_member_count_is_not_too_small() {
        let mut settings = enabled();
        settings.min_member_count = 50;
        let mut unknown = guild(1, 0, None);
        unknown.member_count = None;
        assert!(evaluate(&settings, &[unknown]).is_empty());
    }

    #[test]
    fn test_max_guilds_keeps_oldest_and_leaves_newest_first() {
        let mut settings = enabled();
        settings.max_guilds = 2;
        let guilds = [
            guild(3, 10, Some(at(3))),
            guild(1, 10, Some(at(1))),
            guild(4, 10, Some(at(4))),
            guild(2, 10, Some(at(2))),
        ];

        assert_eq!(
            ids(&evaluate(&settings, &guilds)),
            vec![(4, LeaveReason::OverMaxGuilds), (3, LeaveReason::OverMaxGuilds)]
        );
    }

    #[test]
    fn test_max_guilds_counts_only_guilds_surviving_predicates() {
        let mut settings = enabled();
        settings.max_guilds = 2;
        settings.blocked_guilds = vec![1];
        let guilds = [
            guild(1, 10, Some(at(1))),
            guild(2, 10, Some(at(2))),
            guild(3, 10, Some(at(3))),
        ];
        assert_eq!(ids(&evaluate(&settings, &guilds)), vec![(1, LeaveReason::Blocked)]);
    }

    #[test]
    fn test_unknown_join_time_sorts_as_oldest() {
        let mut settings = enabled();
        settings.max_guilds = 1;
        let guilds = [guild(1, 10, Some(at(1))), guild(2, 10, None)];
        assert_eq!(
            ids(&evaluate(&settings, &guilds)),
            vec![(1, LeaveReason::OverMaxGuilds)]
        );
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut settings = enabled();
        settings.max_guilds = 1;
        settings.min_member_count = 5;
        let guilds = [guild(1, 2, Some(at(2))), guild(2, 10, Some(at(1))), guild(3, 10, Some(at(3)))];
        assert_eq!(evaluate(&settings, &guilds), evaluate(&settings, &guilds));
    }

    #[test]
    fn test_guild_status_variants() {
        let mut settings = enabled();
        settings.blocked_guilds = vec![1];
        settings
            .blocked_guild_reasons
            .insert("1".to_string(), "raids".to_string());
        settings.min_member_count = 20;

        assert_eq!(
            guild_status(&settings, &guild(1, 100, None)),
            GuildComplianceStatus::Blocked {
                reason: Some("raids".to_string())
            }
        );
        assert_eq!(
            guild_status(&settings, &guild(2, 5, None)),
            GuildComplianceStatus::TooSmall {
                member_count: 5,
                min_member_count: 20
            }
        );
        assert_eq!(
            guild_status(&settings, &guild(3, 50, None)),
            GuildComplianceStatus::Compliant
        );

        settings.requirements_enabled = false;
        assert_eq!(
            guild_status(&settings, &guild(1, 100, None)),
            GuildComplianceStatus::EnforcementDisabled
        );
    }
}
