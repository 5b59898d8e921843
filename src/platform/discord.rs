//! Discord REST v10 implementation of [`ChatPlatform`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{
    BotAddEntry, ChannelId, ChatPlatform, Embed, GuildId, GuildSummary, PlatformError, UserId,
};
use crate::config::DiscordConfig;

/// Audit-log action type for a bot being added to a guild.
const BOT_ADD_ACTION: u8 = 28;
const GUILD_PAGE_SIZE: usize = 200;
const MAX_READY_BACKOFF: Duration = Duration::from_secs(60);
const RATE_LIMIT_RETRIES: u32 = 2;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

pub struct DiscordClient {
    http: Client,
    api_base: String,
    token: String,
    bot_user: OnceCell<UserId>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
}

/// Entry of `GET /users/@me/guilds`. Only says whether the bot owns the guild.
#[derive(Debug, Deserialize)]
struct PartialGuild {
    id: String,
    name: String,
    #[serde(default)]
    approximate_member_count: Option<u64>,
}

/// `GET /guilds/{id}`, which carries the owner.
#[derive(Debug, Deserialize)]
struct FullGuild {
    name: String,
    #[serde(default)]
    approximate_member_count: Option<u64>,
    #[serde(default)]
    owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AuditLog {
    #[serde(default)]
    audit_log_entries: Vec<AuditLogEntry>,
}

#[derive(Debug, Deserialize)]
struct AuditLogEntry {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: Option<f64>,
}

fn parse_snowflake(raw: &str) -> Result<u64, PlatformError> {
    raw.parse()
        .map_err(|_| PlatformError::Malformed(format!("invalid snowflake '{raw}'")))
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig, token: String) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .user_agent(concat!(
                "DiscordBot (guildkeeper, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            bot_user: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// GETs `path`, waiting out rate limits a bounded number of times.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let mut attempt = 0;
        let response = loop {
            let response = self.request(Method::GET, path).send().await?;
            match Self::check(response, path).await {
                Err(PlatformError::RateLimited { retry_after }) if attempt < RATE_LIMIT_RETRIES => {
                    attempt += 1;
                    let wait = retry_after
                        .filter(|secs| secs.is_finite() && *secs >= 0.0)
                        .map(Duration::from_secs_f64)
                        .unwrap_or(Duration::from_secs(1))
                        .min(MAX_RETRY_AFTER);
                    debug!(path, attempt, wait = ?wait, "Rate limited, retrying");
                    tokio::time::sleep(wait).await;
                }
                other => break other?,
            }
        };
        response
            .json::<T>()
            .await
            .map_err(|err| PlatformError::Malformed(format!("{path}: {err}")))
    }

    /// Maps non-success responses onto [`PlatformError`].
    async fn check(response: Response, resource: &str) -> Result<Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound(resource.to_string())),
            StatusCode::FORBIDDEN => Err(PlatformError::Delivery {
                recipient: resource.to_string(),
                reason: response.text().await.unwrap_or_default(),
            }),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .json::<RateLimitBody>()
                    .await
                    .ok()
                    .and_then(|body| body.retry_after);
                Err(PlatformError::RateLimited { retry_after })
            }
            _ => Err(PlatformError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn post_embed(&self, channel_id: ChannelId, embed: &Embed) -> Result<(), PlatformError> {
        let path = format!("/channels/{channel_id}/messages");
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await?;
        Self::check(response, &format!("channel {channel_id}")).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn wait_until_ready(&self) {
        let mut backoff = Duration::from_secs(1);
        loop {
            match self.bot_user_id().await {
                Ok(id) => {
                    info!(bot_user_id = id, "Discord client ready");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, retry_in = ?backoff, "Discord client not ready yet");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_READY_BACKOFF);
                }
            }
        }
    }

    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError> {
        let mut summaries = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut path = format!("/users/@me/guilds?with_counts=true&limit={GUILD_PAGE_SIZE}");
            if let Some(ref cursor) = after {
                path.push_str(&format!("&after={cursor}"));
            }
            let page: Vec<PartialGuild> = self.get_json(&path).await?;
            let page_len = page.len();
            after = page.last().map(|guild| guild.id.clone());

            for guild in page {
                summaries.push(GuildSummary {
                    id: parse_snowflake(&guild.id)?,
                    name: guild.name,
                    member_count: guild.approximate_member_count,
                    owner_id: None,
                    joined_at: None,
                });
            }

            if page_len < GUILD_PAGE_SIZE {
                break;
            }
        }

        debug!(count = summaries.len(), "Fetched guild list");
        Ok(summaries)
    }

    async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildSummary>, PlatformError> {
        let guild = match self
            .get_json::<FullGuild>(&format!("/guilds/{guild_id}?with_counts=true"))
            .await
        {
            Ok(guild) => guild,
            Err(PlatformError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let joined_at = match self.join_time(guild_id).await {
            Ok(joined_at) => joined_at,
            Err(err) => {
                warn!(guild_id, error = %err, "Join time lookup failed");
                None
            }
        };

        Ok(Some(GuildSummary {
            id: guild_id,
            name: guild.name,
            member_count: guild.approximate_member_count,
            owner_id: guild.owner_id.as_deref().map(parse_snowflake).transpose()?,
            joined_at,
        }))
    }

    async fn join_time(&self, guild_id: GuildId) -> Result<Option<DateTime<Utc>>, PlatformError> {
        let bot_id = self.bot_user_id().await?;
        match self
            .get_json::<GuildMember>(&format!("/guilds/{guild_id}/members/{bot_id}"))
            .await
        {
            Ok(member) => Ok(member.joined_at),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn leave_guild(&self, guild_id: GuildId) -> Result<(), PlatformError> {
        let path = format!("/users/@me/guilds/{guild_id}");
        let response = self.request(Method::DELETE, &path).send().await?;
        match Self::check(response, &format!("guild {guild_id}")).await {
            Ok(_) => Ok(()),
            Err(PlatformError::NotFound(_)) => {
                debug!(guild_id, "Guild already left");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn send_direct(&self, user_id: UserId, embed: &Embed) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, "/users/@me/channels")
            .json(&json!({ "recipient_id": user_id.to_string() }))
            .send()
            .await?;
        let channel: DmChannel = Self::check(response, &format!("user {user_id}"))
            .await?
            .json()
            .await
            .map_err(|err| PlatformError::Malformed(format!("dm channel: {err}")))?;
        let channel_id = parse_snowflake(&channel.id)?;

        match self.post_embed(channel_id, embed).await {
            // DMs closed surfaces as 403 on the message post.
            Err(PlatformError::Delivery { reason, .. }) => Err(PlatformError::Delivery {
                recipient: format!("user {user_id}"),
                reason,
            }),
            other => other,
        }
    }

    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        embed: &Embed,
    ) -> Result<(), PlatformError> {
        self.post_embed(channel_id, embed).await
    }

    async fn bot_add_entries(
        &self,
        guild_id: GuildId,
        limit: u8,
    ) -> Result<Vec<BotAddEntry>, PlatformError> {
        let log: AuditLog = self
            .get_json(&format!(
                "/guilds/{guild_id}/audit-logs?action_type={BOT_ADD_ACTION}&limit={limit}"
            ))
            .await?;

        log.audit_log_entries
            .into_iter()
            .map(|entry| {
                Ok(BotAddEntry {
                    user_id: entry.user_id.as_deref().map(parse_snowflake).transpose()?,
                    target_id: entry.target_id.as_deref().map(parse_snowflake).transpose()?,
                })
            })
            .collect()
    }

    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        self.bot_user
            .get_or_try_init(|| async {
                let user: CurrentUser = self.get_json("/users/@me").await?;
                parse_snowflake(&user.id)
            })
            .await
            .copied()
    }
}
