//! Predefined professional disclaimers attached to users.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::platform::{ChannelId, ChatPlatform, Embed, PlatformError, UserId};
use crate::repositories::DisclaimerRepository;
use crate::store::StoreError;

const LAWYER: &str = "This user is a licensed attorney; *however*, they are **not your personal legal representative**. **Any** information or opinions shared here are intended **solely for general informational purposes** and **should not be interpreted as legal advice**. Opinions expressed are **purely social remarks** and reflect **personal viewpoints**, **not** legal counsel. For tailored legal guidance or assistance specific to your situation, please consult with a qualified attorney who can provide professional advice based on your individual circumstances.";

const DOCTOR: &str = "This user is a licensed medical professional, but they are **not your personal doctor**. **Any** information or opinions shared here are intended for **general informational purposes only** and **should not be considered medical advice**. Opinions expressed are **purely social remarks** and **should not be relied upon for making health-related decisions**. If you feel immediately unwell or unsafe, **please** seek emergency assistance by calling your local emergency services or going to the nearest emergency room. For personalized medical guidance and treatment, consult directly with a qualified healthcare provider who can offer advice based on your specific health needs and conditions.";

const TRADER: &str = "This user is a professional or experienced trader, but they are **not your personal financial advisor**. **Any** information or opinions shared are intended for **general informational purposes only** and should **not** be considered trading or investment advice. Investing in financial markets involves **serious risk** and the **potential for significant financial loss**. The information provided **does not** take into account **your** individual financial situation, investment goals, **or** risk tolerance. For personalized investment advice and strategies, please consult with a licensed financial advisor or investment professional who can offer recommendations based on your specific circumstances. **Always** conduct your own research and consider **your** risk tolerance before making **any** investment decisions.";

const REVEAL_COLOR: u32 = 0xE67E22;

pub const PROFESSIONS: [(&str, &str); 3] = [("lawyer", LAWYER), ("doctor", DOCTOR), ("trader", TRADER)];

/// Disclaimer text for a profession, matched case-insensitively.
pub fn disclaimer_for(profession: &str) -> Option<&'static str> {
    let profession = profession.trim().to_lowercase();
    PROFESSIONS
        .iter()
        .find(|(name, _)| *name == profession)
        .map(|(_, text)| *text)
}

#[derive(Debug, Error)]
pub enum DisclaimerError {
    #[error("no predefined disclaimer found for profession: {0}")]
    UnknownProfession(String),
    #[error("user {0} has no disclaimers")]
    NoDisclaimers(UserId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DisclaimerChange {
    pub profession: String,
    pub disclaimer: String,
    /// `false` when the operation was a no-op.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProfessionCount {
    pub profession: String,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DisclaimerReveal {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub disclaimers: Vec<String>,
}

#[derive(Clone)]
pub struct DisclaimerService {
    repository: DisclaimerRepository,
    platform: Arc<dyn ChatPlatform>,
}

impl DisclaimerService {
    pub fn new(repository: DisclaimerRepository, platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            repository,
            platform,
        }
    }

    pub async fn add(
        &self,
        user_id: UserId,
        profession: &str,
    ) -> Result<DisclaimerChange, DisclaimerError> {
        let text = Self::resolve(profession)?;
        let changed = self.repository.add(user_id, text).await?;
        Ok(DisclaimerChange {
            profession: profession.trim().to_lowercase(),
            disclaimer: text.to_string(),
            changed,
        })
    }

    pub async fn remove(
        &self,
        user_id: UserId,
        profession: &str,
    ) -> Result<DisclaimerChange, DisclaimerError> {
        let text = Self::resolve(profession)?;
        let changed = self.repository.remove(user_id, text).await?;
        Ok(DisclaimerChange {
            profession: profession.trim().to_lowercase(),
            disclaimer: text.to_string(),
            changed,
        })
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<String>, DisclaimerError> {
        Ok(self.repository.list(user_id).await?)
    }

    /// Users carrying each profession's disclaimer, in catalog order.
    pub async fn stats(&self) -> Result<Vec<ProfessionCount>, DisclaimerError> {
        let users = self.repository.all().await?;
        Ok(PROFESSIONS
            .iter()
            .map(|(name, text)| ProfessionCount {
                profession: name.to_string(),
                users: users
                    .iter()
                    .filter(|(_, texts)| texts.iter().any(|t| t == text))
                    .count(),
            })
            .collect())
    }

    /// Posts a user's disclaimers to `channel_id`, as when someone asks
    /// about a tagged user's message.
    pub async fn reveal(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<DisclaimerReveal, DisclaimerError> {
        let disclaimers = self.repository.list(user_id).await?;
        if disclaimers.is_empty() {
            return Err(DisclaimerError::NoDisclaimers(user_id));
        }

        self.platform
            .send_to_channel(channel_id, &reveal_embed(user_id, &disclaimers))
            .await?;
        info!(user_id, channel_id, count = disclaimers.len(), "Disclaimers revealed");

        Ok(DisclaimerReveal {
            user_id,
            channel_id,
            disclaimers,
        })
    }

    /// One embed page per predefined profession, for paginated browsing.
    pub fn profession_pages() -> Vec<Embed> {
        PROFESSIONS
            .iter()
            .enumerate()
            .map(|(index, (name, text))| {
                Embed::new(format!("Disclaimer: {name}"))
                    .description(*text)
                    .footer(format!("Page {}/{}", index + 1, PROFESSIONS.len()))
            })
            .collect()
    }

    fn resolve(profession: &str) -> Result<&'static str, DisclaimerError> {
        disclaimer_for(profession)
            .ok_or_else(|| DisclaimerError::UnknownProfession(profession.to_string()))
    }
}

fn reveal_embed(user_id: UserId, disclaimers: &[String]) -> Embed {
    Embed::new("Disclaimer")
        .description(format!("<@{user_id}>\n{}", disclaimers.join("\n")))
        .color(REVEAL_COLOR)
}
