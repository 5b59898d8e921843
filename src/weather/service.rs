//! # Weather Service
//!
//! User-facing weather operations: profile management, nowcasts, forecasts,
//! alert and glossary lookups, and the usage/records views.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::{
    AlertKind, WeatherError,
    alerts::AlertContext,
    client::{AlertFeature, CurrentValues, ForecastPeriod},
    notices::{self, LightningCategory},
    records::RecordKind,
};
use crate::{
    browse::PageObserver,
    platform::{Embed, UserId},
    repositories::{
        WeatherProfile, WeatherStatsRepository,
        weather_stats::{
            FORECASTS_FETCHED, GLOSSARY_DEFINITIONS_SHOWN, NOWCASTS_FETCHED, RecordEntry,
            WeatherCounters,
        },
    },
    store::{ConfigKey, KeyLocks},
    summary::{Summarizer, alerts_digest},
};

/// Active alerts for a nowcast, or why they could not be fetched.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlertStatus {
    Available { alerts: Vec<AlertFeature> },
    Unavailable { error: String },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NowcastReport {
    pub zip_code: String,
    pub conditions: CurrentValues,
    pub wind_direction: Option<String>,
    pub lightning: LightningCategory,
    pub alerts: AlertStatus,
    pub summary: Option<String>,
    /// Running records beaten by this observation.
    pub records_updated: Vec<RecordKind>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForecastReport {
    pub zip_code: String,
    pub periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriberCounts {
    pub severe: usize,
    pub freeze: usize,
    pub heat: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeatherUsage {
    pub counters: WeatherCounters,
    pub subscribers: SubscriberCounts,
}

/// Active alerts at a user's saved location.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserAlerts {
    pub user_id: UserId,
    pub zip_code: String,
    pub alerts: Vec<AlertFeature>,
}

/// Counts every glossary page delivered in a browse session.
struct GlossaryViews {
    stats: WeatherStatsRepository,
}

#[async_trait]
impl PageObserver for GlossaryViews {
    async fn page_shown(&self, _index: usize) {
        if let Err(err) = self.stats.increment(GLOSSARY_DEFINITIONS_SHOWN, 1).await {
            warn!(error = %err, "Failed to count glossary view");
        }
    }
}

#[derive(Clone)]
pub struct WeatherService {
    context: AlertContext,
    summarizer: Arc<Summarizer>,
    toggles: KeyLocks,
}

impl WeatherService {
    pub fn new(context: AlertContext, summarizer: Arc<Summarizer>) -> Self {
        Self {
            context,
            summarizer,
            toggles: KeyLocks::new(),
        }
    }

    pub async fn profile(&self, user_id: UserId) -> Result<WeatherProfile, WeatherError> {
        Ok(self.context.profiles.profile(user_id).await?)
    }

    /// Stores a postal code after checking it against the bundled table.
    pub async fn set_zip_code(&self, user_id: UserId, zip_code: &str) -> Result<(), WeatherError> {
        let zip_code = zip_code.trim();
        if self.context.zip_codes.lookup(zip_code).is_none() {
            return Err(WeatherError::UnknownZipCode(zip_code.to_string()));
        }
        self.context.profiles.set_zip_code(user_id, zip_code).await?;
        Ok(())
    }

    /// Flips an alert subscription and returns the new state.
    ///
    /// Turning severe alerts on first sends an example alert. If that cannot
    /// be delivered the subscription stays off and the delivery error is
    /// returned.
    #[instrument(skip(self))]
    pub async fn toggle_alert(&self, user_id: UserId, kind: AlertKind) -> Result<bool, WeatherError> {
        // Held across the example delivery so concurrent toggles cannot both
        // act on the same prior state.
        let _guard = self
            .toggles
            .lock(&ConfigKey::user(user_id, kind.flag_field()))
            .await;
        let profiles = &self.context.profiles;

        if kind == AlertKind::Severe && !profiles.alert_enabled(user_id, kind).await? {
            self.context
                .platform
                .send_direct(user_id, &notices::example_severe_alert())
                .await?;
        }

        let enabled = profiles.toggle_alert(user_id, kind).await?;
        info!(enabled, "Alert subscription updated");
        Ok(enabled)
    }

    /// Active alerts for the zip code saved in the user's profile.
    #[instrument(skip(self))]
    pub async fn alerts_for_user(&self, user_id: UserId) -> Result<UserAlerts, WeatherError> {
        let zip_code = self
            .context
            .profiles
            .zip_code(user_id)
            .await?
            .ok_or(WeatherError::MissingZipCode)?;
        let at = self.context.zip_codes.resolve(Some(&zip_code))?;
        let alerts = self.context.client.active_alerts(at).await?;
        Ok(UserAlerts {
            user_id,
            zip_code,
            alerts,
        })
    }

    /// Forecast pages for `zip_code`, or for the user's saved zip code.
    pub async fn forecast_pages(
        &self,
        user_id: UserId,
        zip_code: Option<&str>,
    ) -> Result<Vec<Embed>, WeatherError> {
        let zip_code = match zip_code {
            Some(zip_code) => zip_code.to_string(),
            None => self
                .context
                .profiles
                .zip_code(user_id)
                .await?
                .ok_or(WeatherError::MissingZipCode)?,
        };
        let report = self.forecast(&zip_code).await?;
        Ok(notices::forecast_pages(&report.periods))
    }

    /// Glossary pages whose term contains `search` (case-insensitive), or
    /// every page without a search. Entries missing a term or definition are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn glossary_pages(&self, search: Option<&str>) -> Result<Vec<Embed>, WeatherError> {
        let needle = search
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);
        let terms = self.context.client.glossary().await?;
        Ok(terms
            .iter()
            .filter_map(|entry| Some((entry.term.as_deref()?, entry.definition.as_deref()?)))
            .filter(|(term, _)| {
                needle
                    .as_ref()
                    .is_none_or(|needle| term.to_lowercase().contains(needle))
            })
            .map(|(term, definition)| notices::glossary_page(term, definition))
            .collect())
    }

    /// Observer that counts delivered glossary pages.
    pub fn glossary_views(&self) -> Arc<dyn PageObserver> {
        Arc::new(GlossaryViews {
            stats: self.context.stats.clone(),
        })
    }

    pub async fn usage(&self) -> Result<WeatherUsage, WeatherError> {
        let profiles = &self.context.profiles;
        Ok(WeatherUsage {
            counters: self.context.stats.counters().await?,
            subscribers: SubscriberCounts {
                severe: profiles.subscriber_count(AlertKind::Severe).await?,
                freeze: profiles.subscriber_count(AlertKind::Freeze).await?,
                heat: profiles.subscriber_count(AlertKind::Heat).await?,
            },
        })
    }

    pub async fn records(&self) -> Result<Vec<RecordEntry>, WeatherError> {
        Ok(self.context.stats.records().await?)
    }

    /// Current conditions for a postal code. Alert lookup failures are
    /// reported inline; the summary is best effort.
    #[instrument(skip(self))]
    pub async fn nowcast(&self, zip_code: &str) -> Result<NowcastReport, WeatherError> {
        let at = self.context.zip_codes.resolve(Some(zip_code))?;
        let conditions = self.context.client.current_conditions(at).await?;

        let alerts = match self.context.client.active_alerts(at).await {
            Ok(alerts) => AlertStatus::Available { alerts },
            Err(err) => {
                warn!(error = %err, "Alert lookup failed during nowcast");
                AlertStatus::Unavailable {
                    error: err.to_string(),
                }
            }
        };

        let summary = if self.summarizer.is_enabled() {
            let digest = match &alerts {
                AlertStatus::Available { alerts } => alerts_digest(alerts),
                AlertStatus::Unavailable { .. } => alerts_digest(&[]),
            };
            self.summarizer
                .summarize(&conditions.raw["current"], &digest)
                .await
        } else {
            None
        };

        let records_updated = self
            .context
            .stats
            .observe(&conditions.observation(), Utc::now())
            .await?;
        self.context.stats.increment(NOWCASTS_FETCHED, 1).await?;

        Ok(NowcastReport {
            zip_code: zip_code.to_string(),
            wind_direction: conditions
                .current
                .wind_direction_10m
                .map(|degrees| notices::compass_direction(degrees).to_string()),
            lightning: LightningCategory::from_potential(conditions.lightning_potential),
            conditions: conditions.current,
            alerts,
            summary,
            records_updated,
        })
    }

    #[instrument(skip(self))]
    pub async fn forecast(&self, zip_code: &str) -> Result<ForecastReport, WeatherError> {
        let at = self.context.zip_codes.resolve(Some(zip_code))?;
        let periods = self.context.client.forecast_periods(at).await?;
        self.context.stats.increment(FORECASTS_FETCHED, 1).await?;
        Ok(ForecastReport {
            zip_code: zip_code.to_string(),
            periods,
        })
    }
}
