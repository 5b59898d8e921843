//! Severe-weather alert monitor and the delivery plumbing shared with the
//! forecast threshold monitors.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::{
    AlertKind, Coordinates, WeatherClient, ZipCodeTable,
    client::AlertFeature,
    notices,
};
use crate::{
    monitor::{Check, MonitorError, TickReport},
    platform::{ChatPlatform, Embed},
    repositories::{Subscription, WeatherProfileRepository, WeatherStatsRepository},
    store::StoreError,
};

/// Dependencies every alert monitor needs.
#[derive(Clone)]
pub struct AlertContext {
    pub platform: Arc<dyn ChatPlatform>,
    pub client: Arc<WeatherClient>,
    pub zip_codes: Arc<ZipCodeTable>,
    pub profiles: WeatherProfileRepository,
    pub stats: WeatherStatsRepository,
}

impl AlertContext {
    pub(crate) fn locate(&self, subscription: &Subscription) -> Option<Coordinates> {
        match self.zip_codes.resolve(subscription.zip_code.as_deref()) {
            Ok(coordinates) => Some(coordinates),
            Err(err) => {
                debug!(user_id = subscription.user_id, error = %err, "Skipping subscription");
                None
            }
        }
    }

    /// Sends one notification. Returns `false` when the recipient could not
    /// be reached; the event is then left out of the ledger so it is retried.
    pub(crate) async fn deliver(
        &self,
        kind: AlertKind,
        subscription: &Subscription,
        ledger_id: Option<&str>,
        embed: &Embed,
    ) -> Result<bool, StoreError> {
        if let Err(err) = self.platform.send_direct(subscription.target_id, embed).await {
            warn!(
                user_id = subscription.user_id,
                kind = kind.as_str(),
                error = %err,
                "Alert delivery failed"
            );
            return Ok(false);
        }

        if let Some(event_id) = ledger_id {
            self.profiles
                .record_delivered(subscription.user_id, kind, event_id)
                .await?;
        }
        counter!("notifications_sent_total", "kind" => kind.as_str()).increment(1);
        Ok(true)
    }

    pub(crate) async fn count(&self, kind: AlertKind, delivered: u64) -> Result<(), StoreError> {
        if delivered > 0 {
            self.stats.increment(kind.counter_field(), delivered).await?;
        }
        Ok(())
    }
}

pub fn is_severe(alert: &AlertFeature) -> bool {
    matches!(
        alert.properties.severity.as_deref(),
        Some("Severe" | "Extreme")
    )
}

/// Delivers every new Severe or Extreme NWS alert to each subscriber once.
pub struct SevereAlertMonitor {
    context: AlertContext,
    interval: Duration,
}

impl SevereAlertMonitor {
    pub fn new(context: AlertContext, interval: Duration) -> Self {
        Self { context, interval }
    }
}

#[async_trait]
impl Check for SevereAlertMonitor {
    fn name(&self) -> &'static str {
        "severe_alerts"
    }

    async fn interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip_all)]
    async fn tick(&self) -> Result<TickReport, MonitorError> {
        let ctx = &self.context;
        let mut report = TickReport::default();

        for subscription in ctx.profiles.subscribers(AlertKind::Severe).await? {
            report.evaluated += 1;
            let Some(at) = ctx.locate(&subscription) else {
                report.skipped += 1;
                continue;
            };

            let alerts = match ctx.client.active_alerts(at).await {
                Ok(alerts) => alerts,
                Err(err) => {
                    warn!(user_id = subscription.user_id, error = %err, "Failed to fetch alerts");
                    report.failed += 1;
                    continue;
                }
            };
            let severe: Vec<AlertFeature> = alerts.into_iter().filter(is_severe).collect();

            let ledger = ctx
                .profiles
                .delivered(subscription.user_id, AlertKind::Severe)
                .await?;
            let mut delivered = 0;
            for alert in ledger.fresh(&severe, |alert| alert.id.as_str()) {
                let embed = notices::severe_alert(alert);
                if ctx
                    .deliver(AlertKind::Severe, &subscription, Some(&alert.id), &embed)
                    .await?
                {
                    delivered += 1;
                } else {
                    report.failed += 1;
                }
            }

            ctx.count(AlertKind::Severe, delivered).await?;
            report.acted += delivered;
        }

        Ok(report)
    }
}
