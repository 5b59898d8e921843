//! Freeze and heat monitors driven by NWS forecast period temperatures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::{AlertKind, alerts::AlertContext, client::ForecastPeriod, notices};
use crate::{
    config::WeatherConfig,
    monitor::{Check, MonitorError, TickReport},
    platform::Embed,
};

/// Inclusive temperature threshold in °F.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdRule {
    AtOrBelow(f64),
    AtOrAbove(f64),
}

impl ThresholdRule {
    pub fn matches(&self, temperature: f64) -> bool {
        match *self {
            ThresholdRule::AtOrBelow(limit) => temperature <= limit,
            ThresholdRule::AtOrAbove(limit) => temperature >= limit,
        }
    }

    pub fn triggered_by(&self, period: &ForecastPeriod) -> bool {
        period.temperature.is_some_and(|temperature| self.matches(temperature))
    }
}

pub struct ForecastAlertMonitor {
    context: AlertContext,
    kind: AlertKind,
    rule: ThresholdRule,
    interval: Duration,
    /// Suppress periods already delivered to the same user.
    dedupe: bool,
}

impl ForecastAlertMonitor {
    pub fn freeze(context: AlertContext, config: &WeatherConfig) -> Self {
        Self {
            context,
            kind: AlertKind::Freeze,
            rule: ThresholdRule::AtOrBelow(config.freeze_threshold_f),
            interval: config.freeze_interval(),
            dedupe: config.forecast_alert_dedupe,
        }
    }

    pub fn heat(context: AlertContext, config: &WeatherConfig) -> Self {
        Self {
            context,
            kind: AlertKind::Heat,
            rule: ThresholdRule::AtOrAbove(config.heat_threshold_f),
            interval: config.heat_interval(),
            dedupe: config.forecast_alert_dedupe,
        }
    }

    pub fn rule(&self) -> ThresholdRule {
        self.rule
    }

    fn notice(&self, period: &ForecastPeriod) -> Embed {
        match self.kind {
            AlertKind::Heat => notices::heat_alert(period),
            _ => notices::freeze_alert(period),
        }
    }
}

#[async_trait]
impl Check for ForecastAlertMonitor {
    fn name(&self) -> &'static str {
        match self.kind {
            AlertKind::Heat => "heat_alerts",
            _ => "freeze_alerts",
        }
    }

    async fn interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip_all, fields(kind = self.kind.as_str()))]
    async fn tick(&self) -> Result<TickReport, MonitorError> {
        let ctx = &self.context;
        let mut report = TickReport::default();

        for subscription in ctx.profiles.subscribers(self.kind).await? {
            report.evaluated += 1;
            let Some(at) = ctx.locate(&subscription) else {
                report.skipped += 1;
                continue;
            };

            let periods = match ctx.client.forecast_periods(at).await {
                Ok(periods) => periods,
                Err(err) => {
                    warn!(user_id = subscription.user_id, error = %err, "Failed to fetch forecast");
                    report.failed += 1;
                    continue;
                }
            };
            let triggered: Vec<(String, &ForecastPeriod)> = periods
                .iter()
                .filter(|period| self.rule.triggered_by(period))
                .map(|period| (period.event_id(), period))
                .collect();

            let pending: Vec<&(String, &ForecastPeriod)> = if self.dedupe {
                ctx.profiles
                    .delivered(subscription.user_id, self.kind)
                    .await?
                    .fresh(&triggered, |(id, _)| id.as_str())
            } else {
                triggered.iter().collect()
            };

            let mut delivered = 0;
            for (event_id, period) in pending {
                let ledger_id = self.dedupe.then_some(event_id.as_str());
                if ctx
                    .deliver(self.kind, &subscription, ledger_id, &self.notice(period))
                    .await?
                {
                    delivered += 1;
                } else {
                    report.failed += 1;
                }
            }

            ctx.count(self.kind, delivered).await?;
            report.acted += delivered;
        }

        Ok(report)
    }
}
