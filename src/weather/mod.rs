//! # Weather
//!
//! Severe-weather, freeze and heat alert monitors for subscribed users, plus
//! on-demand nowcasts and forecasts that feed the global running records.

pub mod alerts;
pub mod client;
pub mod forecast_alerts;
pub mod notices;
pub mod records;
pub mod service;
pub mod zipcodes;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{platform::PlatformError, store::StoreError};

pub use alerts::SevereAlertMonitor;
pub use client::{FetchError, WeatherClient};
pub use forecast_alerts::{ForecastAlertMonitor, ThresholdRule};
pub use service::WeatherService;
pub use zipcodes::{Coordinates, ZipCodeTable};

/// The three per-user alert subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Severe,
    Freeze,
    Heat,
}

impl AlertKind {
    pub const ALL: [AlertKind; 3] = [AlertKind::Severe, AlertKind::Freeze, AlertKind::Heat];

    /// Per-user boolean opt-in field.
    pub fn flag_field(&self) -> &'static str {
        match self {
            AlertKind::Severe => "severealerts",
            AlertKind::Freeze => "freezealerts",
            AlertKind::Heat => "heatalerts",
        }
    }

    /// Per-user list of delivered event ids.
    pub fn ledger_field(&self) -> &'static str {
        match self {
            AlertKind::Severe => "sent_alerts",
            AlertKind::Freeze => "sent_freeze_periods",
            AlertKind::Heat => "sent_heat_periods",
        }
    }

    /// Global delivery counter.
    pub fn counter_field(&self) -> &'static str {
        match self {
            AlertKind::Severe => "total_alerts_sent",
            AlertKind::Freeze => "total_freeze_alerts_sent",
            AlertKind::Heat => "total_heat_alerts_sent",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Severe => "severe",
            AlertKind::Freeze => "freeze",
            AlertKind::Heat => "heat",
        }
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("zip code {0} is not in the postal code table")]
    UnknownZipCode(String),
    #[error("no zip code configured")]
    MissingZipCode,
    #[error("failed to read postal code table {path}: {source}")]
    ZipTable {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_kind_fields_are_distinct() {
        let mut fields: Vec<&str> = AlertKind::ALL
            .iter()
            .flat_map(|kind| [kind.flag_field(), kind.ledger_field(), kind.counter_field()])
            .collect();
        let total = fields.len();
        fields.sort_unstable();
        fields.dedup();
        assert_eq!(fields.len(), total);
    }
}
