//! # Weather Stats Repository
//!
//! Global delivery/fetch counters and running weather records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::{ConfigKey, ConfigStore, StoreError};
use crate::weather::records::{Observation, RecordKind, RunningExtreme};

pub const NOWCASTS_FETCHED: &str = "nowcasts_fetched";
pub const FORECASTS_FETCHED: &str = "forecasts_fetched";
pub const GLOSSARY_DEFINITIONS_SHOWN: &str = "glossary_definitions_shown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct WeatherCounters {
    pub total_alerts_sent: u64,
    pub total_freeze_alerts_sent: u64,
    pub total_heat_alerts_sent: u64,
    pub nowcasts_fetched: u64,
    pub forecasts_fetched: u64,
    pub glossary_definitions_shown: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecordEntry {
    pub kind: RecordKind,
    pub record: Option<RunningExtreme>,
}

#[derive(Clone)]
pub struct WeatherStatsRepository {
    store: Arc<dyn ConfigStore>,
}

impl WeatherStatsRepository {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Adds `by` to a global counter and returns the new total.
    pub async fn increment(&self, counter: &'static str, by: u64) -> Result<u64, StoreError> {
        self.store
            .modify(&ConfigKey::global(counter), move |total: &mut u64| {
                *total = total.saturating_add(by);
            })
            .await
    }

    pub async fn counters(&self) -> Result<WeatherCounters, StoreError> {
        let read = |field: &'static str| async move {
            self.store.load::<u64>(&ConfigKey::global(field)).await
        };
        Ok(WeatherCounters {
            total_alerts_sent: read("total_alerts_sent").await?,
            total_freeze_alerts_sent: read("total_freeze_alerts_sent").await?,
            total_heat_alerts_sent: read("total_heat_alerts_sent").await?,
            nowcasts_fetched: read(NOWCASTS_FETCHED).await?,
            forecasts_fetched: read(FORECASTS_FETCHED).await?,
            glossary_definitions_shown: read(GLOSSARY_DEFINITIONS_SHOWN).await?,
        })
    }

    pub async fn records(&self) -> Result<Vec<RecordEntry>, StoreError> {
        let mut entries = Vec::with_capacity(RecordKind::ALL.len());
        for kind in RecordKind::ALL {
            entries.push(RecordEntry {
                kind,
                record: self
                    .store
                    .load_opt(&ConfigKey::global(kind.field()))
                    .await?,
            });
        }
        Ok(entries)
    }

    /// Offers every qualifying measurement to its record. Returns the records
    /// that changed.
    pub async fn observe(
        &self,
        observation: &Observation,
        at: DateTime<Utc>,
    ) -> Result<Vec<RecordKind>, StoreError> {
        let mut updated = Vec::new();
        for kind in RecordKind::ALL {
            let Some(candidate) = kind.candidate(observation) else {
                continue;
            };
            let before: Option<RunningExtreme> = self
                .store
                .load_opt(&ConfigKey::global(kind.field()))
                .await?;
            let after: Option<RunningExtreme> = self
                .store
                .modify(
                    &ConfigKey::global(kind.field()),
                    move |record: &mut Option<RunningExtreme>| {
                        RunningExtreme::offer(record, kind, candidate, at);
                    },
                )
                .await?;
            if after != before {
                updated.push(kind);
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DbConfigStore;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn repository() -> WeatherStatsRepository {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        WeatherStatsRepository::new(Arc::new(DbConfigStore::new(Arc::new(db))))
    }

    #[tokio::test]
    async fn test_increment_accumulates() {
        let repo = repository().await;
        repo.increment("total_alerts_sent", 2).await.unwrap();
        assert_eq!(repo.increment("total_alerts_sent", 3).await.unwrap(), 5);
        assert_eq!(repo.counters().await.unwrap().total_alerts_sent, 5);
    }

    #[tokio::test]
    async fn test_observe_updates_only_beaten_records() {
        let repo = repository().await;
        let first: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let second: DateTime<Utc> = "2026-01-02T00:00:00Z".parse().unwrap();

        let updated = repo
            .observe(
                &Observation {
                    temperature: Some(60.0),
                    wind_speed: Some(10.0),
                    precipitation: Some(0.0),
                    ..Observation::default()
                },
                first,
            )
            .await
            .unwrap();
        assert_eq!(
            updated,
            vec![
                RecordKind::HighestTemperature,
                RecordKind::LowestTemperature,
                RecordKind::HighestWindSpeed
            ]
        );

        let updated = repo
            .observe(
                &Observation {
                    temperature: Some(65.0),
                    wind_speed: Some(4.0),
                    ..Observation::default()
                },
                second,
            )
            .await
            .unwrap();
        assert_eq!(updated, vec![RecordKind::HighestTemperature]);

        let records = repo.records().await.unwrap();
        let lowest = records
            .iter()
            .find(|entry| entry.kind == RecordKind::LowestTemperature)
            .unwrap();
        assert_eq!(lowest.record.unwrap().value, 60.0);
        assert_eq!(lowest.record.unwrap().observed_at, first);
        let precipitation = records
            .iter()
            .find(|entry| entry.kind == RecordKind::HighestPrecipitation)
            .unwrap();
        assert!(precipitation.record.is_none());
    }
}
