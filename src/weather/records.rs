//! Global running weather extremes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fresh measurements from one nowcast.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gusts: Option<f64>,
    pub precipitation: Option<f64>,
    pub snowfall: Option<f64>,
    pub showers: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Highest,
    Lowest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    HighestTemperature,
    LowestTemperature,
    HighestWindSpeed,
    HighestWindGusts,
    HighestPrecipitation,
    HighestSnowfall,
    HighestRainfall,
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        RecordKind::HighestTemperature,
        RecordKind::LowestTemperature,
        RecordKind::HighestWindSpeed,
        RecordKind::HighestWindGusts,
        RecordKind::HighestPrecipitation,
        RecordKind::HighestSnowfall,
        RecordKind::HighestRainfall,
    ];

    pub fn field(&self) -> &'static str {
        match self {
            RecordKind::HighestTemperature => "highest_temperature",
            RecordKind::LowestTemperature => "lowest_temperature",
            RecordKind::HighestWindSpeed => "highest_wind_speed",
            RecordKind::HighestWindGusts => "highest_wind_gusts",
            RecordKind::HighestPrecipitation => "highest_precipitation",
            RecordKind::HighestSnowfall => "highest_snowfall",
            RecordKind::HighestRainfall => "highest_rainfall",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            RecordKind::LowestTemperature => Direction::Lowest,
            _ => Direction::Highest,
        }
    }

    /// Value this observation offers for the record, if it qualifies at all.
    /// Accumulation records ignore zero readings.
    pub fn candidate(&self, observation: &Observation) -> Option<f64> {
        let value = match self {
            RecordKind::HighestTemperature | RecordKind::LowestTemperature => {
                observation.temperature
            }
            RecordKind::HighestWindSpeed => observation.wind_speed,
            RecordKind::HighestWindGusts => observation.wind_gusts,
            RecordKind::HighestPrecipitation => observation.precipitation.filter(|v| *v != 0.0),
            RecordKind::HighestSnowfall => observation.snowfall.filter(|v| *v != 0.0),
            RecordKind::HighestRainfall => observation.showers.filter(|v| *v != 0.0),
        };
        value.filter(|v| v.is_finite())
    }
}

/// A record value and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunningExtreme {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl RunningExtreme {
    /// Replaces `current` when `candidate` strictly beats it. Returns whether it did.
    pub fn offer(
        current: &mut Option<RunningExtreme>,
        kind: RecordKind,
        candidate: f64,
        at: DateTime<Utc>,
    ) -> bool {
        let beats = match current {
            None => true,
            Some(existing) => match kind.direction() {
                Direction::Highest => candidate > existing.value,
                Direction::Lowest => candidate < existing.value,
            },
        };
        if beats {
            *current = Some(RunningExtreme {
                value: candidate,
                observed_at: at,
            });
        }
        beats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        format!("2026-01-01T{hour:02}:00:00Z").parse().unwrap()
    }

    #[test]
    fn test_highest_and_lowest_follow_direction() {
        let mut high = None;
        let mut low = None;
        for (hour, temp) in [(1, 50.0), (2, 70.0), (3, 40.0)] {
            RunningExtreme::offer(&mut high, RecordKind::HighestTemperature, temp, at(hour));
            RunningExtreme::offer(&mut low, RecordKind::LowestTemperature, temp, at(hour));
        }
        assert_eq!(high.unwrap().value, 70.0);
        assert_eq!(high.unwrap().observed_at, at(2));
        assert_eq!(low.unwrap().value, 40.0);
    }

    #[test]
    fn test_ties_keep_original_timestamp() {
        let mut record = None;
        RunningExtreme::offer(&mut record, RecordKind::HighestWindSpeed, 20.0, at(1));
        assert!(!RunningExtreme::offer(
            &mut record,
            RecordKind::HighestWindSpeed,
            20.0,
            at(2)
        ));
        assert_eq!(record.unwrap().observed_at, at(1));
    }

    #[test]
    fn test_accumulations_ignore_zero() {
        let observation = Observation {
            temperature: Some(0.0),
            precipitation: Some(0.0),
            snowfall: Some(0.4),
            showers: None,
            ..Observation::default()
        };
        assert_eq!(RecordKind::LowestTemperature.candidate(&observation), Some(0.0));
        assert_eq!(RecordKind::HighestPrecipitation.candidate(&observation), None);
        assert_eq!(RecordKind::HighestSnowfall.candidate(&observation), Some(0.4));
        assert_eq!(RecordKind::HighestRainfall.candidate(&observation), None);
    }
}
