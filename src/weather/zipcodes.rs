//! US postal code to coordinate table, loaded once at startup.

use std::{collections::HashMap, path::Path};

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::WeatherError;

/// Rough size of a complete US table. Smaller tables are samples.
const COMPLETE_TABLE_MIN_ENTRIES: usize = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// `lat,lon` with the four-decimal precision NWS accepts without redirecting.
    pub fn point(&self) -> String {
        format!("{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZipCodeTable {
    entries: HashMap<String, Coordinates>,
}

impl ZipCodeTable {
    pub fn load(path: &Path) -> Result<Self, WeatherError> {
        let contents = std::fs::read_to_string(path).map_err(|source| WeatherError::ZipTable {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::parse(&contents);
        info!(path = %path.display(), entries = table.len(), "Loaded postal code table");
        if table.is_partial() {
            warn!(
                path = %path.display(),
                entries = table.len(),
                "Postal code table looks partial; most zip codes will be rejected. Point GUILDKEEPER_ZIP_CODES_PATH at a full table"
            );
        }
        Ok(table)
    }

    /// Parses `zip,latitude,longitude` rows. The first row is a header and
    /// malformed rows are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut entries = HashMap::new();
        for (line_no, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let mut columns = line.split(',').map(str::trim);
            let (Some(zip), Some(lat), Some(lon)) = (columns.next(), columns.next(), columns.next())
            else {
                warn!(line = line_no + 1, "Skipping short postal code row");
                continue;
            };
            match (lat.parse::<f64>(), lon.parse::<f64>()) {
                (Ok(latitude), Ok(longitude)) if !zip.is_empty() => {
                    entries.insert(
                        zip.to_string(),
                        Coordinates {
                            latitude,
                            longitude,
                        },
                    );
                }
                _ => warn!(line = line_no + 1, "Skipping malformed postal code row"),
            }
        }
        Self { entries }
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Coordinates)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, zip: &str) -> Option<Coordinates> {
        self.entries.get(zip.trim()).copied()
    }

    /// Resolves an optional locator, distinguishing unset from unknown.
    pub fn resolve(&self, zip: Option<&str>) -> Result<Coordinates, WeatherError> {
        let zip = zip.ok_or(WeatherError::MissingZipCode)?;
        self.lookup(zip)
            .ok_or_else(|| WeatherError::UnknownZipCode(zip.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the table is too small to cover the US.
    pub fn is_partial(&self) -> bool {
        self.len() < COMPLETE_TABLE_MIN_ENTRIES
    }
}
