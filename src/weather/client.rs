//! HTTP client for api.weather.gov (alerts, forecasts) and Open-Meteo
//! (current conditions).

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use super::{Coordinates, records::Observation};
use crate::config::WeatherConfig;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,rain,showers,snowfall,cloud_cover,pressure_msl,surface_pressure,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

/// Transient failure talking to an upstream weather API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Network { url: String, source: reqwest::Error },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {details}")]
    Malformed { url: String, details: String },
}

/// One active NWS alert (GeoJSON feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertFeature {
    pub id: String,
    #[serde(default)]
    pub properties: AlertProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertProperties {
    pub event: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub severity: Option<String>,
    pub urgency: Option<String>,
    pub certainty: Option<String>,
    pub sent: Option<String>,
    pub expires: Option<String>,
    pub sender_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

/// One NWS glossary entry. Either side may be null upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlossaryTerm {
    pub term: Option<String>,
    /// HTML fragment.
    pub definition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlossaryResponse {
    #[serde(default)]
    glossary: Vec<GlossaryTerm>,
}

/// One named forecast period ("Tonight", "Saturday", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub temperature_unit: Option<String>,
    #[serde(default)]
    pub short_forecast: Option<String>,
    #[serde(default)]
    pub detailed_forecast: String,
}

impl ForecastPeriod {
    /// Stable identity of the period for repeat suppression.
    pub fn event_id(&self) -> String {
        format!("{}|{}", self.start_time.as_deref().unwrap_or_default(), self.name)
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

/// Open-Meteo `current` block in fahrenheit / mph / inch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CurrentValues {
    pub time: Option<String>,
    pub temperature_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub precipitation: Option<f64>,
    pub rain: Option<f64>,
    pub showers: Option<f64>,
    pub snowfall: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
}

/// Current conditions plus the untouched payload (used as summary input).
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub current: CurrentValues,
    pub lightning_potential: Option<f64>,
    pub raw: Value,
}

impl CurrentConditions {
    pub fn observation(&self) -> Observation {
        Observation {
            temperature: self.current.temperature_2m,
            wind_speed: self.current.wind_speed_10m,
            wind_gusts: self.current.wind_gusts_10m,
            precipitation: self.current.precipitation,
            snowfall: self.current.snowfall,
            showers: self.current.showers,
        }
    }
}

pub struct WeatherClient {
    http: Client,
    nws_base: String,
    open_meteo_base: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            http,
            nws_base: config.nws_api_base.trim_end_matches('/').to_string(),
            open_meteo_base: config.open_meteo_api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Active NWS alerts covering a point.
    pub async fn active_alerts(&self, at: Coordinates) -> Result<Vec<AlertFeature>, FetchError> {
        let url = format!("{}/alerts/active?point={}", self.nws_base, at.point());
        let collection: AlertCollection = self.get_json(&url, "application/geo+json").await?;
        debug!(count = collection.features.len(), point = %at.point(), "Fetched active alerts");
        Ok(collection.features)
    }

    /// Forecast periods for a point, resolved through the points endpoint.
    pub async fn forecast_periods(
        &self,
        at: Coordinates,
    ) -> Result<Vec<ForecastPeriod>, FetchError> {
        let points_url = format!("{}/points/{}", self.nws_base, at.point());
        let points: PointsResponse = self.get_json(&points_url, "application/geo+json").await?;
        let forecast_url = points
            .properties
            .forecast
            .ok_or_else(|| FetchError::Malformed {
                url: points_url.clone(),
                details: "missing properties.forecast".to_string(),
            })?;

        let forecast: ForecastResponse = self
            .get_json(&forecast_url, "application/geo+json")
            .await?;
        Ok(forecast.properties.periods)
    }

    /// The full NWS weather glossary.
    pub async fn glossary(&self) -> Result<Vec<GlossaryTerm>, FetchError> {
        let url = format!("{}/glossary", self.nws_base);
        let response: GlossaryResponse = self.get_json(&url, "application/ld+json").await?;
        debug!(count = response.glossary.len(), "Fetched glossary");
        Ok(response.glossary)
    }

    pub async fn current_conditions(
        &self,
        at: Coordinates,
    ) -> Result<CurrentConditions, FetchError> {
        let url = format!(
            "{}/v1/forecast?latitude={:.4}&longitude={:.4}&current={CURRENT_FIELDS}&minutely_15=lightning_potential&forecast_minutely_15=1&temperature_unit=fahrenheit&wind_speed_unit=mph&precipitation_unit=inch",
            self.open_meteo_base, at.latitude, at.longitude
        );
        let raw: Value = self.get_json(&url, "application/json").await?;

        let current = raw
            .get("current")
            .cloned()
            .map(serde_json::from_value::<CurrentValues>)
            .transpose()
            .map_err(|err| FetchError::Malformed {
                url: url.clone(),
                details: err.to_string(),
            })?
            .ok_or_else(|| FetchError::Malformed {
                url: url.clone(),
                details: "missing current block".to_string(),
            })?;

        let lightning_potential = raw
            .pointer("/minutely_15/lightning_potential/0")
            .and_then(Value::as_f64);

        Ok(CurrentConditions {
            current,
            lightning_potential,
            raw,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .header("Accept", accept)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let response = check_status(response, url)?;
        response.json::<T>().await.map_err(|err| FetchError::Malformed {
            url: url.to_string(),
            details: err.to_string(),
        })
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, FetchError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}
