//! # Weather API Handlers
//!
//! Per-user weather profiles, alert subscriptions, nowcasts, forecasts,
//! glossary browsing and usage statistics.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::auth::OperatorAuth;
use crate::browse::BrowseSession;
use crate::error::{ApiError, validation_error};
use crate::platform::UserId;
use crate::repositories::{WeatherProfile, weather_stats::RecordEntry};
use crate::server::AppState;
use crate::weather::{
    AlertKind,
    service::{ForecastReport, NowcastReport, UserAlerts, WeatherUsage},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ZipCodeRequest {
    #[schema(example = "60601")]
    pub zip_code: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastBrowseQuery {
    /// Defaults to the user's saved zip code
    pub zip: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GlossaryQuery {
    /// Case-insensitive substring of the term
    pub term: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertToggleResponse {
    pub user_id: UserId,
    pub kind: AlertKind,
    pub enabled: bool,
}

/// Maps a `{kind}-alerts` path segment to its alert kind.
fn parse_alert_segment(segment: &str) -> Option<AlertKind> {
    let kind = segment.strip_suffix("-alerts")?;
    AlertKind::ALL.into_iter().find(|k| k.as_str() == kind)
}

/// Delivery counters and subscriber totals
#[utoipa::path(
    get,
    path = "/api/v1/weather/stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Weather usage", body = WeatherUsage),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn stats(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<WeatherUsage>, ApiError> {
    Ok(Json(state.weather.usage().await?))
}

/// Running weather records observed by nowcasts
#[utoipa::path(
    get,
    path = "/api/v1/weather/records",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Running records", body = [RecordEntry]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn records(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<Vec<RecordEntry>>, ApiError> {
    Ok(Json(state.weather.records().await?))
}

/// A user's weather profile
#[utoipa::path(
    get,
    path = "/api/v1/weather/users/{user_id}",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Weather profile", body = WeatherProfile),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<WeatherProfile>, ApiError> {
    Ok(Json(state.weather.profile(user_id).await?))
}

/// Set a user's postal code
#[utoipa::path(
    put,
    path = "/api/v1/weather/users/{user_id}",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier")),
    request_body = ZipCodeRequest,
    responses(
        (status = 200, description = "Updated profile", body = WeatherProfile),
        (status = 400, description = "Unknown zip code", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn set_zip_code(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
    payload: Result<Json<ZipCodeRequest>, JsonRejection>,
) -> Result<Json<WeatherProfile>, ApiError> {
    let Json(request) = payload?;
    state.weather.set_zip_code(user_id, &request.zip_code).await?;
    Ok(Json(state.weather.profile(user_id).await?))
}

/// Flip one of a user's alert subscriptions
#[utoipa::path(
    post,
    path = "/api/v1/weather/users/{user_id}/{alert}/toggle",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = u64, Path, description = "User identifier"),
        ("alert" = String, Path, description = "severe-alerts, freeze-alerts or heat-alerts")
    ),
    responses(
        (status = 200, description = "New subscription state", body = AlertToggleResponse),
        (status = 400, description = "Unknown alert kind", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 422, description = "Example alert could not be delivered", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn toggle_alert(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((user_id, alert)): Path<(UserId, String)>,
) -> Result<Json<AlertToggleResponse>, ApiError> {
    let kind = parse_alert_segment(&alert).ok_or_else(|| {
        validation_error(
            "Unknown alert kind",
            json!({ "alert": "must be one of severe-alerts, freeze-alerts, heat-alerts" }),
        )
    })?;
    let enabled = state.weather.toggle_alert(user_id, kind).await?;
    Ok(Json(AlertToggleResponse {
        user_id,
        kind,
        enabled,
    }))
}

/// Current conditions, active alerts and running-record updates
#[utoipa::path(
    get,
    path = "/api/v1/weather/now/{zip}",
    security(("bearer_auth" = [])),
    params(("zip" = String, Path, description = "US postal code")),
    responses(
        (status = 200, description = "Nowcast", body = NowcastReport),
        (status = 400, description = "Unknown zip code", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Weather provider unavailable", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn nowcast(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(zip): Path<String>,
) -> Result<Json<NowcastReport>, ApiError> {
    Ok(Json(state.weather.nowcast(&zip).await?))
}

/// Multi-day forecast periods
#[utoipa::path(
    get,
    path = "/api/v1/weather/forecast/{zip}",
    security(("bearer_auth" = [])),
    params(("zip" = String, Path, description = "US postal code")),
    responses(
        (status = 200, description = "Forecast", body = ForecastReport),
        (status = 400, description = "Unknown zip code", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Weather provider unavailable", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn forecast(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(zip): Path<String>,
) -> Result<Json<ForecastReport>, ApiError> {
    Ok(Json(state.weather.forecast(&zip).await?))
}

/// Active alerts at a user's saved zip code
#[utoipa::path(
    get,
    path = "/api/v1/weather/users/{user_id}/alerts",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Active alerts", body = UserAlerts),
        (status = 400, description = "No zip code saved", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Weather provider unavailable", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn user_alerts(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserAlerts>, ApiError> {
    Ok(Json(state.weather.alerts_for_user(user_id).await?))
}

/// Page through a forecast by direct message
#[utoipa::path(
    post,
    path = "/api/v1/weather/users/{user_id}/forecast/browse",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier"), ForecastBrowseQuery),
    responses(
        (status = 200, description = "Session started, first page delivered", body = BrowseSession),
        (status = 400, description = "Unknown or missing zip code", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "No forecast periods", body = ApiError),
        (status = 422, description = "First page could not be delivered", body = ApiError),
        (status = 502, description = "Weather provider unavailable", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn browse_forecast(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
    Query(query): Query<ForecastBrowseQuery>,
) -> Result<Json<BrowseSession>, ApiError> {
    let pages = state
        .weather
        .forecast_pages(user_id, query.zip.as_deref())
        .await?;
    Ok(Json(state.browse.start(user_id, pages, None).await?))
}

/// Page through the weather glossary by direct message
#[utoipa::path(
    post,
    path = "/api/v1/weather/users/{user_id}/glossary",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier"), GlossaryQuery),
    responses(
        (status = 200, description = "Session started, first page delivered", body = BrowseSession),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "No matching glossary terms", body = ApiError),
        (status = 422, description = "First page could not be delivered", body = ApiError),
        (status = 502, description = "Weather provider unavailable", body = ApiError)
    ),
    tag = "weather"
)]
pub async fn browse_glossary(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
    Query(query): Query<GlossaryQuery>,
) -> Result<Json<BrowseSession>, ApiError> {
    let pages = state.weather.glossary_pages(query.term.as_deref()).await?;
    let session = state
        .browse
        .start(user_id, pages, Some(state.weather.glossary_views()))
        .await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alert_segment() {
        assert_eq!(parse_alert_segment("severe-alerts"), Some(AlertKind::Severe));
        assert_eq!(parse_alert_segment("freeze-alerts"), Some(AlertKind::Freeze));
        assert_eq!(parse_alert_segment("heat-alerts"), Some(AlertKind::Heat));
        assert_eq!(parse_alert_segment("heat"), None);
        assert_eq!(parse_alert_segment("hail-alerts"), None);
    }
}
