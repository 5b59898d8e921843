//! # Error Handling
//!
//! Unified problem+json responses for the operator API, with trace ID
//! propagation and conversions from every domain error.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    browse::BrowseError,
    disclaimers::DisclaimerError,
    monitor::MonitorError,
    platform::PlatformError,
    store::StoreError,
    telemetry,
    weather::{FetchError, WeatherError},
};

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Trace ID of the active request, or a fresh correlation ID.
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not Found")]
    NotFound,
    #[error("Too Many Requests")]
    TooManyRequests,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Bad Gateway")]
    BadGateway,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// SCREAMING_SNAKE_CASE code sent to clients
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::Unauthorized => "UNAUTHORIZED",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::TooManyRequests => "RATE_LIMITED",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::BadGateway => "UPSTREAM_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

/// Upstream service failure information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpstreamError {
    /// Upstream identifier ("discord", "nws", "open-meteo")
    pub service: String,
    pub status: Option<u16>,
    /// Truncated response body
    pub body_snippet: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code(),
            &error_type.to_string(),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(db_err) => db_err.into(),
            StoreError::Serialization { key, source } => {
                tracing::error!(%key, error = %source, "Stored value could not be decoded");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Stored configuration is corrupt",
                )
            }
            StoreError::MutationSkipped { key } => {
                tracing::error!(%key, "Store update did not apply its mutation");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Configuration update failed",
                )
            }
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::Delivery { recipient, reason } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "DELIVERY_FAILED",
                &format!("Cannot deliver to {recipient}"),
            )
            .with_details(json!({ "reason": reason })),
            PlatformError::NotFound(what) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", &format!("{what} not found"))
            }
            PlatformError::RateLimited { retry_after } => {
                let error: ApiError = ErrorType::TooManyRequests.into();
                match retry_after {
                    Some(seconds) => error.with_retry_after(seconds.ceil() as u64),
                    None => error,
                }
            }
            PlatformError::Http { status, body } => {
                upstream_error("discord", Some(status), Some(body))
            }
            other => {
                tracing::warn!(error = %other, "Chat platform request failed");
                upstream_error("discord", None, Some(other.to_string()))
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        let status = match &error {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        };
        tracing::warn!(error = %error, "Weather upstream request failed");
        upstream_error("weather", status, Some(error.to_string()))
    }
}

impl From<WeatherError> for ApiError {
    fn from(error: WeatherError) -> Self {
        match error {
            WeatherError::UnknownZipCode(zip) => validation_error(
                "Unknown zip code",
                json!({ "zip_code": format!("{zip} is not a known, validated zip code") }),
            ),
            WeatherError::MissingZipCode => validation_error(
                "No zip code configured",
                json!({ "zip_code": "Set a zip code first" }),
            ),
            WeatherError::ZipTable { .. } => {
                tracing::error!(error = %error, "Postal code table unavailable");
                ErrorType::ServiceUnavailable.into()
            }
            WeatherError::Fetch(fetch) => fetch.into(),
            WeatherError::Store(store) => store.into(),
            WeatherError::Platform(platform) => platform.into(),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(error: MonitorError) -> Self {
        match error {
            MonitorError::Store(store) => store.into(),
            MonitorError::Platform(platform) => platform.into(),
            MonitorError::AlreadyRunning(name) => Self::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                &format!("Monitor {name} is already running"),
            ),
            MonitorError::Panicked { .. } => {
                tracing::error!(error = %error, "Monitor task panicked");
                ErrorType::InternalServerError.into()
            }
        }
    }
}

impl From<DisclaimerError> for ApiError {
    fn from(error: DisclaimerError) -> Self {
        match error {
            DisclaimerError::UnknownProfession(profession) => validation_error(
                "Unknown profession",
                json!({ "profession": format!("No predefined disclaimer for {profession}") }),
            ),
            DisclaimerError::NoDisclaimers(user_id) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("User {user_id} has no disclaimers"),
            ),
            DisclaimerError::Store(store) => store.into(),
            DisclaimerError::Platform(platform) => platform.into(),
        }
    }
}

impl From<BrowseError> for ApiError {
    fn from(error: BrowseError) -> Self {
        match error {
            BrowseError::Empty => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Nothing to browse")
            }
            BrowseError::UnknownSession(session_id) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Browse session {session_id} not found or expired"),
            ),
            BrowseError::Platform(platform) => platform.into(),
        }
    }
}

/// Create an upstream failure error (502)
pub fn upstream_error(service: &str, status: Option<u16>, body: Option<String>) -> ApiError {
    let upstream = UpstreamError {
        service: service.to_string(),
        status,
        body_snippet: body.map(|b| {
            if b.chars().count() > 200 {
                let truncated: String = b.chars().take(200).collect();
                format!("{}...", truncated)
            } else {
                b
            }
        }),
    };

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "UPSTREAM_ERROR",
        &format!("Upstream {} request failed", service),
    )
    .with_details(json!(upstream))
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Test error message",
        );

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.details, None);
        assert_eq!(error.retry_after, None);
    }

    #[test]
    fn test_error_type_mapping() {
        let not_found_error: ApiError = ErrorType::NotFound.into();
        assert_eq!(not_found_error.code, Box::from("NOT_FOUND"));
        assert_eq!(not_found_error.message, Box::from("Not Found"));
    }

    #[test]
    fn test_from_anyhow() {
        let api_error: ApiError = anyhow::anyhow!("Something went wrong").into();

        assert_eq!(api_error.code, Box::from("INTERNAL_SERVER_ERROR"));
        assert_eq!(api_error.message, Box::from("An internal error occurred"));
    }

    #[test]
    fn test_content_type_and_retry_after_headers() {
        let error = ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Rate limit exceeded",
        )
        .with_retry_after(60);

        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Test error",
        );

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_upstream_error_truncates_body_on_char_boundaries() {
        let body = "雪🌨 snow ".repeat(60);
        let error = upstream_error("nws", Some(503), Some(body));

        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
        let details = error.details.unwrap();
        let snippet = details["body_snippet"].as_str().unwrap();
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), 203);
        assert_eq!(details["status"], 503);
    }

    #[test]
    fn test_unknown_zip_code_is_validation_error() {
        let error: ApiError = WeatherError::UnknownZipCode("00000".to_string()).into();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert!(error.details.unwrap()["zip_code"].as_str().unwrap().contains("00000"));
    }

    #[test]
    fn test_delivery_failure_maps_to_unprocessable() {
        let error: ApiError = PlatformError::Delivery {
            recipient: "user 42".to_string(),
            reason: "Cannot send messages to this user".to_string(),
        }
        .into();
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code, Box::from("DELIVERY_FAILED"));
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let error: ApiError = PlatformError::RateLimited {
            retry_after: Some(1.2),
        }
        .into();
        assert_eq!(error.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error.retry_after, Some(2));
    }

    #[test]
    fn test_unknown_profession_is_validation_error() {
        let error: ApiError = DisclaimerError::UnknownProfession("pilot".to_string()).into();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_mapping() {
        let api_error: ApiError = sea_orm::DbErr::RecordNotFound("test_record".to_string()).into();

        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert!(api_error.message.contains("test_record"));
    }

    #[test]
    fn test_validation_error_with_details() {
        let field_errors = json!({ "max_guilds": "must be a number" });
        let error = validation_error("Validation failed", field_errors.clone());

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.details, Some(Box::new(field_errors)));
        assert!(error.trace_id.is_some());
    }
}
