//! # Server Configuration
//!
//! Router assembly, shared state and the OpenAPI document for the operator
//! API.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::browse::BrowseSessions;
use crate::compliance::ComplianceEnforcer;
use crate::config::AppConfig;
use crate::disclaimers::DisclaimerService;
use crate::handlers::{self, browse, compliance, disclaimers, weather};
use crate::platform::ChatPlatform;
use crate::weather::WeatherService;
use crate::{auth, telemetry};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub platform: Arc<dyn ChatPlatform>,
    pub compliance: ComplianceEnforcer,
    pub weather: WeatherService,
    pub disclaimers: DisclaimerService,
    pub browse: BrowseSessions,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/compliance", get(compliance::get_settings))
        .route("/compliance/enable", post(compliance::enable))
        .route("/compliance/disable", post(compliance::disable))
        .route("/compliance/enforce", post(compliance::enforce_now))
        .route("/compliance/allow/{guild_id}", post(compliance::toggle_allowed))
        .route("/compliance/block/{guild_id}", post(compliance::toggle_blocked))
        .route("/compliance/minimum", put(compliance::set_minimum))
        .route("/compliance/max-guilds", put(compliance::set_max_guilds))
        .route("/compliance/interval", put(compliance::set_interval))
        .route("/compliance/log-channel", put(compliance::set_log_channel))
        .route("/compliance/guilds", get(compliance::list_guilds))
        .route("/compliance/guilds/{guild_id}", get(compliance::guild_status))
        .route(
            "/compliance/guilds/{guild_id}/joined",
            post(compliance::guild_joined),
        )
        .route("/weather/stats", get(weather::stats))
        .route("/weather/records", get(weather::records))
        .route(
            "/weather/users/{user_id}",
            get(weather::get_profile).put(weather::set_zip_code),
        )
        .route(
            "/weather/users/{user_id}/{alert}/toggle",
            post(weather::toggle_alert),
        )
        .route("/weather/users/{user_id}/alerts", get(weather::user_alerts))
        .route(
            "/weather/users/{user_id}/forecast/browse",
            post(weather::browse_forecast),
        )
        .route(
            "/weather/users/{user_id}/glossary",
            post(weather::browse_glossary),
        )
        .route("/weather/now/{zip}", get(weather::nowcast))
        .route("/weather/forecast/{zip}", get(weather::forecast))
        .route("/disclaimers/professions", get(disclaimers::list_professions))
        .route("/disclaimers/stats", get(disclaimers::stats))
        .route("/disclaimers/users/{user_id}", get(disclaimers::list_for_user))
        .route(
            "/disclaimers/users/{user_id}/reveal",
            post(disclaimers::reveal),
        )
        .route(
            "/disclaimers/users/{user_id}/browse",
            post(disclaimers::browse_professions),
        )
        .route(
            "/disclaimers/users/{user_id}/{profession}",
            post(disclaimers::add).delete(disclaimers::remove),
        )
        .route("/browse/{session_id}/{action}", post(browse::navigate))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Serves the API until `shutdown` is cancelled.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Operator API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::compliance::get_settings,
        crate::handlers::compliance::enable,
        crate::handlers::compliance::disable,
        crate::handlers::compliance::enforce_now,
        crate::handlers::compliance::toggle_allowed,
        crate::handlers::compliance::toggle_blocked,
        crate::handlers::compliance::set_minimum,
        crate::handlers::compliance::set_max_guilds,
        crate::handlers::compliance::set_interval,
        crate::handlers::compliance::set_log_channel,
        crate::handlers::compliance::list_guilds,
        crate::handlers::compliance::guild_status,
        crate::handlers::compliance::guild_joined,
        crate::handlers::weather::stats,
        crate::handlers::weather::records,
        crate::handlers::weather::get_profile,
        crate::handlers::weather::set_zip_code,
        crate::handlers::weather::toggle_alert,
        crate::handlers::weather::nowcast,
        crate::handlers::weather::forecast,
        crate::handlers::weather::user_alerts,
        crate::handlers::weather::browse_forecast,
        crate::handlers::weather::browse_glossary,
        crate::handlers::disclaimers::list_professions,
        crate::handlers::disclaimers::list_for_user,
        crate::handlers::disclaimers::add,
        crate::handlers::disclaimers::remove,
        crate::handlers::disclaimers::stats,
        crate::handlers::disclaimers::reveal,
        crate::handlers::disclaimers::browse_professions,
        crate::handlers::browse::navigate,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::error::UpstreamError,
            crate::repositories::ComplianceSettings,
            crate::repositories::compliance_settings::ListToggle,
            crate::compliance::LeaveReason,
            crate::compliance::GuildComplianceStatus,
            crate::compliance::EnforcementReport,
            crate::compliance::LeftGuild,
            crate::platform::GuildSummary,
            crate::handlers::compliance::ToggleResponse,
            crate::handlers::compliance::CountRequest,
            crate::handlers::compliance::IntervalRequest,
            crate::handlers::compliance::LogChannelRequest,
            crate::handlers::compliance::GuildStatusEntry,
            crate::handlers::compliance::JoinOutcome,
            crate::repositories::WeatherProfile,
            crate::repositories::weather_stats::WeatherCounters,
            crate::repositories::weather_stats::RecordEntry,
            crate::weather::AlertKind,
            crate::weather::service::WeatherUsage,
            crate::weather::service::SubscriberCounts,
            crate::weather::service::NowcastReport,
            crate::weather::service::ForecastReport,
            crate::weather::service::AlertStatus,
            crate::handlers::weather::ZipCodeRequest,
            crate::handlers::weather::AlertToggleResponse,
            crate::weather::service::UserAlerts,
            crate::weather::client::AlertFeature,
            crate::weather::client::AlertProperties,
            crate::disclaimers::DisclaimerChange,
            crate::disclaimers::ProfessionCount,
            crate::disclaimers::DisclaimerReveal,
            crate::handlers::disclaimers::Profession,
            crate::handlers::disclaimers::RevealRequest,
            crate::browse::BrowseSession,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "guildkeeper operator API",
        description = "Compliance, weather alerting and disclaimer administration",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
