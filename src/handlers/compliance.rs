//! # Compliance API Handlers
//!
//! Administration of guild compliance settings, per-guild status and manual
//! enforcement.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::auth::OperatorAuth;
use crate::compliance::{self, EnforcementReport, GuildComplianceStatus, LeaveReason};
use crate::error::{ApiError, ErrorType, validation_error};
use crate::platform::{ChannelId, GuildId, GuildSummary};
use crate::repositories::{ComplianceSettings, compliance_settings::ListToggle};
use crate::server::AppState;

/// Shortest enforcement interval accepted, in seconds.
const MIN_ENFORCEMENT_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub guild_id: GuildId,
    pub result: ListToggle,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CountRequest {
    #[schema(example = 25)]
    pub count: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntervalRequest {
    #[schema(example = 3600)]
    pub seconds: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogChannelRequest {
    /// `null` clears the log channel
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BlockQuery {
    /// Reason shown to the inviter when the bot leaves
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuildStatusEntry {
    pub guild: GuildSummary,
    pub status: GuildComplianceStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinOutcome {
    pub guild_id: GuildId,
    pub left: bool,
    pub reason: Option<LeaveReason>,
}

async fn snapshot(state: &AppState) -> Result<Json<ComplianceSettings>, ApiError> {
    Ok(Json(state.compliance.settings().snapshot().await?))
}

/// Current compliance settings
#[utoipa::path(
    get,
    path = "/api/v1/compliance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Compliance settings", body = ComplianceSettings),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<ComplianceSettings>, ApiError> {
    snapshot(&state).await
}

/// Turn compliance enforcement on
#[utoipa::path(
    post,
    path = "/api/v1/compliance/enable",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn enable(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<ComplianceSettings>, ApiError> {
    state.compliance.settings().set_enabled(true).await?;
    tracing::info!("Compliance enforcement enabled");
    snapshot(&state).await
}

/// Turn compliance enforcement off
#[utoipa::path(
    post,
    path = "/api/v1/compliance/disable",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn disable(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<ComplianceSettings>, ApiError> {
    state.compliance.settings().set_enabled(false).await?;
    tracing::info!("Compliance enforcement disabled");
    snapshot(&state).await
}

/// Run one enforcement pass immediately
#[utoipa::path(
    post,
    path = "/api/v1/compliance/enforce",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Guilds left during this pass", body = EnforcementReport),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Chat platform unavailable", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn enforce_now(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<EnforcementReport>, ApiError> {
    Ok(Json(state.compliance.enforce().await?))
}

/// Add a guild to, or remove it from, the allow-list
#[utoipa::path(
    post,
    path = "/api/v1/compliance/allow/{guild_id}",
    security(("bearer_auth" = [])),
    params(("guild_id" = u64, Path, description = "Guild identifier")),
    responses(
        (status = 200, description = "Allow-list updated", body = ToggleResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn toggle_allowed(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(guild_id): Path<GuildId>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let result = state.compliance.settings().toggle_allowed(guild_id).await?;
    tracing::info!(guild_id, ?result, "Allow-list toggled");
    Ok(Json(ToggleResponse { guild_id, result }))
}

/// Add a guild to, or remove it from, the block-list
#[utoipa::path(
    post,
    path = "/api/v1/compliance/block/{guild_id}",
    security(("bearer_auth" = [])),
    params(("guild_id" = u64, Path, description = "Guild identifier"), BlockQuery),
    responses(
        (status = 200, description = "Block-list updated", body = ToggleResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn toggle_blocked(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(guild_id): Path<GuildId>,
    Query(query): Query<BlockQuery>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let reason = query.reason.filter(|reason| !reason.trim().is_empty());
    let result = state
        .compliance
        .settings()
        .toggle_blocked(guild_id, reason)
        .await?;
    tracing::info!(guild_id, ?result, "Block-list toggled");
    Ok(Json(ToggleResponse { guild_id, result }))
}

/// Set the minimum member count
#[utoipa::path(
    put,
    path = "/api/v1/compliance/minimum",
    security(("bearer_auth" = [])),
    request_body = CountRequest,
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 400, description = "Invalid body", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn set_minimum(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    payload: Result<Json<CountRequest>, JsonRejection>,
) -> Result<Json<ComplianceSettings>, ApiError> {
    let Json(request) = payload?;
    state
        .compliance
        .settings()
        .set_min_member_count(request.count)
        .await?;
    snapshot(&state).await
}

/// Set the maximum number of guilds (0 = unlimited)
#[utoipa::path(
    put,
    path = "/api/v1/compliance/max-guilds",
    security(("bearer_auth" = [])),
    request_body = CountRequest,
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 400, description = "Invalid body", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn set_max_guilds(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    payload: Result<Json<CountRequest>, JsonRejection>,
) -> Result<Json<ComplianceSettings>, ApiError> {
    let Json(request) = payload?;
    state
        .compliance
        .settings()
        .set_max_guilds(request.count)
        .await?;
    snapshot(&state).await
}

/// Set the enforcement interval, effective after the current sleep
#[utoipa::path(
    put,
    path = "/api/v1/compliance/interval",
    security(("bearer_auth" = [])),
    request_body = IntervalRequest,
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 400, description = "Interval too short", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn set_interval(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    payload: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<Json<ComplianceSettings>, ApiError> {
    let Json(request) = payload?;
    if request.seconds < MIN_ENFORCEMENT_INTERVAL_SECONDS {
        return Err(validation_error(
            "Enforcement interval too short",
            json!({ "seconds": format!("must be at least {MIN_ENFORCEMENT_INTERVAL_SECONDS}") }),
        ));
    }
    state
        .compliance
        .settings()
        .set_enforcement_interval(request.seconds)
        .await?;
    snapshot(&state).await
}

/// Set or clear the channel receiving enforcement summaries
#[utoipa::path(
    put,
    path = "/api/v1/compliance/log-channel",
    security(("bearer_auth" = [])),
    request_body = LogChannelRequest,
    responses(
        (status = 200, description = "Updated settings", body = ComplianceSettings),
        (status = 400, description = "Invalid body", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn set_log_channel(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    payload: Result<Json<LogChannelRequest>, JsonRejection>,
) -> Result<Json<ComplianceSettings>, ApiError> {
    let Json(request) = payload?;
    state
        .compliance
        .settings()
        .set_log_channel(request.channel_id)
        .await?;
    snapshot(&state).await
}

/// Every guild the bot is in, with its compliance status
#[utoipa::path(
    get,
    path = "/api/v1/compliance/guilds",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Guild statuses", body = [GuildStatusEntry]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Chat platform unavailable", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn list_guilds(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<Vec<GuildStatusEntry>>, ApiError> {
    let settings = state.compliance.settings().snapshot().await?;
    let guilds = state.platform.guilds().await?;
    Ok(Json(
        guilds
            .into_iter()
            .map(|guild| GuildStatusEntry {
                status: compliance::guild_status(&settings, &guild),
                guild,
            })
            .collect(),
    ))
}

/// Compliance status of one guild
#[utoipa::path(
    get,
    path = "/api/v1/compliance/guilds/{guild_id}",
    security(("bearer_auth" = [])),
    params(("guild_id" = u64, Path, description = "Guild identifier")),
    responses(
        (status = 200, description = "Guild status", body = GuildStatusEntry),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Bot is not in this guild", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn guild_status(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(guild_id): Path<GuildId>,
) -> Result<Json<GuildStatusEntry>, ApiError> {
    let settings = state.compliance.settings().snapshot().await?;
    let guild = state
        .platform
        .guild(guild_id)
        .await?
        .ok_or_else(|| ApiError::from(ErrorType::NotFound))?;
    Ok(Json(GuildStatusEntry {
        status: compliance::guild_status(&settings, &guild),
        guild,
    }))
}

/// Run the guild-join check for a guild the bot was just added to
#[utoipa::path(
    post,
    path = "/api/v1/compliance/guilds/{guild_id}/joined",
    security(("bearer_auth" = [])),
    params(("guild_id" = u64, Path, description = "Guild identifier")),
    responses(
        (status = 200, description = "Join check outcome", body = JoinOutcome),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Bot is not in this guild", body = ApiError)
    ),
    tag = "compliance"
)]
pub async fn guild_joined(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(guild_id): Path<GuildId>,
) -> Result<Json<JoinOutcome>, ApiError> {
    let guild = state
        .platform
        .guild(guild_id)
        .await?
        .ok_or_else(|| ApiError::from(ErrorType::NotFound))?;
    let reason = state.compliance.on_guild_join(&guild).await?;
    Ok(Json(JoinOutcome {
        guild_id,
        left: reason.is_some(),
        reason,
    }))
}
