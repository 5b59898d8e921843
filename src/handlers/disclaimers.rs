//! # Disclaimer API Handlers

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::browse::BrowseSession;
use crate::disclaimers::{
    DisclaimerChange, DisclaimerReveal, DisclaimerService, PROFESSIONS, ProfessionCount,
};
use crate::error::ApiError;
use crate::platform::{ChannelId, UserId};
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct Profession {
    pub name: String,
    pub disclaimer: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevealRequest {
    /// Channel the tagged message was posted in
    pub channel_id: ChannelId,
}

/// Predefined professions and their disclaimer text
#[utoipa::path(
    get,
    path = "/api/v1/disclaimers/professions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profession catalog", body = [Profession]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn list_professions(_operator: OperatorAuth) -> Json<Vec<Profession>> {
    Json(
        PROFESSIONS
            .iter()
            .map(|(name, disclaimer)| Profession {
                name: name.to_string(),
                disclaimer: disclaimer.to_string(),
            })
            .collect(),
    )
}

/// Disclaimers attached to a user, in the order they were added
#[utoipa::path(
    get,
    path = "/api/v1/disclaimers/users/{user_id}",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Disclaimer texts", body = [String]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn list_for_user(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.disclaimers.list(user_id).await?))
}

/// Attach a profession's disclaimer to a user
#[utoipa::path(
    post,
    path = "/api/v1/disclaimers/users/{user_id}/{profession}",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = u64, Path, description = "User identifier"),
        ("profession" = String, Path, description = "lawyer, doctor or trader")
    ),
    responses(
        (status = 200, description = "Disclaimer attached (changed = false if already present)", body = DisclaimerChange),
        (status = 400, description = "Unknown profession", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn add(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((user_id, profession)): Path<(UserId, String)>,
) -> Result<Json<DisclaimerChange>, ApiError> {
    Ok(Json(state.disclaimers.add(user_id, &profession).await?))
}

/// Detach a profession's disclaimer from a user
#[utoipa::path(
    delete,
    path = "/api/v1/disclaimers/users/{user_id}/{profession}",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = u64, Path, description = "User identifier"),
        ("profession" = String, Path, description = "lawyer, doctor or trader")
    ),
    responses(
        (status = 200, description = "Disclaimer removed (changed = false if absent)", body = DisclaimerChange),
        (status = 400, description = "Unknown profession", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn remove(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((user_id, profession)): Path<(UserId, String)>,
) -> Result<Json<DisclaimerChange>, ApiError> {
    Ok(Json(state.disclaimers.remove(user_id, &profession).await?))
}

/// Number of users carrying each profession's disclaimer
#[utoipa::path(
    get,
    path = "/api/v1/disclaimers/stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users per profession", body = [ProfessionCount]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn stats(
    State(state): State<AppState>,
    _operator: OperatorAuth,
) -> Result<Json<Vec<ProfessionCount>>, ApiError> {
    Ok(Json(state.disclaimers.stats().await?))
}

/// Post a user's disclaimers to a channel
///
/// Fired by the gateway relay when someone asks about a tagged user's message.
#[utoipa::path(
    post,
    path = "/api/v1/disclaimers/users/{user_id}/reveal",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "Author of the tagged message")),
    request_body = RevealRequest,
    responses(
        (status = 200, description = "Disclaimers posted", body = DisclaimerReveal),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "User has no disclaimers", body = ApiError),
        (status = 422, description = "Channel not writable", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn reveal(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
    payload: Result<Json<RevealRequest>, JsonRejection>,
) -> Result<Json<DisclaimerReveal>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(
        state.disclaimers.reveal(user_id, request.channel_id).await?,
    ))
}

/// Page through the profession catalog by direct message
#[utoipa::path(
    post,
    path = "/api/v1/disclaimers/users/{user_id}/browse",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Session started, first page delivered", body = BrowseSession),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 422, description = "First page could not be delivered", body = ApiError)
    ),
    tag = "disclaimers"
)]
pub async fn browse_professions(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<BrowseSession>, ApiError> {
    let pages = DisclaimerService::profession_pages();
    Ok(Json(state.browse.start(user_id, pages, None).await?))
}
