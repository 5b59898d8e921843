//! # Browse Session Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::browse::BrowseAction;
use crate::error::{ApiError, validation_error};
use crate::server::AppState;

fn parse_action(segment: &str) -> Option<BrowseAction> {
    match segment {
        "next" => Some(BrowseAction::Next),
        "previous" => Some(BrowseAction::Previous),
        "dismiss" => Some(BrowseAction::Dismiss),
        _ => None,
    }
}

/// Move a browse session forward or back, or close it
#[utoipa::path(
    post,
    path = "/api/v1/browse/{session_id}/{action}",
    security(("bearer_auth" = [])),
    params(
        ("session_id" = Uuid, Path, description = "Session returned when browsing started"),
        ("action" = String, Path, description = "next, previous or dismiss")
    ),
    responses(
        (status = 204, description = "Input accepted"),
        (status = 400, description = "Unknown action", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Session ended or never existed", body = ApiError)
    ),
    tag = "browse"
)]
pub async fn navigate(
    State(state): State<AppState>,
    _operator: OperatorAuth,
    Path((session_id, action)): Path<(Uuid, String)>,
) -> Result<StatusCode, ApiError> {
    let action = parse_action(&action).ok_or_else(|| {
        validation_error(
            "Unknown browse action",
            json!({ "action": "must be one of next, previous, dismiss" }),
        )
    })?;
    state.browse.navigate(session_id, action).await?;
    Ok(StatusCode::NO_CONTENT)
}
