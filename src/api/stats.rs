//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppResult;

use super::AuthenticatedUser;

/// Dashboard counters
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    /// Books in the catalog
    pub books: i64,
    /// Approved members
    pub members: i64,
    /// Books currently out
    pub active_borrows: i64,
    /// Open borrows past their due date
    pub overdue_borrows: i64,
}

/// Get library statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = StatsResponse),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StatsResponse>> {
    claims.require_admin()?;

    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}
