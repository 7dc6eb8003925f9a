//! Statistics API endpoints.

use axum::extract::{Query, State};

use super::{required, success, ApiResult, TeamQuery};
use crate::db::GlobalStats;
use crate::models::TeamStats;
use crate::AppState;

/// GET /stats/global - Store-wide counters.
pub async fn global_stats(State(state): State<AppState>) -> ApiResult<GlobalStats> {
    success(state.repo.global_stats().await?)
}

/// GET /stats/team?team_name= - Member counts of one team.
pub async fn team_stats(
    State(state): State<AppState>,
    Query(query): Query<TeamQuery>,
) -> ApiResult<TeamStats> {
    let name = required("team_name", query.team_name)?;
    success(state.teams.team_stats(&name).await?)
}
