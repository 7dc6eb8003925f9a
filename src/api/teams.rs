//! Team API endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::{created, required, success, ApiResult};
use crate::models::{CreateTeamRequest, Team, TeamSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_name: Option<String>,
}

/// POST /team/add - Create a team with its members.
pub async fn add_team(
    State(state): State<AppState>,
    Json(request): Json<CreateTeamRequest>,
) -> ApiResult<Team> {
    created(state.teams.create_team(request).await?)
}

/// GET /team/get?team_name= - Get a team with its members.
pub async fn get_team(
    State(state): State<AppState>,
    Query(query): Query<TeamQuery>,
) -> ApiResult<Team> {
    let name = required("team_name", query.team_name)?;
    success(state.teams.get_team(&name).await?)
}

/// GET /team/list - List teams ordered by name.
pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Vec<TeamSummary>> {
    success(state.teams.list_teams().await?)
}
