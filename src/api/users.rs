//! User API endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{accepted, required, success, ApiResult};
use crate::models::{
    BatchDeactivateRequest, Member, ReviewRequestShort, SetIsActiveRequest, TaskStatus,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Review requests related to one user.
#[derive(Debug, Serialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<ReviewRequestShort>,
}

/// Handle returned for a queued deactivation.
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: i64,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct DeletedUser {
    pub user_id: String,
}

/// POST /users/setIsActive - Activate or deactivate a user.
pub async fn set_is_active(
    State(state): State<AppState>,
    Json(request): Json<SetIsActiveRequest>,
) -> ApiResult<Member> {
    success(
        state
            .members
            .set_is_active(&request.user_id, request.is_active)
            .await?,
    )
}

/// GET /users/getReview?user_id= - Open requests the user reviews.
pub async fn get_user_reviews(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<UserReviews> {
    let user_id = required("user_id", query.user_id)?;
    let pull_requests = state.members.reviews_for(&user_id).await?;
    success(UserReviews {
        user_id,
        pull_requests,
    })
}

/// GET /users/getAuthored?user_id= - Requests the user authored.
pub async fn get_user_authored(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<UserReviews> {
    let user_id = required("user_id", query.user_id)?;
    let pull_requests = state.members.authored_by(&user_id).await?;
    success(UserReviews {
        user_id,
        pull_requests,
    })
}

/// POST /users/batchDeactivate - Queue deactivation of a whole team.
pub async fn batch_deactivate(
    State(state): State<AppState>,
    Json(request): Json<BatchDeactivateRequest>,
) -> ApiResult<TaskAccepted> {
    let task = state.queue.enqueue_team_deactivation(&request).await?;
    accepted(TaskAccepted {
        task_id: task.id,
        status: task.status,
    })
}

/// GET /users/{user_id} - Get a single user.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Member> {
    success(state.members.get_member(&user_id).await?)
}

/// DELETE /users/{user_id} - Remove a user and its reviewer assignments.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<DeletedUser> {
    state.members.delete_member(&user_id).await?;
    success(DeletedUser { user_id })
}
