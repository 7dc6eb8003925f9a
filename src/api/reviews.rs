//! Review request API endpoints.

use axum::extract::State;
use axum::Json;

use super::{created, success, ApiResult};
use crate::models::{
    CreateReviewRequest, MergeReviewRequest, Reassignment, ReassignReviewerRequest,
    RenameReviewRequest, ReviewRequest,
};
use crate::AppState;

/// POST /pullRequest/create - Create a request and assign reviewers.
pub async fn create_review_request(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<ReviewRequest> {
    let pr = state
        .engine
        .create_review_request(
            &request.pull_request_id,
            &request.pull_request_name,
            &request.author_id,
        )
        .await?;
    created(pr)
}

/// POST /pullRequest/merge - Merge a request. Repeating it is harmless.
pub async fn merge_review_request(
    State(state): State<AppState>,
    Json(request): Json<MergeReviewRequest>,
) -> ApiResult<ReviewRequest> {
    success(state.engine.merge(&request.pull_request_id).await?)
}

/// POST /pullRequest/reassign - Replace one reviewer.
pub async fn reassign_reviewer(
    State(state): State<AppState>,
    Json(request): Json<ReassignReviewerRequest>,
) -> ApiResult<Reassignment> {
    let outcome = state
        .engine
        .reassign_reviewer(&request.pull_request_id, &request.old_user_id)
        .await?;
    success(outcome)
}

/// POST /pullRequest/rename - Rename an open request.
pub async fn rename_review_request(
    State(state): State<AppState>,
    Json(request): Json<RenameReviewRequest>,
) -> ApiResult<ReviewRequest> {
    let pr = state
        .engine
        .rename(&request.pull_request_id, &request.pull_request_name)
        .await?;
    success(pr)
}
