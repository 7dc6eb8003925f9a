//! Member service.

use crate::db::{members, reviews, tasks, Repository};
use crate::errors::AppError;
use crate::models::{Member, ReviewRequestShort, ReviewStatus, TaskKind};

#[derive(Clone)]
pub struct MemberService {
    repo: Repository,
}

impl MemberService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Flip the active flag. No-op when it already has the requested value.
    ///
    /// Deactivation queues a reassignment task in the same transaction, so
    /// the member's open reviews are drained by the task worker.
    pub async fn set_is_active(&self, user_id: &str, active: bool) -> Result<Member, AppError> {
        require_user_id(user_id)?;

        let mut tx = self.repo.begin_write().await?;
        let current = members::get(&mut tx, user_id).await?;
        if current.active == active {
            return Ok(current);
        }

        let member = members::set_active(&mut tx, user_id, active).await?;
        let task = if active {
            None
        } else {
            Some(tasks::insert(&mut tx, TaskKind::MemberReassignment, member.team_id, Some(user_id)).await?)
        };
        tx.commit().await?;

        match task {
            Some(task) => tracing::info!(
                user_id = %member.id,
                task_id = task.id,
                "member deactivated, reassignment queued"
            ),
            None => tracing::info!(user_id = %member.id, "member activated"),
        }
        Ok(member)
    }

    pub async fn get_member(&self, user_id: &str) -> Result<Member, AppError> {
        require_user_id(user_id)?;
        let mut conn = self.repo.acquire().await?;
        members::get(&mut conn, user_id).await
    }

    /// Open requests the member reviews.
    pub async fn reviews_for(&self, user_id: &str) -> Result<Vec<ReviewRequestShort>, AppError> {
        require_user_id(user_id)?;
        let mut conn = self.repo.acquire().await?;
        if !members::exists(&mut conn, user_id).await? {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        reviews::list_by_reviewer(&mut conn, user_id, Some(ReviewStatus::Open)).await
    }

    /// Requests the member authored, newest first.
    pub async fn authored_by(&self, user_id: &str) -> Result<Vec<ReviewRequestShort>, AppError> {
        require_user_id(user_id)?;
        let mut conn = self.repo.acquire().await?;
        if !members::exists(&mut conn, user_id).await? {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        reviews::list_by_author(&mut conn, user_id).await
    }

    /// Remove a member and its reviewer edges. Authored requests are kept.
    pub async fn delete_member(&self, user_id: &str) -> Result<(), AppError> {
        require_user_id(user_id)?;
        let mut tx = self.repo.begin_write().await?;
        members::delete(&mut tx, user_id).await?;
        tx.commit().await?;
        tracing::info!(user_id = %user_id, "member deleted");
        Ok(())
    }
}

fn require_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }
    Ok(())
}
