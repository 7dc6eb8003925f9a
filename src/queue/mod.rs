//! Durable deactivation queue.
//!
//! Tasks are rows in the `tasks` table. [`DeactivationQueue`] enqueues and
//! reads them; [`TaskWorker`] claims and runs them in the background.

mod worker;

pub use worker::TaskWorker;

use crate::db::{tasks, teams, Repository};
use crate::errors::AppError;
use crate::models::{BatchDeactivateRequest, Task, TaskKind};

#[derive(Clone)]
pub struct DeactivationQueue {
    repo: Repository,
}

impl DeactivationQueue {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Queue deactivation of a whole team. Returns the pending task.
    pub async fn enqueue_team_deactivation(
        &self,
        request: &BatchDeactivateRequest,
    ) -> Result<Task, AppError> {
        request.validate()?;

        let mut tx = self.repo.begin_write().await?;
        if !teams::exists_by_id(&mut tx, request.team_id).await? {
            return Err(AppError::TeamNotFound(request.team_id.to_string()));
        }
        let task = tasks::insert(&mut tx, TaskKind::TeamDeactivation, request.team_id, None).await?;
        tx.commit().await?;

        tracing::info!(task_id = task.id, team_id = task.team_id, "team deactivation queued");
        Ok(task)
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, AppError> {
        let mut conn = self.repo.acquire().await?;
        tasks::get(&mut conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_team, temp_repository};
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn test_enqueue_returns_pending_task() {
        let (_dir, repo) = temp_repository().await;
        let team_id = seed_team(&repo, "core", &[("a", true)]).await;
        let queue = DeactivationQueue::new(repo);

        let task = queue
            .enqueue_team_deactivation(&BatchDeactivateRequest { team_id })
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.kind, TaskKind::TeamDeactivation);
        assert_eq!(queue.get_task(task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_team() {
        let (_dir, repo) = temp_repository().await;
        let queue = DeactivationQueue::new(repo);

        assert!(matches!(
            queue.enqueue_team_deactivation(&BatchDeactivateRequest { team_id: 404 }).await,
            Err(AppError::TeamNotFound(_))
        ));
        assert!(matches!(
            queue.enqueue_team_deactivation(&BatchDeactivateRequest { team_id: 0 }).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(queue.get_task(1).await, Err(AppError::NotFound(_))));
    }
}
