//! Background task worker.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::assignment::AssignmentEngine;
use crate::db::{members, tasks, Repository};
use crate::errors::AppError;
use crate::models::{Task, TaskKind, TaskStatus};

/// Polls the task table and runs one claimed task per tick.
pub struct TaskWorker {
    repo: Repository,
    engine: AssignmentEngine,
    poll_interval: Duration,
    lease: Duration,
}

impl TaskWorker {
    pub fn new(
        repo: Repository,
        engine: AssignmentEngine,
        poll_interval: Duration,
        lease: Duration,
    ) -> Self {
        Self {
            repo,
            engine,
            poll_interval,
            lease,
        }
    }

    /// Poll until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Task worker started, polling every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.process_next().await {
                        tracing::error!("Task poll failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Task worker stopped");
    }

    /// Claim and run the oldest claimable task.
    ///
    /// Returns the task as stored afterwards, or `None` when nothing was
    /// claimable.
    pub async fn process_next(&self) -> Result<Option<Task>, AppError> {
        let lease = chrono::Duration::from_std(self.lease)
            .map_err(|e| AppError::Internal(format!("invalid task lease: {e}")))?;
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();

        let claimed = {
            let mut conn = self.repo.acquire().await?;
            tasks::claim_next(&mut conn, &token, now, now + lease).await?
        };
        let Some(task) = claimed else {
            return Ok(None);
        };
        tracing::info!(task_id = task.id, kind = task.kind.as_str(), "task claimed");

        let outcome = match task.kind {
            TaskKind::TeamDeactivation => self.run_team_deactivation(task.team_id).await,
            TaskKind::MemberReassignment => self.run_member_reassignment(&task).await,
        };
        let (status, error_message) = match &outcome {
            Ok(()) => (TaskStatus::Completed, None),
            Err(e) => (TaskStatus::Failed, Some(e.to_string())),
        };

        let mut conn = self.repo.acquire().await?;
        let finished = tasks::finish(
            &mut conn,
            task.id,
            &token,
            status,
            error_message.as_deref(),
            Utc::now(),
        )
        .await?;

        if !finished {
            tracing::warn!(task_id = task.id, "task lease lost before finishing, outcome dropped");
        } else if let Some(message) = &error_message {
            tracing::error!(task_id = task.id, "task failed: {}", message);
        } else {
            tracing::info!(task_id = task.id, "task completed");
        }

        Ok(Some(tasks::get(&mut conn, task.id).await?))
    }

    /// Deactivate every team member, then drain each one's open reviews.
    ///
    /// Only failing to read the roster fails the task.
    async fn run_team_deactivation(&self, team_id: i64) -> Result<(), AppError> {
        let roster = {
            let mut conn = self.repo.acquire().await?;
            members::list_by_team(&mut conn, team_id).await?
        };
        if roster.is_empty() {
            tracing::info!(team_id, "team has no members, nothing to deactivate");
            return Ok(());
        }

        let mut deactivated = Vec::with_capacity(roster.len());
        for member in roster {
            match self.deactivate(&member.id).await {
                Ok(()) => deactivated.push(member.id),
                Err(e) => {
                    tracing::warn!(team_id, user_id = %member.id, "deactivation failed: {}", e)
                }
            }
        }

        for member_id in &deactivated {
            self.drain(member_id).await;
        }
        tracing::info!(team_id, members = deactivated.len(), "team deactivated");
        Ok(())
    }

    async fn run_member_reassignment(&self, task: &Task) -> Result<(), AppError> {
        let member_id = task
            .member_id
            .as_deref()
            .ok_or_else(|| AppError::Internal(format!("task {} has no member", task.id)))?;

        let member = {
            let mut conn = self.repo.acquire().await?;
            members::get(&mut conn, member_id).await
        };
        match member {
            // Deleting a member already dropped its reviewer edges.
            Err(AppError::UserNotFound(_)) => Ok(()),
            Err(e) => Err(e),
            Ok(member) if member.active => {
                tracing::info!(user_id = %member_id, "member active again, skipping reassignment");
                Ok(())
            }
            Ok(_) => {
                self.drain(member_id).await;
                Ok(())
            }
        }
    }

    async fn deactivate(&self, member_id: &str) -> Result<(), AppError> {
        let mut tx = self.repo.begin_write().await?;
        members::set_active(&mut tx, member_id, false).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn drain(&self, member_id: &str) {
        match self.engine.drain_reviewer(member_id).await {
            Ok(report) => tracing::info!(
                user_id = %member_id,
                reassigned = report.reassigned,
                released = report.released,
                failed = report.failed,
                "reviews drained"
            ),
            Err(e) => tracing::error!(user_id = %member_id, "draining reviews failed: {}", e),
        }
    }
}
