//! Task queue store.
//!
//! Claims are leases: a claim stamps a token and an expiry, and a
//! `processing` task whose lease ran out is claimable again. Finishing a task
//! only succeeds for the holder of the current token.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::format_timestamp;
use crate::errors::AppError;
use crate::models::{Task, TaskKind, TaskStatus};

const TASK_COLUMNS: &str = "id, kind, team_id, member_id, status, error_message, claim_token, created_at, claimed_at, lease_expires_at, processed_at";

/// Insert a pending task.
pub async fn insert(
    conn: &mut SqliteConnection,
    kind: TaskKind,
    team_id: i64,
    member_id: Option<&str>,
) -> Result<Task, AppError> {
    let row = sqlx::query(&format!(
        "INSERT INTO tasks (kind, team_id, member_id, status, created_at) VALUES (?, ?, ?, ?, ?) RETURNING {TASK_COLUMNS}"
    ))
    .bind(kind.as_str())
    .bind(team_id)
    .bind(member_id)
    .bind(TaskStatus::Pending.as_str())
    .bind(format_timestamp(Utc::now()))
    .fetch_one(&mut *conn)
    .await?;
    task_from_row(&row)
}

/// Atomically claim the oldest claimable task, if any.
pub async fn claim_next(
    conn: &mut SqliteConnection,
    token: &str,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<Option<Task>, AppError> {
    let now = format_timestamp(now);
    let row = sqlx::query(&format!(
        r#"
        UPDATE tasks
        SET status = 'processing', claim_token = ?, claimed_at = ?, lease_expires_at = ?
        WHERE id = (
            SELECT id FROM tasks
            WHERE status = 'pending'
               OR (status = 'processing' AND lease_expires_at < ?)
            ORDER BY created_at, id
            LIMIT 1
        )
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(token)
    .bind(&now)
    .bind(format_timestamp(lease_until))
    .bind(&now)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(task_from_row).transpose()
}

/// Move a claimed task to a terminal status.
///
/// Returns `false` when `token` no longer holds the claim.
pub async fn finish(
    conn: &mut SqliteConnection,
    id: i64,
    token: &str,
    status: TaskStatus,
    error_message: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    debug_assert!(status.is_terminal());
    let result = sqlx::query(
        "UPDATE tasks SET status = ?, error_message = ?, processed_at = ? WHERE id = ? AND claim_token = ? AND status = 'processing'",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(format_timestamp(now))
    .bind(id)
    .bind(token)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Task, AppError> {
    let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))?;
    task_from_row(&row)
}

fn task_from_row(row: &SqliteRow) -> Result<Task, AppError> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(Task {
        id: row.get("id"),
        kind: kind.parse()?,
        team_id: row.get("team_id"),
        member_id: row.get("member_id"),
        status: status.parse()?,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        claimed_at: row.get("claimed_at"),
        processed_at: row.get("processed_at"),
        claim_token: row.get("claim_token"),
        lease_expires_at: row.get("lease_expires_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_repository;
    use chrono::Duration;

    #[tokio::test]
    async fn test_claim_oldest_first() {
        let (_dir, repo) = temp_repository().await;
        let mut conn = repo.acquire().await.unwrap();
        let first = insert(&mut conn, TaskKind::TeamDeactivation, 1, None).await.unwrap();
        let second = insert(&mut conn, TaskKind::MemberReassignment, 1, Some("u1"))
            .await
            .unwrap();
        assert_eq!(first.status, TaskStatus::Pending);
        assert_eq!(second.member_id.as_deref(), Some("u1"));

        let now = Utc::now();
        let lease = now + Duration::seconds(60);
        let claimed = claim_next(&mut conn, "t1", now, lease).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert_eq!(claimed.claim_token.as_deref(), Some("t1"));

        let claimed = claim_next(&mut conn, "t2", now, lease).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        // both held, nothing left
        assert!(claim_next(&mut conn, "t3", now, lease).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let (_dir, repo) = temp_repository().await;
        let mut conn = repo.acquire().await.unwrap();
        let task = insert(&mut conn, TaskKind::TeamDeactivation, 1, None).await.unwrap();
        drop(conn);

        let now = Utc::now();
        let lease = now + Duration::seconds(60);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let mut conn = repo.acquire().await.unwrap();
                    claim_next(&mut conn, &format!("worker-{i}"), now, lease)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            if let Some(claimed) = handle.await.unwrap() {
                winners.push(claimed);
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].id, task.id);

        let mut conn = repo.acquire().await.unwrap();
        let stored = get(&mut conn, task.id).await.unwrap();
        assert_eq!(stored.claim_token, winners[0].claim_token);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed() {
        let (_dir, repo) = temp_repository().await;
        let mut conn = repo.acquire().await.unwrap();
        let task = insert(&mut conn, TaskKind::TeamDeactivation, 7, None).await.unwrap();

        let start = Utc::now();
        claim_next(&mut conn, "old", start, start + Duration::seconds(10))
            .await
            .unwrap()
            .unwrap();

        let later = start + Duration::seconds(11);
        let reclaimed = claim_next(&mut conn, "new", later, later + Duration::seconds(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, task.id);
        assert_eq!(reclaimed.claim_token.as_deref(), Some("new"));

        // the stale holder cannot finish
        assert!(!finish(&mut conn, task.id, "old", TaskStatus::Failed, Some("boom"), later)
            .await
            .unwrap());
        assert!(finish(&mut conn, task.id, "new", TaskStatus::Completed, None, later)
            .await
            .unwrap());

        let done = get(&mut conn, task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.error_message.is_none());
        assert!(done.processed_at.is_some());

        // terminal tasks are never claimed again
        let much_later = later + Duration::days(1);
        assert!(claim_next(&mut conn, "x", much_later, much_later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_task() {
        let (_dir, repo) = temp_repository().await;
        let mut conn = repo.acquire().await.unwrap();
        assert!(matches!(get(&mut conn, 99).await, Err(AppError::NotFound(_))));
    }
}
