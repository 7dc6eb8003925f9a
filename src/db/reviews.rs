//! Review request store, including reviewer edges.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::{format_timestamp, is_unique_violation};
use crate::errors::AppError;
use crate::models::{ReviewRequest, ReviewRequestShort, ReviewStatus};

/// Insert a request and its reviewer edges.
pub async fn insert(conn: &mut SqliteConnection, pr: &ReviewRequest) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO pull_requests (id, pull_request_name, author_id, status_id, created_at, merged_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&pr.id)
    .bind(&pr.title)
    .bind(&pr.author_id)
    .bind(pr.status.code())
    .bind(format_timestamp(pr.created_at))
    .bind(pr.merged_at.map(format_timestamp))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::ReviewRequestExists(pr.id.clone())
        } else {
            e.into()
        }
    })?;

    for reviewer in &pr.assigned_reviewers {
        add_reviewer(conn, &pr.id, reviewer).await?;
    }
    Ok(())
}

/// Get a request with its reviewers ordered by id.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<ReviewRequest, AppError> {
    let row = sqlx::query(
        "SELECT id, pull_request_name, author_id, status_id, created_at, merged_at FROM pull_requests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::ReviewRequestNotFound(id.to_string()))?;

    let assigned_reviewers = reviewers(conn, id).await?;
    Ok(review_from_row(&row, assigned_reviewers))
}

pub async fn reviewers(conn: &mut SqliteConnection, id: &str) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query("SELECT user_id FROM pr_reviewers WHERE pull_request_id = ? ORDER BY user_id")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(|row| row.get("user_id")).collect())
}

/// Write title, status and merge time. Reviewer edges are left alone.
pub async fn update(conn: &mut SqliteConnection, pr: &ReviewRequest) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE pull_requests SET pull_request_name = ?, status_id = ?, merged_at = ? WHERE id = ?",
    )
    .bind(&pr.title)
    .bind(pr.status.code())
    .bind(pr.merged_at.map(format_timestamp))
    .bind(&pr.id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::ReviewRequestNotFound(pr.id.clone()));
    }
    Ok(())
}

/// Mark merged. An existing merge time wins over `merged_at`; the stored one is returned.
pub async fn merge(
    conn: &mut SqliteConnection,
    id: &str,
    merged_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, AppError> {
    let row = sqlx::query(
        "UPDATE pull_requests SET status_id = ?, merged_at = COALESCE(merged_at, ?) WHERE id = ? RETURNING merged_at",
    )
    .bind(ReviewStatus::Merged.code())
    .bind(format_timestamp(merged_at))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::ReviewRequestNotFound(id.to_string()))?;
    Ok(row.get("merged_at"))
}

/// Swap one reviewer edge for another.
pub async fn replace_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    old_reviewer: &str,
    new_reviewer: &str,
) -> Result<(), AppError> {
    if !remove_reviewer(conn, pr_id, old_reviewer).await? {
        return Err(AppError::ReviewerNotAssigned {
            pr_id: pr_id.to_string(),
            user_id: old_reviewer.to_string(),
        });
    }
    add_reviewer(conn, pr_id, new_reviewer).await
}

/// Remove one reviewer edge. Returns whether an edge existed.
pub async fn remove_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM pr_reviewers WHERE pull_request_id = ? AND user_id = ?")
        .bind(pr_id)
        .bind(reviewer)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Requests the user reviews, optionally filtered by status, ordered by id.
pub async fn list_by_reviewer(
    conn: &mut SqliteConnection,
    user_id: &str,
    status: Option<ReviewStatus>,
) -> Result<Vec<ReviewRequestShort>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.pull_request_name, p.author_id, p.status_id
        FROM pull_requests p
        JOIN pr_reviewers r ON r.pull_request_id = p.id
        WHERE r.user_id = ? AND (? IS NULL OR p.status_id = ?)
        ORDER BY p.id
        "#,
    )
    .bind(user_id)
    .bind(status.map(|s| s.code()))
    .bind(status.map(|s| s.code()))
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(short_from_row).collect())
}

/// Requests authored by the user, newest first.
pub async fn list_by_author(
    conn: &mut SqliteConnection,
    author_id: &str,
) -> Result<Vec<ReviewRequestShort>, AppError> {
    let rows = sqlx::query(
        "SELECT id, pull_request_name, author_id, status_id FROM pull_requests WHERE author_id = ? ORDER BY created_at DESC, id",
    )
    .bind(author_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(short_from_row).collect())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM pull_requests")
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("total"))
}

async fn add_reviewer(conn: &mut SqliteConnection, pr_id: &str, reviewer: &str) -> Result<(), AppError> {
    sqlx::query("INSERT INTO pr_reviewers (pull_request_id, user_id) VALUES (?, ?)")
        .bind(pr_id)
        .bind(reviewer)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn review_from_row(row: &SqliteRow, assigned_reviewers: Vec<String>) -> ReviewRequest {
    let status_id: i64 = row.get("status_id");
    ReviewRequest {
        id: row.get("id"),
        title: row.get("pull_request_name"),
        author_id: row.get("author_id"),
        status: ReviewStatus::from_code(status_id),
        assigned_reviewers,
        created_at: row.get("created_at"),
        merged_at: row.get("merged_at"),
    }
}

fn short_from_row(row: &SqliteRow) -> ReviewRequestShort {
    let status_id: i64 = row.get("status_id");
    ReviewRequestShort {
        id: row.get("id"),
        title: row.get("pull_request_name"),
        author_id: row.get("author_id"),
        status: ReviewStatus::from_code(status_id),
    }
}
