//! Team store.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::{is_unique_violation, members};
use crate::errors::AppError;
use crate::models::{Team, TeamMember, TeamSummary};

/// Insert a team and return its generated id.
pub async fn insert(conn: &mut SqliteConnection, name: &str) -> Result<i64, AppError> {
    let row = sqlx::query("INSERT INTO teams (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::TeamExists(name.to_string())
            } else {
                e.into()
            }
        })?;
    Ok(row.get("id"))
}

/// Get a team with its members ordered by username.
pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Team, AppError> {
    let row = sqlx::query("SELECT id, name FROM teams WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::TeamNotFound(name.to_string()))?;
    with_members(conn, summary_from_row(&row)).await
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Team, AppError> {
    let row = sqlx::query("SELECT id, name FROM teams WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::TeamNotFound(id.to_string()))?;
    with_members(conn, summary_from_row(&row)).await
}

pub async fn exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM teams WHERE name = ?) AS found")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get::<i64, _>("found") != 0)
}

pub async fn exists_by_id(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?) AS found")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get::<i64, _>("found") != 0)
}

/// All teams ordered by name.
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<TeamSummary>, AppError> {
    let rows = sqlx::query("SELECT id, name FROM teams ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(summary_from_row).collect())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM teams")
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("total"))
}

async fn with_members(conn: &mut SqliteConnection, summary: TeamSummary) -> Result<Team, AppError> {
    let members = members::list_by_team(conn, summary.id)
        .await?
        .into_iter()
        .map(TeamMember::from)
        .collect();
    Ok(Team {
        id: summary.id,
        name: summary.name,
        members,
    })
}

fn summary_from_row(row: &SqliteRow) -> TeamSummary {
    TeamSummary {
        id: row.get("id"),
        name: row.get("name"),
    }
}
