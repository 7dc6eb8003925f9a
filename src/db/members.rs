//! Member (user) store.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;
use crate::models::Member;

const MEMBER_COLUMNS: &str = "id, username, team_id, is_active";

/// Insert a member, or overwrite name, team and flag of an existing one.
pub async fn upsert(conn: &mut SqliteConnection, member: &Member) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, team_id, is_active) VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            team_id = excluded.team_id,
            is_active = excluded.is_active
        "#,
    )
    .bind(&member.id)
    .bind(&member.name)
    .bind(member.team_id)
    .bind(member.active as i32)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Member, AppError> {
    let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::UserNotFound(id.to_string()))?;
    Ok(member_from_row(&row))
}

/// Members of a team ordered by username, then id.
pub async fn list_by_team(conn: &mut SqliteConnection, team_id: i64) -> Result<Vec<Member>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {MEMBER_COLUMNS} FROM users WHERE team_id = ? ORDER BY username, id"
    ))
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(member_from_row).collect())
}

pub async fn list_active_by_team(
    conn: &mut SqliteConnection,
    team_id: i64,
) -> Result<Vec<Member>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {MEMBER_COLUMNS} FROM users WHERE team_id = ? AND is_active = 1 ORDER BY username, id"
    ))
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(member_from_row).collect())
}

/// Active members of a team other than `exclude`, ordered by username, then id.
pub async fn list_active_excluding(
    conn: &mut SqliteConnection,
    team_id: i64,
    exclude: &[&str],
) -> Result<Vec<Member>, AppError> {
    let mut sql = format!("SELECT {MEMBER_COLUMNS} FROM users WHERE team_id = ? AND is_active = 1");
    if !exclude.is_empty() {
        let placeholders = vec!["?"; exclude.len()].join(", ");
        sql.push_str(&format!(" AND id NOT IN ({placeholders})"));
    }
    sql.push_str(" ORDER BY username, id");

    let mut query = sqlx::query(&sql).bind(team_id);
    for id in exclude {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(member_from_row).collect())
}

/// Set the active flag and return the updated member.
pub async fn set_active(
    conn: &mut SqliteConnection,
    id: &str,
    active: bool,
) -> Result<Member, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE users SET is_active = ? WHERE id = ? RETURNING {MEMBER_COLUMNS}"
    ))
    .bind(active as i32)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::UserNotFound(id.to_string()))?;
    Ok(member_from_row(&row))
}

pub async fn exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?) AS found")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get::<i64, _>("found") != 0)
}

/// Delete a member. Reviewer edges cascade; authored requests stay.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::UserNotFound(id.to_string()));
    }
    Ok(())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM users")
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("total"))
}

fn member_from_row(row: &SqliteRow) -> Member {
    let is_active: i64 = row.get("is_active");
    Member {
        id: row.get("id"),
        name: row.get("username"),
        team_id: row.get("team_id"),
        active: is_active != 0,
    }
}
