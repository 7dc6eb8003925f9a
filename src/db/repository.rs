//! Shared database handle.
//!
//! Owns the pool and hands out connections and write transactions.

use chrono::Utc;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::{format_timestamp, members, reviews, teams};
use crate::errors::AppError;

/// Whole-store counters.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_users: i64,
    pub total_teams: i64,
    pub total_prs: i64,
    pub revision_id: i64,
}

/// Database repository handle.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A pooled connection for reads and single-statement writes.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, AppError> {
        Ok(self.pool.acquire().await?)
    }

    /// Open a write transaction.
    ///
    /// The first statement bumps the revision counter, which takes SQLite's
    /// write lock up front. Everything read afterwards in the transaction is
    /// the latest committed state and no other writer can interleave until
    /// commit or rollback. Dropping the transaction rolls it back.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(format_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let mut conn = self.acquire().await?;
        revision_id(&mut conn).await
    }

    /// Counters read over a single connection.
    pub async fn global_stats(&self) -> Result<GlobalStats, AppError> {
        let mut conn = self.acquire().await?;
        Ok(GlobalStats {
            total_users: members::count(&mut conn).await?,
            total_teams: teams::count(&mut conn).await?,
            total_prs: reviews::count(&mut conn).await?,
            revision_id: revision_id(&mut conn).await?,
        })
    }
}

async fn revision_id(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("revision_id"))
}
