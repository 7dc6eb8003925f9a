//! Queue task model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// What a task does when processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Deactivate every member of a team and drain their reviews.
    TeamDeactivation,
    /// Drain the reviews of one member that was deactivated individually.
    MemberReassignment,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::TeamDeactivation => "team_deactivation",
            TaskKind::MemberReassignment => "member_reassignment",
        }
    }
}

impl FromStr for TaskKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team_deactivation" => Ok(TaskKind::TeamDeactivation),
            "member_reassignment" => Ok(TaskKind::MemberReassignment),
            other => Err(AppError::Internal(format!("unknown task kind {other}"))),
        }
    }
}

/// `pending -> processing -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(AppError::Internal(format!("unknown task status {other}"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    #[serde(rename = "task_id")]
    pub id: i64,
    pub kind: TaskKind,
    pub team_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub claim_token: Option<String>,
    #[serde(skip)]
    pub lease_expires_at: Option<DateTime<Utc>>,
}

/// Request body for scheduling a team deactivation.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchDeactivateRequest {
    pub team_id: i64,
}

impl BatchDeactivateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.team_id <= 0 {
            return Err(AppError::InvalidInput("team_id must be positive".to_string()));
        }
        Ok(())
    }
}
