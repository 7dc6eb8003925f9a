//! Review request model (a pull request awaiting review).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Upper bound on reviewers per request.
pub const MAX_REVIEWERS: usize = 2;

/// Lifecycle state of a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Open,
    Merged,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Open => "OPEN",
            ReviewStatus::Merged => "MERGED",
        }
    }

    /// Integer code persisted in `pull_requests.status_id`.
    pub fn code(&self) -> i64 {
        match self {
            ReviewStatus::Open => 1,
            ReviewStatus::Merged => 2,
        }
    }

    /// Unknown codes decode as `Open`.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => ReviewStatus::Merged,
            _ => ReviewStatus::Open,
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(ReviewStatus::Open),
            "MERGED" => Ok(ReviewStatus::Merged),
            other => Err(AppError::InvalidInput(format!("unknown status {other}"))),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A review request with its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
    pub status: ReviewStatus,
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    /// A fresh OPEN request. Reviewers are kept sorted by id.
    pub fn open(
        id: impl Into<String>,
        title: impl Into<String>,
        author_id: impl Into<String>,
        mut reviewers: Vec<String>,
    ) -> Self {
        reviewers.sort();
        Self {
            id: id.into(),
            title: title.into(),
            author_id: author_id.into(),
            status: ReviewStatus::Open,
            assigned_reviewers: reviewers,
            created_at: now_micros(),
            merged_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "pull_request_id is required".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "pull_request_name is required".to_string(),
            ));
        }
        if self.author_id.trim().is_empty() {
            return Err(AppError::InvalidInput("author_id is required".to_string()));
        }
        if self.assigned_reviewers.len() > MAX_REVIEWERS {
            return Err(AppError::InvalidInput(format!(
                "at most {MAX_REVIEWERS} reviewers allowed"
            )));
        }
        let unique: HashSet<&str> = self.assigned_reviewers.iter().map(String::as_str).collect();
        if unique.len() != self.assigned_reviewers.len() {
            return Err(AppError::InvalidInput("duplicate reviewer".to_string()));
        }
        if unique.contains(self.author_id.as_str()) {
            return Err(AppError::InvalidInput(
                "author cannot review their own request".to_string(),
            ));
        }
        Ok(())
    }

    /// Mark merged in memory and return the merge time. An existing merge time is kept.
    pub fn merge(&mut self) -> DateTime<Utc> {
        self.status = ReviewStatus::Merged;
        *self.merged_at.get_or_insert_with(now_micros)
    }

    pub fn is_merged(&self) -> bool {
        self.status == ReviewStatus::Merged
    }

    pub fn can_be_modified(&self) -> bool {
        self.status == ReviewStatus::Open
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }

    pub fn is_author(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }
}

/// Current time at the microsecond precision the store keeps.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Listing projection of a review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequestShort {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
    pub status: ReviewStatus,
}

/// Request body for creating a review request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Request body for merging a review request.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeReviewRequest {
    pub pull_request_id: String,
}

/// Request body for replacing one reviewer.
#[derive(Debug, Clone, Deserialize)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

/// Request body for renaming an open review request.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameReviewRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
}

/// Outcome of a successful reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct Reassignment {
    pub pr: ReviewRequest,
    pub replaced_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ReviewRequest {
        ReviewRequest::open("pr-1", "Fix bug", "user-1", vec![])
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_fields() {
        let mut pr = valid();
        pr.id = String::new();
        assert!(pr.validate().is_err());

        let mut pr = valid();
        pr.title = "  ".into();
        assert!(pr.validate().is_err());

        let mut pr = valid();
        pr.author_id = String::new();
        assert!(pr.validate().is_err());
    }

    #[test]
    fn test_too_many_reviewers() {
        let pr = ReviewRequest::open("pr-1", "Fix", "a", vec!["r1".into(), "r2".into(), "r3".into()]);
        assert!(pr.validate().is_err());
    }

    #[test]
    fn test_duplicate_or_author_reviewer() {
        let pr = ReviewRequest::open("pr-1", "Fix", "a", vec!["r1".into(), "r1".into()]);
        assert!(pr.validate().is_err());

        let pr = ReviewRequest::open("pr-1", "Fix", "a", vec!["a".into()]);
        assert!(pr.validate().is_err());
    }

    #[test]
    fn test_unknown_status_string() {
        assert!("INVALID".parse::<ReviewStatus>().is_err());
        assert_eq!("MERGED".parse::<ReviewStatus>().unwrap(), ReviewStatus::Merged);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ReviewStatus::Open.code(), 1);
        assert_eq!(ReviewStatus::Merged.code(), 2);
        assert_eq!(ReviewStatus::from_code(2), ReviewStatus::Merged);
        assert_eq!(ReviewStatus::from_code(99), ReviewStatus::Open);
    }

    #[test]
    fn test_business_rules() {
        let mut pr = ReviewRequest::open("pr-1", "Fix", "a", vec!["c".into(), "b".into()]);
        assert_eq!(pr.assigned_reviewers, vec!["b", "c"]);
        assert!(pr.can_be_modified());
        assert!(!pr.is_merged());
        assert!(pr.has_reviewer("b"));
        assert!(!pr.has_reviewer("a"));
        assert!(pr.is_author("a"));

        pr.merge();
        assert!(pr.is_merged());
        assert!(!pr.can_be_modified());
        let first = pr.merged_at.expect("merged_at set");
        assert!(Utc::now() - first < chrono::Duration::seconds(1));

        pr.merge();
        assert_eq!(pr.merged_at, Some(first));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(valid()).unwrap();
        assert_eq!(json["pull_request_id"], "pr-1");
        assert_eq!(json["pull_request_name"], "Fix bug");
        assert_eq!(json["status"], "OPEN");
        assert!(json.get("mergedAt").is_none());
        assert!(json["createdAt"].is_string());
    }
}
