//! Member model: a user scoped to one team.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

static USER_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

/// A user as stored, including its owning team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "user_id")]
    pub id: String,
    #[serde(rename = "username")]
    pub name: String,
    pub team_id: i64,
    #[serde(rename = "is_active")]
    pub active: bool,
}

impl Member {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identity(&self.id, &self.name)?;
        if self.team_id <= 0 {
            return Err(AppError::InvalidInput(format!(
                "user {} has no valid team",
                self.id
            )));
        }
        Ok(())
    }
}

/// A member as listed inside its team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identity(&self.user_id, &self.username)
    }

    /// Bind this member to a team, producing the stored record.
    pub fn into_member(self, team_id: i64) -> Member {
        Member {
            id: self.user_id,
            name: self.username,
            team_id,
            active: self.is_active,
        }
    }
}

impl From<Member> for TeamMember {
    fn from(member: Member) -> Self {
        Self {
            user_id: member.id,
            username: member.name,
            is_active: member.active,
        }
    }
}

/// True when `id` is non-empty and made of ASCII letters, digits, `_` or `-`.
pub fn is_valid_user_id(id: &str) -> bool {
    USER_ID_PATTERN.as_ref().is_some_and(|re| re.is_match(id))
}

fn validate_identity(id: &str, name: &str) -> Result<(), AppError> {
    if id.is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }
    if !is_valid_user_id(id) {
        return Err(AppError::InvalidInput(format!(
            "invalid user_id format: {id}"
        )));
    }
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "username is required for {id}"
        )));
    }
    Ok(())
}

/// Request body for toggling a member's active flag.
#[derive(Debug, Clone, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}
