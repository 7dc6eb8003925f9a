//! Team model.

use serde::{Deserialize, Serialize};

use super::TeamMember;
use crate::errors::AppError;

/// A team with its members ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub members: Vec<TeamMember>,
}

/// A team without its members, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: i64,
    pub name: String,
}

/// Request body for creating a team together with its members.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Option<Vec<TeamMember>>,
}

impl CreateTeamRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.team_name.trim().is_empty() {
            return Err(AppError::InvalidInput("team_name is required".to_string()));
        }
        let members = match &self.members {
            Some(members) if !members.is_empty() => members,
            _ => {
                return Err(AppError::InvalidInput(
                    "at least one member is required".to_string(),
                ))
            }
        };
        for member in members {
            member.validate()?;
        }
        Ok(())
    }
}

/// Per-team member counts.
#[derive(Debug, Clone, Serialize)]
pub struct TeamStats {
    pub team_id: i64,
    pub team_name: String,
    pub total_members: usize,
    pub active_members: usize,
}
