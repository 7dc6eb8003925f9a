//! Team service.

use crate::db::{members, teams, Repository};
use crate::errors::AppError;
use crate::models::{CreateTeamRequest, Team, TeamStats, TeamSummary};

#[derive(Clone)]
pub struct TeamService {
    repo: Repository,
}

impl TeamService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a team and upsert its members as one unit.
    ///
    /// A member that already exists elsewhere is moved into the new team.
    pub async fn create_team(&self, request: CreateTeamRequest) -> Result<Team, AppError> {
        request.validate()?;

        let mut tx = self.repo.begin_write().await?;
        if teams::exists(&mut tx, &request.team_name).await? {
            return Err(AppError::TeamExists(request.team_name));
        }
        let team_id = teams::insert(&mut tx, &request.team_name).await?;
        for member in request.members.unwrap_or_default() {
            let member = member.into_member(team_id);
            member.validate()?;
            members::upsert(&mut tx, &member).await?;
        }
        let team = teams::get_by_name(&mut tx, &request.team_name).await?;
        tx.commit().await?;

        tracing::info!(team_id = team.id, members = team.members.len(), "team created");
        Ok(team)
    }

    pub async fn get_team(&self, name: &str) -> Result<Team, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("team_name is required".to_string()));
        }
        let mut conn = self.repo.acquire().await?;
        teams::get_by_name(&mut conn, name).await
    }

    pub async fn list_teams(&self) -> Result<Vec<TeamSummary>, AppError> {
        let mut conn = self.repo.acquire().await?;
        teams::list(&mut conn).await
    }

    pub async fn team_stats(&self, name: &str) -> Result<TeamStats, AppError> {
        let team = self.get_team(name).await?;
        let mut conn = self.repo.acquire().await?;
        let active = members::list_active_by_team(&mut conn, team.id).await?;
        Ok(TeamStats {
            team_id: team.id,
            team_name: team.name,
            total_members: team.members.len(),
            active_members: active.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{team_member, temp_repository};

    fn request(name: &str, ids: &[(&str, bool)]) -> CreateTeamRequest {
        CreateTeamRequest {
            team_name: name.to_string(),
            members: Some(ids.iter().map(|(id, active)| team_member(id, *active)).collect()),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (_dir, repo) = temp_repository().await;
        let service = TeamService::new(repo);

        let team = service
            .create_team(request("backend", &[("u1", true), ("u2", false)]))
            .await
            .unwrap();
        assert_eq!(team.name, "backend");
        assert_eq!(team.members.len(), 2);
        assert_eq!(service.get_team("backend").await.unwrap(), team);

        let stats = service.team_stats("backend").await.unwrap();
        assert_eq!(stats.total_members, 2);
        assert_eq!(stats.active_members, 1);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let (_dir, repo) = temp_repository().await;
        let service = TeamService::new(repo.clone());
        service.create_team(request("backend", &[("u1", true)])).await.unwrap();

        let err = service
            .create_team(request("backend", &[("u9", true)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TeamExists(_)));

        let mut conn = repo.acquire().await.unwrap();
        assert!(!members::exists(&mut conn, "u9").await.unwrap());
    }

    #[tokio::test]
    async fn test_member_moves_to_new_team() {
        let (_dir, repo) = temp_repository().await;
        let service = TeamService::new(repo);
        service.create_team(request("old", &[("u1", true)])).await.unwrap();
        service.create_team(request("new", &[("u1", true)])).await.unwrap();

        assert!(service.get_team("old").await.unwrap().members.is_empty());
        assert_eq!(service.get_team("new").await.unwrap().members.len(), 1);
        let names: Vec<String> = service.list_teams().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (_dir, repo) = temp_repository().await;
        let service = TeamService::new(repo);

        assert!(matches!(
            service.create_team(request("empty", &[])).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(service.get_team("").await, Err(AppError::InvalidInput(_))));
        assert!(matches!(service.get_team("nope").await, Err(AppError::TeamNotFound(_))));
    }
}
