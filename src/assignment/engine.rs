//! Assignment engine: creates review requests, merges them and swaps reviewers.
//!
//! Every mutation runs in one write transaction (see
//! [`Repository::begin_write`]) and re-reads the rows it touches inside it.

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::SqliteConnection;

use super::eligibility::eligible_candidates;
use super::picker::ReviewerPicker;
use crate::db::{members, reviews, Repository};
use crate::errors::AppError;
use crate::models::{Member, Reassignment, ReviewRequest, ReviewStatus, MAX_REVIEWERS};

/// Outcome of moving one member off all open review requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub reassigned: usize,
    pub released: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct AssignmentEngine {
    repo: Repository,
    picker: Arc<dyn ReviewerPicker>,
}

impl AssignmentEngine {
    pub fn new(repo: Repository, picker: Arc<dyn ReviewerPicker>) -> Self {
        Self { repo, picker }
    }

    /// Create an OPEN request and assign up to two reviewers from the author's team.
    pub async fn create_review_request(
        &self,
        id: &str,
        title: &str,
        author_id: &str,
    ) -> Result<ReviewRequest, AppError> {
        let mut pr = ReviewRequest::open(id, title, author_id, Vec::new());
        pr.validate()?;

        let mut tx = self.repo.begin_write().await?;
        let author = members::get(&mut tx, author_id).await.map_err(|e| match e {
            AppError::UserNotFound(id) => AppError::AuthorNotFound(id),
            other => other,
        })?;

        let team_members = members::list_by_team(&mut tx, author.team_id).await?;
        let exclude: HashSet<&str> = HashSet::from([author.id.as_str()]);
        let candidates = eligible_candidates(&team_members, &exclude);

        pr.assigned_reviewers = self.select_reviewers(candidates);
        pr.assigned_reviewers.sort();
        pr.validate()?;

        reviews::insert(&mut tx, &pr).await?;
        let created = reviews::get(&mut tx, &pr.id).await?;
        tx.commit().await?;

        tracing::info!(
            pr_id = %created.id,
            user_id = %created.author_id,
            reviewers = ?created.assigned_reviewers,
            "review request created"
        );
        Ok(created)
    }

    /// Merge a request. Merging twice returns the first result unchanged.
    pub async fn merge(&self, id: &str) -> Result<ReviewRequest, AppError> {
        require("pull_request_id", id)?;

        let mut tx = self.repo.begin_write().await?;
        let mut pr = reviews::get(&mut tx, id).await?;
        if pr.is_merged() {
            return Ok(pr);
        }

        let stamp = pr.merge();
        pr.merged_at = Some(reviews::merge(&mut tx, &pr.id, stamp).await?);
        tx.commit().await?;

        tracing::info!(pr_id = %pr.id, "review request merged");
        Ok(pr)
    }

    /// Replace `old_reviewer_id` with a random eligible member of their team.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        require("pull_request_id", pr_id)?;
        require("old_user_id", old_reviewer_id)?;

        let mut tx = self.repo.begin_write().await?;
        let pr = reviews::get(&mut tx, pr_id).await?;
        let replaced_by = self.replace_in(&mut tx, &pr, old_reviewer_id).await?;
        let pr = reviews::get(&mut tx, pr_id).await?;
        tx.commit().await?;

        tracing::info!(
            pr_id = %pr.id,
            user_id = %old_reviewer_id,
            new_reviewer = %replaced_by,
            "reviewer reassigned"
        );
        Ok(Reassignment { pr, replaced_by })
    }

    /// Drop a reviewer from an open request without a replacement.
    ///
    /// Returns `false` if the request is merged or the edge is already gone.
    pub async fn release_reviewer(&self, pr_id: &str, reviewer_id: &str) -> Result<bool, AppError> {
        let mut tx = self.repo.begin_write().await?;
        let pr = reviews::get(&mut tx, pr_id).await?;
        if !pr.can_be_modified() {
            return Ok(false);
        }
        let removed = reviews::remove_reviewer(&mut tx, pr_id, reviewer_id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Change the title of an open request.
    pub async fn rename(&self, pr_id: &str, title: &str) -> Result<ReviewRequest, AppError> {
        require("pull_request_id", pr_id)?;
        require("pull_request_name", title)?;

        let mut tx = self.repo.begin_write().await?;
        let mut pr = reviews::get(&mut tx, pr_id).await?;
        if !pr.can_be_modified() {
            return Err(AppError::ReviewAlreadyMerged(pr.id));
        }
        pr.title = title.to_string();
        pr.validate()?;
        reviews::update(&mut tx, &pr).await?;
        tx.commit().await?;
        Ok(pr)
    }

    /// Move `member_id` off every open request they review.
    ///
    /// Each request is handled in its own transaction. When no replacement
    /// exists the member is released from the request. Failures are counted
    /// and logged, never returned.
    pub async fn drain_reviewer(&self, member_id: &str) -> Result<DrainReport, AppError> {
        let open = {
            let mut conn = self.repo.acquire().await?;
            reviews::list_by_reviewer(&mut conn, member_id, Some(ReviewStatus::Open)).await?
        };

        let mut report = DrainReport::default();
        for pr in open {
            match self.reassign_reviewer(&pr.id, member_id).await {
                Ok(_) => report.reassigned += 1,
                Err(AppError::NoCandidateAvailable(_)) => {
                    match self.release_reviewer(&pr.id, member_id).await {
                        Ok(true) => {
                            tracing::warn!(
                                pr_id = %pr.id,
                                user_id = %member_id,
                                "no replacement reviewer, released"
                            );
                            report.released += 1;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(pr_id = %pr.id, user_id = %member_id, "release failed: {}", e);
                            report.failed += 1;
                        }
                    }
                }
                // Merged or reassigned by someone else since the listing.
                Err(AppError::ReviewAlreadyMerged(_)) | Err(AppError::ReviewerNotAssigned { .. }) => {}
                Err(e) => {
                    tracing::error!(pr_id = %pr.id, user_id = %member_id, "reassignment failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Up to [`MAX_REVIEWERS`] ids; a random subset when there are more candidates.
    fn select_reviewers(&self, mut candidates: Vec<Member>) -> Vec<String> {
        if candidates.len() > MAX_REVIEWERS {
            self.picker.shuffle(&mut candidates);
            candidates.truncate(MAX_REVIEWERS);
        }
        candidates.into_iter().map(|m| m.id).collect()
    }

    async fn replace_in(
        &self,
        conn: &mut SqliteConnection,
        pr: &ReviewRequest,
        old_reviewer_id: &str,
    ) -> Result<String, AppError> {
        if !pr.can_be_modified() {
            return Err(AppError::ReviewAlreadyMerged(pr.id.clone()));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::ReviewerNotAssigned {
                pr_id: pr.id.clone(),
                user_id: old_reviewer_id.to_string(),
            });
        }

        let old_reviewer = members::get(conn, old_reviewer_id).await?;
        let mut exclude: HashSet<&str> = pr.assigned_reviewers.iter().map(String::as_str).collect();
        exclude.insert(pr.author_id.as_str());

        let excluded: Vec<&str> = exclude.iter().copied().collect();
        let team_members =
            members::list_active_excluding(conn, old_reviewer.team_id, &excluded).await?;
        let candidates = eligible_candidates(&team_members, &exclude);
        if candidates.is_empty() {
            return Err(AppError::NoCandidateAvailable(pr.id.clone()));
        }

        let index = self.picker.choose(candidates.len());
        let chosen = candidates
            .get(index)
            .ok_or_else(|| AppError::Internal(format!("picker returned index {index}")))?;
        debug_assert!(!pr.is_author(&chosen.id) && !pr.has_reviewer(&chosen.id));

        reviews::replace_reviewer(conn, &pr.id, old_reviewer_id, &chosen.id).await?;
        Ok(chosen.id.clone())
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::picker::SeededPicker;
    use crate::db::test_support::{seed_team, temp_repository};
    use tempfile::TempDir;

    async fn engine() -> (TempDir, Repository, AssignmentEngine) {
        let (dir, repo) = temp_repository().await;
        let engine = AssignmentEngine::new(repo.clone(), Arc::new(SeededPicker::new(1)));
        (dir, repo, engine)
    }

    #[tokio::test]
    async fn test_create_assigns_all_when_two_or_fewer() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true), ("b", true), ("c", true)]).await;

        let pr = engine.create_review_request("p1", "Fix", "a").await.unwrap();
        assert_eq!(pr.status, ReviewStatus::Open);
        assert_eq!(pr.assigned_reviewers, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_create_picks_two_of_many() {
        let (_dir, repo, engine) = engine().await;
        seed_team(
            &repo,
            "t",
            &[("a", true), ("b", true), ("c", true), ("d", true), ("e", false)],
        )
        .await;

        for i in 0..10 {
            let pr = engine
                .create_review_request(&format!("p{i}"), "Fix", "a")
                .await
                .unwrap();
            assert_eq!(pr.assigned_reviewers.len(), 2);
            assert!(!pr.assigned_reviewers.contains(&"a".to_string()));
            assert!(!pr.assigned_reviewers.contains(&"e".to_string()));
            assert_ne!(pr.assigned_reviewers[0], pr.assigned_reviewers[1]);
        }
    }

    #[tokio::test]
    async fn test_create_with_one_or_zero_candidates() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "pair", &[("a", true), ("b", true)]).await;
        seed_team(&repo, "solo", &[("s", true), ("off", false)]).await;

        let pr = engine.create_review_request("p1", "Fix", "a").await.unwrap();
        assert_eq!(pr.assigned_reviewers, vec!["b"]);

        let pr = engine.create_review_request("p2", "Fix", "s").await.unwrap();
        assert!(pr.assigned_reviewers.is_empty());
    }

    #[tokio::test]
    async fn test_create_errors() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true)]).await;

        assert!(matches!(
            engine.create_review_request("p1", "Fix", "ghost").await,
            Err(AppError::AuthorNotFound(_))
        ));
        assert!(matches!(
            engine.create_review_request("", "Fix", "a").await,
            Err(AppError::InvalidInput(_))
        ));

        engine.create_review_request("p1", "Fix", "a").await.unwrap();
        assert!(matches!(
            engine.create_review_request("p1", "Other", "a").await,
            Err(AppError::ReviewRequestExists(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true), ("b", true), ("c", true)]).await;
        engine.create_review_request("p1", "Fix", "a").await.unwrap();

        let first = engine.merge("p1").await.unwrap();
        let second = engine.merge("p1").await.unwrap();
        assert!(first.is_merged());
        assert!(first.merged_at.is_some());
        assert_eq!(first, second);

        assert!(matches!(
            engine.merge("missing").await,
            Err(AppError::ReviewRequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reassign_on_merged_request_fails() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true), ("b", true), ("c", true), ("d", true)]).await;
        let pr = engine.create_review_request("p1", "Fix", "a").await.unwrap();
        engine.merge("p1").await.unwrap();

        let old = pr.assigned_reviewers[0].clone();
        assert!(matches!(
            engine.reassign_reviewer("p1", &old).await,
            Err(AppError::ReviewAlreadyMerged(_))
        ));

        let mut conn = repo.acquire().await.unwrap();
        let after = reviews::get(&mut conn, "p1").await.unwrap();
        assert_eq!(after.assigned_reviewers, pr.assigned_reviewers);
    }

    #[tokio::test]
    async fn test_reassign_unassigned_reviewer_fails() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true), ("b", true)]).await;
        engine.create_review_request("p1", "Fix", "a").await.unwrap();

        assert!(matches!(
            engine.reassign_reviewer("p1", "a").await,
            Err(AppError::ReviewerNotAssigned { .. })
        ));
    }

    #[tokio::test]
    async fn test_reassign_without_candidate_fails() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true), ("b", true), ("c", true)]).await;
        engine.create_review_request("p1", "Fix", "a").await.unwrap();

        // c is the only other member and already assigned
        assert!(matches!(
            engine.reassign_reviewer("p1", "b").await,
            Err(AppError::NoCandidateAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reassign_picks_eligible_member() {
        let (_dir, repo, engine) = engine().await;
        let team_id = seed_team(&repo, "t", &[("a", true), ("b", true), ("c", true)]).await;
        engine.create_review_request("p1", "Fix", "a").await.unwrap();
        let mut tx = repo.begin_write().await.unwrap();
        members::upsert(
            &mut tx,
            &Member {
                id: "d".into(),
                name: "User d".into(),
                team_id,
                active: true,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let outcome = engine.reassign_reviewer("p1", "b").await.unwrap();
        assert_eq!(outcome.replaced_by, "d");
        assert_eq!(outcome.pr.assigned_reviewers, vec!["c", "d"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_merge_and_reassign_are_serialized() {
        for round in 0..5 {
            let (_dir, repo, engine) = engine().await;
            seed_team(
                &repo,
                "t",
                &[("a", true), ("b", true), ("c", true), ("d", true), ("e", true)],
            )
            .await;
            let pr = engine.create_review_request("p1", "Fix", "a").await.unwrap();
            let old = pr.assigned_reviewers[round % 2].clone();

            let merging = tokio::spawn({
                let engine = engine.clone();
                async move { engine.merge("p1").await }
            });
            let reassigning = tokio::spawn({
                let engine = engine.clone();
                let old = old.clone();
                async move { engine.reassign_reviewer("p1", &old).await }
            });
            let merged = merging.await.unwrap().unwrap();
            let reassigned = reassigning.await.unwrap();

            let mut conn = repo.acquire().await.unwrap();
            let stored = reviews::get(&mut conn, "p1").await.unwrap();
            assert!(stored.is_merged());
            assert_eq!(stored.merged_at, merged.merged_at);
            assert_eq!(stored.assigned_reviewers.len(), 2);
            match reassigned {
                Ok(outcome) => {
                    assert!(stored.has_reviewer(&outcome.replaced_by));
                    assert!(!stored.has_reviewer(&old));
                }
                Err(AppError::ReviewAlreadyMerged(_)) => {
                    assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers);
                }
                Err(e) => panic!("unexpected reassignment error: {e}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_reassignments_of_one_reviewer() {
        let (_dir, repo, engine) = engine().await;
        seed_team(
            &repo,
            "t",
            &[("a", true), ("b", true), ("c", true), ("d", true), ("e", true), ("f", true)],
        )
        .await;
        let pr = engine.create_review_request("p1", "Fix", "a").await.unwrap();
        let old = pr.assigned_reviewers[0].clone();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let old = old.clone();
                tokio::spawn(async move { engine.reassign_reviewer("p1", &old).await })
            })
            .collect();

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(AppError::ReviewerNotAssigned { .. }) => lost += 1,
                Err(e) => panic!("unexpected reassignment error: {e}"),
            }
        }
        assert_eq!((won, lost), (1, 1));

        let mut conn = repo.acquire().await.unwrap();
        let stored = reviews::get(&mut conn, "p1").await.unwrap();
        assert_eq!(stored.assigned_reviewers.len(), 2);
        assert!(!stored.has_reviewer(&old));
    }

    #[tokio::test]
    async fn test_rename_only_open() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "t", &[("a", true)]).await;
        engine.create_review_request("p1", "Fix", "a").await.unwrap();

        let renamed = engine.rename("p1", "Better title").await.unwrap();
        assert_eq!(renamed.title, "Better title");

        engine.merge("p1").await.unwrap();
        assert!(matches!(
            engine.rename("p1", "Too late").await,
            Err(AppError::ReviewAlreadyMerged(_))
        ));
        assert!(matches!(engine.rename("p1", " ").await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_drain_reassigns_or_releases() {
        let (_dir, repo, engine) = engine().await;
        seed_team(&repo, "big", &[("a", true), ("b", true), ("c", true), ("d", true)]).await;
        seed_team(&repo, "small", &[("x", true), ("y", true)]).await;

        let big = engine.create_review_request("p1", "Fix", "a").await.unwrap();
        let drained = big.assigned_reviewers[0].clone();
        engine.create_review_request("p2", "Fix", "x").await.unwrap();

        let mut conn = repo.acquire().await.unwrap();
        members::set_active(&mut conn, &drained, false).await.unwrap();
        members::set_active(&mut conn, "y", false).await.unwrap();
        drop(conn);

        let report = engine.drain_reviewer(&drained).await.unwrap();
        assert_eq!(report, DrainReport { reassigned: 1, released: 0, failed: 0 });

        // y has no replacement in its team
        let report = engine.drain_reviewer("y").await.unwrap();
        assert_eq!(report, DrainReport { reassigned: 0, released: 1, failed: 0 });

        let mut conn = repo.acquire().await.unwrap();
        let p1 = reviews::get(&mut conn, "p1").await.unwrap();
        assert!(!p1.has_reviewer(&drained));
        assert_eq!(p1.assigned_reviewers.len(), 2);
        assert!(reviews::get(&mut conn, "p2").await.unwrap().assigned_reviewers.is_empty());
    }
}
