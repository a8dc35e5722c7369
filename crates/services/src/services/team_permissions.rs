//! Cache-aside lookup of team membership used on every team-scoped request.

use std::{future::Future, time::Duration};

use db::models::team::{TeamMember, TeamRole};
use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("user is not a member of this team")]
    NotMember,
    #[error("only team owners can do this")]
    OwnerRequired,
}

/// Remembers the role of each (user, team) pair that passed a check.
/// Non-members are never cached so a freshly accepted invite works at once.
#[derive(Clone)]
pub struct TeamPermissionCache {
    cache: Cache<(Uuid, Uuid), TeamRole>,
}

impl TeamPermissionCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
        }
    }

    pub async fn check(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        team_id: Uuid,
    ) -> Result<TeamRole, PermissionError> {
        self.check_with(user_id, team_id, || TeamMember::find_role(pool, user_id, team_id))
            .await
    }

    pub async fn check_with<F, Fut>(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        load: F,
    ) -> Result<TeamRole, PermissionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<TeamRole>, sqlx::Error>>,
    {
        let key = (user_id, team_id);
        if let Some(role) = self.cache.get(&key).await {
            return Ok(role);
        }

        match load().await {
            Ok(Some(role)) => {
                debug!(user_id = %user_id, team_id = %team_id, role = %role, "Team membership cached");
                self.cache.insert(key, role).await;
                Ok(role)
            }
            Ok(None) => Err(PermissionError::NotMember),
            Err(e) => {
                warn!(user_id = %user_id, team_id = %team_id, error = %e, "Team membership lookup failed");
                Err(PermissionError::Database(e))
            }
        }
    }

    pub async fn invalidate(&self, user_id: Uuid, team_id: Uuid) {
        self.cache.invalidate(&(user_id, team_id)).await;
    }

    /// Drops every cached membership of a team.
    pub async fn invalidate_team(&self, team_id: Uuid) {
        let keys: Vec<(Uuid, Uuid)> = self
            .cache
            .iter()
            .filter(|(key, _)| key.1 == team_id)
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            self.cache.invalidate(&key).await;
        }
    }
}

/// Fails unless `role` may manage the team.
pub fn require_owner(role: TeamRole) -> Result<(), PermissionError> {
    match role {
        TeamRole::Owner => Ok(()),
        TeamRole::Member => Err(PermissionError::OwnerRequired),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn cache() -> TeamPermissionCache {
        TeamPermissionCache::new(Duration::from_secs(60), 100)
    }

    #[tokio::test]
    async fn loads_once_then_serves_from_cache() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let (user, team) = (Uuid::new_v4(), Uuid::new_v4());

        for _ in 0..3 {
            let calls = calls.clone();
            let role = cache
                .check_with(user, team, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(TeamRole::Owner))
                })
                .await
                .unwrap();
            assert_eq!(role, TeamRole::Owner);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_members_are_rejected_and_not_cached() {
        let cache = cache();
        let (user, team) = (Uuid::new_v4(), Uuid::new_v4());

        let denied = cache.check_with(user, team, || async { Ok(None) }).await;
        assert!(matches!(denied, Err(PermissionError::NotMember)));

        let allowed = cache
            .check_with(user, team, || async { Ok(Some(TeamRole::Member)) })
            .await
            .unwrap();
        assert_eq!(allowed, TeamRole::Member);
    }

    #[tokio::test]
    async fn lookup_errors_never_grant_access() {
        let cache = cache();
        let result = cache
            .check_with(Uuid::new_v4(), Uuid::new_v4(), || async {
                Err(sqlx::Error::PoolTimedOut)
            })
            .await;
        assert!(matches!(result, Err(PermissionError::Database(_))));
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let cache = cache();
        let (user, other, team) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        cache
            .check_with(user, team, || async { Ok(Some(TeamRole::Owner)) })
            .await
            .unwrap();
        cache
            .check_with(other, team, || async { Ok(Some(TeamRole::Member)) })
            .await
            .unwrap();

        cache.invalidate(user, team).await;
        let role = cache
            .check_with(user, team, || async { Ok(Some(TeamRole::Member)) })
            .await
            .unwrap();
        assert_eq!(role, TeamRole::Member);

        cache.invalidate_team(team).await;
        let result = cache.check_with(other, team, || async { Ok(None) }).await;
        assert!(matches!(result, Err(PermissionError::NotMember)));
    }

    #[test]
    fn only_owners_pass_owner_check() {
        assert!(require_owner(TeamRole::Owner).is_ok());
        assert!(matches!(
            require_owner(TeamRole::Member),
            Err(PermissionError::OwnerRequired)
        ));
    }
}
