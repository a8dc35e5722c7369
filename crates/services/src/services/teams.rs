//! Team lifecycle, membership and invites.

use db::{
    DBService,
    models::{
        team::{CreateTeam, Team, TeamMember, TeamMembership, TeamRole, UpdateTeam},
        team_invite::{CreateTeamInvite, TeamInvite},
        user::User,
    },
};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::team_permissions::{PermissionError, TeamPermissionCache};

const INVITE_CODE_LEN: usize = 24;
const MAX_INVOICE_PREFIX_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error("team not found")]
    NotFound,
    #[error("member not found")]
    MemberNotFound,
    #[error("invite not found")]
    InviteNotFound,
    #[error("this invite was sent to a different email address")]
    InviteEmailMismatch,
    #[error("a team needs at least one owner")]
    LastOwner,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateMemberRole {
    pub role: TeamRole,
}

/// A membership edit whose cached permission checks must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Member { user_id: Uuid, team_id: Uuid },
    Team(Uuid),
}

impl MembershipChange {
    pub async fn forget(self, permissions: &TeamPermissionCache) {
        match self {
            Self::Member { user_id, team_id } => permissions.invalidate(user_id, team_id).await,
            Self::Team(team_id) => permissions.invalidate_team(team_id).await,
        }
    }
}

/// True when moving `user_id` from `current` to `new_role` (`None` for
/// removal) would leave the team without an owner. `owners` is the locked
/// owner set.
pub fn leaves_no_owner(
    user_id: Uuid,
    current: TeamRole,
    new_role: Option<TeamRole>,
    owners: &[Uuid],
) -> bool {
    current == TeamRole::Owner
        && new_role != Some(TeamRole::Owner)
        && owners.iter().all(|owner| *owner == user_id)
}

pub fn generate_invite_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

pub fn emails_match(invited: &str, actual: &str) -> bool {
    invited.trim().eq_ignore_ascii_case(actual.trim())
}

fn validate_name(name: &str) -> Result<(), TeamError> {
    if name.trim().is_empty() {
        return Err(TeamError::Validation("team name cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), TeamError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(TeamError::Validation(format!("{email:?} is not an email address")));
    }
    Ok(())
}

pub fn validate_update(data: &UpdateTeam) -> Result<(), TeamError> {
    if let Some(name) = &data.name {
        validate_name(name)?;
    }
    for (field, value) in [
        ("vat_rate", data.vat_rate),
        ("tax_rate", data.tax_rate),
        ("levy_rate", data.levy_rate),
    ] {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(TeamError::Validation(format!("{field} must be zero or more")));
            }
        }
    }
    if data.payment_terms_days.is_some_and(|days| days < 0) {
        return Err(TeamError::Validation(
            "payment_terms_days must be zero or more".to_string(),
        ));
    }
    if let Some(prefix) = &data.invoice_prefix {
        if prefix.len() > MAX_INVOICE_PREFIX_LEN || prefix.chars().any(|c| c.is_ascii_digit()) {
            return Err(TeamError::Validation(format!(
                "invoice_prefix must be at most {MAX_INVOICE_PREFIX_LEN} characters without digits"
            )));
        }
    }
    Ok(())
}

pub struct TeamService;

impl TeamService {
    /// Creates a team owned by `user_id` and makes it their current team.
    pub async fn create(db: &DBService, user_id: Uuid, data: &CreateTeam) -> Result<Team, TeamError> {
        validate_name(&data.name)?;

        let mut tx = db.begin().await?;
        let team = Team::create(&mut *tx, data, Uuid::new_v4()).await?;
        TeamMember::add(&mut *tx, user_id, team.id, TeamRole::Owner).await?;
        User::set_current_team(&mut *tx, user_id, Some(team.id)).await?;
        tx.commit().await?;

        info!(team_id = %team.id, user_id = %user_id, "Team created");
        Ok(team)
    }

    pub async fn memberships(db: &DBService, user_id: Uuid) -> Result<Vec<TeamMembership>, TeamError> {
        Ok(Team::find_memberships_for_user(&db.pool, user_id).await?)
    }

    pub async fn get(db: &DBService, team_id: Uuid) -> Result<Team, TeamError> {
        Team::find_by_id(&db.pool, team_id)
            .await?
            .ok_or(TeamError::NotFound)
    }

    pub async fn update(db: &DBService, team_id: Uuid, data: &UpdateTeam) -> Result<Team, TeamError> {
        validate_update(data)?;
        match Team::update(&db.pool, team_id, data).await {
            Ok(team) => Ok(team),
            Err(sqlx::Error::RowNotFound) => Err(TeamError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn switch(
        db: &DBService,
        permissions: &TeamPermissionCache,
        user_id: Uuid,
        team_id: Uuid,
    ) -> Result<Team, TeamError> {
        permissions.check(&db.pool, user_id, team_id).await?;
        let team = Self::get(db, team_id).await?;
        User::set_current_team(&db.pool, user_id, Some(team_id)).await?;
        info!(team_id = %team_id, user_id = %user_id, "Switched current team");
        Ok(team)
    }

    /// Deletes the team and everything scoped to it. Members whose current
    /// team it was move to another of their teams.
    pub async fn delete(
        db: &DBService,
        permissions: &TeamPermissionCache,
        team_id: Uuid,
    ) -> Result<(), TeamError> {
        let mut tx = db.begin().await?;
        User::reassign_current_team(&mut *tx, team_id, None).await?;
        let deleted = Team::delete(&mut *tx, team_id).await?;
        if deleted == 0 {
            return Err(TeamError::NotFound);
        }
        tx.commit().await?;

        MembershipChange::Team(team_id).forget(permissions).await;
        info!(team_id = %team_id, "Team deleted");
        Ok(())
    }

    pub async fn members(db: &DBService, team_id: Uuid) -> Result<Vec<TeamMember>, TeamError> {
        Ok(TeamMember::find_by_team(&db.pool, team_id).await?)
    }

    pub async fn set_member_role(
        db: &DBService,
        permissions: &TeamPermissionCache,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<(), TeamError> {
        let mut tx = db.begin().await?;
        let owners = TeamMember::lock_owners(&mut *tx, team_id).await?;
        let current = TeamMember::find_role(&mut *tx, user_id, team_id)
            .await?
            .ok_or(TeamError::MemberNotFound)?;
        if leaves_no_owner(user_id, current, Some(role), &owners) {
            return Err(TeamError::LastOwner);
        }
        TeamMember::set_role(&mut *tx, user_id, team_id, role).await?;
        tx.commit().await?;

        MembershipChange::Member { user_id, team_id }
            .forget(permissions)
            .await;
        info!(team_id = %team_id, user_id = %user_id, role = %role, "Member role changed");
        Ok(())
    }

    /// Removes a member. Used both by owners removing someone and by a
    /// member leaving; the last owner can do neither.
    pub async fn remove_member(
        db: &DBService,
        permissions: &TeamPermissionCache,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), TeamError> {
        let mut tx = db.begin().await?;
        let owners = TeamMember::lock_owners(&mut *tx, team_id).await?;
        let role = TeamMember::find_role(&mut *tx, user_id, team_id)
            .await?
            .ok_or(TeamError::MemberNotFound)?;
        if leaves_no_owner(user_id, role, None, &owners) {
            return Err(TeamError::LastOwner);
        }
        TeamMember::remove(&mut *tx, user_id, team_id).await?;
        User::reassign_current_team(&mut *tx, team_id, Some(user_id)).await?;
        tx.commit().await?;

        MembershipChange::Member { user_id, team_id }
            .forget(permissions)
            .await;
        info!(team_id = %team_id, user_id = %user_id, "Member removed");
        Ok(())
    }

    pub async fn invites(db: &DBService, team_id: Uuid) -> Result<Vec<TeamInvite>, TeamError> {
        Ok(TeamInvite::find_by_team(&db.pool, team_id).await?)
    }

    pub async fn invite(
        db: &DBService,
        team_id: Uuid,
        invited_by: Uuid,
        data: &CreateTeamInvite,
    ) -> Result<TeamInvite, TeamError> {
        validate_email(&data.email)?;
        let invite = TeamInvite::create(
            &db.pool,
            team_id,
            invited_by,
            &data.email,
            data.role.unwrap_or_default(),
            &generate_invite_code(),
        )
        .await?;
        info!(team_id = %team_id, invite_id = %invite.id, "Team invite created");
        Ok(invite)
    }

    pub async fn delete_invite(db: &DBService, team_id: Uuid, invite_id: Uuid) -> Result<(), TeamError> {
        if TeamInvite::delete(&db.pool, invite_id, team_id).await? == 0 {
            return Err(TeamError::InviteNotFound);
        }
        Ok(())
    }

    /// Joins the invited team with the invited role and switches to it.
    pub async fn accept_invite(
        db: &DBService,
        permissions: &TeamPermissionCache,
        user: &User,
        code: &str,
    ) -> Result<Team, TeamError> {
        let invite = TeamInvite::find_by_code(&db.pool, code.trim())
            .await?
            .ok_or(TeamError::InviteNotFound)?;
        let email_ok = user
            .email
            .as_deref()
            .is_some_and(|email| emails_match(&invite.email, email));
        if !email_ok {
            return Err(TeamError::InviteEmailMismatch);
        }

        let mut tx = db.begin().await?;
        TeamMember::add(&mut *tx, user.id, invite.team_id, invite.role).await?;
        TeamInvite::delete(&mut *tx, invite.id, invite.team_id).await?;
        User::set_current_team(&mut *tx, user.id, Some(invite.team_id)).await?;
        tx.commit().await?;

        MembershipChange::Member {
            user_id: user.id,
            team_id: invite.team_id,
        }
        .forget(permissions)
        .await;
        info!(team_id = %invite.team_id, user_id = %user.id, "Team invite accepted");
        Self::get(db, invite.team_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_owner_cannot_step_down_or_leave() {
        let (owner, other_owner, member) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert!(leaves_no_owner(owner, TeamRole::Owner, Some(TeamRole::Member), &[owner]));
        assert!(leaves_no_owner(owner, TeamRole::Owner, None, &[owner]));
        assert!(!leaves_no_owner(owner, TeamRole::Owner, Some(TeamRole::Member), &[owner, other_owner]));
        assert!(!leaves_no_owner(owner, TeamRole::Owner, None, &[owner, other_owner]));
        assert!(!leaves_no_owner(owner, TeamRole::Owner, Some(TeamRole::Owner), &[owner]));
        assert!(!leaves_no_owner(member, TeamRole::Member, None, &[owner]));
    }

    #[test]
    fn concurrent_demotion_sees_the_locked_owner_set() {
        // Once one owner's demotion commits, the other sees only itself.
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(!leaves_no_owner(a, TeamRole::Owner, Some(TeamRole::Member), &[a, b]));
        assert!(leaves_no_owner(b, TeamRole::Owner, Some(TeamRole::Member), &[b]));
    }

    async fn cache_role(cache: &TeamPermissionCache, user_id: Uuid, team_id: Uuid) {
        cache
            .check_with(user_id, team_id, || async { Ok(Some(TeamRole::Owner)) })
            .await
            .unwrap();
    }

    async fn is_cached(cache: &TeamPermissionCache, user_id: Uuid, team_id: Uuid) -> bool {
        cache
            .check_with(user_id, team_id, || async { Ok(None) })
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn member_change_forgets_only_that_membership() {
        let cache = TeamPermissionCache::new(std::time::Duration::from_secs(60), 100);
        let (user, other, team) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cache_role(&cache, user, team).await;
        cache_role(&cache, other, team).await;

        MembershipChange::Member { user_id: user, team_id: team }
            .forget(&cache)
            .await;

        assert!(!is_cached(&cache, user, team).await);
        assert!(is_cached(&cache, other, team).await);
    }

    #[tokio::test]
    async fn team_change_forgets_every_member() {
        let cache = TeamPermissionCache::new(std::time::Duration::from_secs(60), 100);
        let (user, other, team, elsewhere) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cache_role(&cache, user, team).await;
        cache_role(&cache, other, team).await;
        cache_role(&cache, user, elsewhere).await;

        MembershipChange::Team(team).forget(&cache).await;

        assert!(!is_cached(&cache, user, team).await);
        assert!(!is_cached(&cache, other, team).await);
        assert!(is_cached(&cache, user, elsewhere).await);
    }

    #[test]
    fn invite_codes_are_random_alphanumerics() {
        let a = generate_invite_code();
        let b = generate_invite_code();
        assert_eq!(a.len(), INVITE_CODE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn invite_email_match_ignores_case_and_padding() {
        assert!(emails_match("ops@smithhaulage.com.au", " Ops@SmithHaulage.com.au"));
        assert!(!emails_match("ops@smithhaulage.com.au", "accounts@smithhaulage.com.au"));
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("driver@example.com").is_ok());
        assert!(validate_email("driver").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("driver@localhost").is_err());
    }

    #[test]
    fn team_settings_are_validated() {
        assert!(validate_update(&UpdateTeam {
            vat_rate: Some(10.0),
            invoice_prefix: Some("SH-".to_string()),
            payment_terms_days: Some(30),
            ..Default::default()
        })
        .is_ok());
        assert!(validate_update(&UpdateTeam {
            levy_rate: Some(-1.0),
            ..Default::default()
        })
        .is_err());
        assert!(validate_update(&UpdateTeam {
            invoice_prefix: Some("INV2025-".to_string()),
            ..Default::default()
        })
        .is_err());
        assert!(validate_update(&UpdateTeam {
            name: Some("  ".to_string()),
            ..Default::default()
        })
        .is_err());
    }
}
