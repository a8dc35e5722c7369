use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use db::models::team::TeamRole;
use deployment::Deployment;
use services::services::team_permissions::require_owner;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::{DeploymentImpl, error::ApiError};

/// The caller's current team and their role in it.
#[derive(Debug, Clone, Copy)]
pub struct TeamContext {
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub role: TeamRole,
}

impl TeamContext {
    pub fn require_owner(&self) -> Result<(), ApiError> {
        Ok(require_owner(self.role)?)
    }
}

/// Scopes the request to the caller's current team after a cached
/// membership check. Runs inside [`super::require_user`].
pub async fn require_team(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let AuthUser(user) = req
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("not signed in".to_string()))?;
    let team_id = user
        .team_id
        .ok_or_else(|| ApiError::Forbidden("no team selected".to_string()))?;

    let role = deployment
        .permissions()
        .check(&deployment.db().pool, user.id, team_id)
        .await?;

    req.extensions_mut().insert(TeamContext {
        user_id: user.id,
        team_id,
        role,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn members_cannot_act_as_owners() {
        let ctx = TeamContext {
            user_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            role: TeamRole::Member,
        };
        let err = ctx.require_owner().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let owner = TeamContext {
            role: TeamRole::Owner,
            ..ctx
        };
        assert!(owner.require_owner().is_ok());
    }
}
