use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, patch, post},
};
use db::models::{
    team::{CreateTeam, Team, TeamMember, TeamMembership, UpdateTeam},
    team_invite::{CreateTeamInvite, TeamInvite},
};
use deployment::Deployment;
use services::services::teams::{TeamService, UpdateMemberRole};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{AuthUser, TeamContext},
};

/// POST /api/teams
pub async fn create_team(
    State(deployment): State<DeploymentImpl>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = TeamService::create(deployment.db(), user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// GET /api/teams
pub async fn list_teams(
    State(deployment): State<DeploymentImpl>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<TeamMembership>>>, ApiError> {
    let teams = TeamService::memberships(deployment.db(), user.id).await?;
    Ok(ResponseJson(ApiResponse::success(teams)))
}

/// POST /api/teams/{team_id}/switch
pub async fn switch_team(
    State(deployment): State<DeploymentImpl>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team =
        TeamService::switch(deployment.db(), deployment.permissions(), user.id, team_id).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// POST /api/invites/{code}/accept
pub async fn accept_invite(
    State(deployment): State<DeploymentImpl>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team =
        TeamService::accept_invite(deployment.db(), deployment.permissions(), &user, &code).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// GET /api/team/current
pub async fn get_current_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = TeamService::get(deployment.db(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// PATCH /api/team/current
pub async fn update_current_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<UpdateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    ctx.require_owner()?;
    let team = TeamService::update(deployment.db(), ctx.team_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// DELETE /api/team/current
pub async fn delete_current_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ctx.require_owner()?;
    TeamService::delete(deployment.db(), deployment.permissions(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/team/members
pub async fn list_members(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<Vec<TeamMember>>>, ApiError> {
    let members = TeamService::members(deployment.db(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

/// PATCH /api/team/members/{user_id}
pub async fn update_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(user_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateMemberRole>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ctx.require_owner()?;
    TeamService::set_member_role(
        deployment.db(),
        deployment.permissions(),
        ctx.team_id,
        user_id,
        payload.role,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// DELETE /api/team/members/{user_id}
pub async fn remove_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ctx.require_owner()?;
    TeamService::remove_member(deployment.db(), deployment.permissions(), ctx.team_id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/team/leave
pub async fn leave_team(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    TeamService::remove_member(
        deployment.db(),
        deployment.permissions(),
        ctx.team_id,
        ctx.user_id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/team/invites
pub async fn list_invites(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<Vec<TeamInvite>>>, ApiError> {
    ctx.require_owner()?;
    let invites = TeamService::invites(deployment.db(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(invites)))
}

/// POST /api/team/invites
pub async fn create_invite(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateTeamInvite>,
) -> Result<ResponseJson<ApiResponse<TeamInvite>>, ApiError> {
    ctx.require_owner()?;
    let invite = TeamService::invite(deployment.db(), ctx.team_id, ctx.user_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(invite)))
}

/// DELETE /api/team/invites/{invite_id}
pub async fn delete_invite(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(invite_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ctx.require_owner()?;
    TeamService::delete_invite(deployment.db(), ctx.team_id, invite_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Routes that only need a signed-in user.
pub fn user_router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/{team_id}/switch", post(switch_team))
        .route("/invites/{code}/accept", post(accept_invite))
}

/// Routes scoped to the caller's current team.
pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/team",
        Router::new()
            .route(
                "/current",
                get(get_current_team)
                    .patch(update_current_team)
                    .delete(delete_current_team),
            )
            .route("/members", get(list_members))
            .route(
                "/members/{user_id}",
                patch(update_member).delete(remove_member),
            )
            .route("/leave", post(leave_team))
            .route("/invites", get(list_invites).post(create_invite))
            .route("/invites/{invite_id}", delete(delete_invite)),
    )
}
