use axum::{
    Extension, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{UpdateUser, User};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// GET /api/user/me
pub async fn get_me(
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// PATCH /api/user/me
pub async fn update_me(
    State(deployment): State<DeploymentImpl>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    axum::Json(payload): axum::Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::update(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/user/me", get(get_me).patch(update_me))
}
