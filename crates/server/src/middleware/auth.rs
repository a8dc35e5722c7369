use axum::{
    RequestExt,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use db::models::user::User;
use deployment::Deployment;
use secrecy::ExposeSecret;
use utils::jwt::verify_access_token;

use crate::{DeploymentImpl, error::ApiError};

/// Profile of the caller, inserted by [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

async fn bearer_token(req: &mut Request) -> Result<String, ApiError> {
    let TypedHeader(Authorization(bearer)) = req
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| ApiError::Unauthorized("missing bearer token".to_string()))?;
    Ok(bearer.token().to_string())
}

/// Verifies the Supabase access token and loads (or creates) the caller's
/// profile row.
pub async fn require_user(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&mut req).await?;
    let claims = verify_access_token(&token, deployment.config().jwt_secret.expose_secret())
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = User::ensure(&deployment.db().pool, claims.sub, claims.email.as_deref()).await?;
    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::header::AUTHORIZATION};

    use super::*;

    fn request(authorization: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn extracts_bearer_token() {
        let mut req = request(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&mut req).await.unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn rejects_other_schemes_and_missing_header() {
        for value in [Some("Basic dXNlcjpwYXNz"), None] {
            let err = bearer_token(&mut request(value)).await.unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized(_)));
        }
    }
}
