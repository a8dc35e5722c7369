use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware::from_fn_with_state,
};
use deployment::Deployment;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    DeploymentImpl,
    middleware::{require_team, require_user},
};

pub mod customers;
pub mod health;
pub mod invoices;
pub mod jobs;
pub mod reports;
pub mod tags;
pub mod teams;
pub mod users;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

pub fn router(deployment: DeploymentImpl) -> Router {
    let team_scoped = Router::new()
        .merge(teams::router(&deployment))
        .merge(tags::router(&deployment))
        .merge(customers::router(&deployment))
        .merge(jobs::router(&deployment))
        .merge(invoices::router(&deployment))
        .merge(reports::router(&deployment))
        .layer(from_fn_with_state(deployment.clone(), require_team));

    let authenticated = Router::new()
        .merge(users::router(&deployment))
        .merge(teams::user_router(&deployment))
        .merge(team_scoped)
        .layer(from_fn_with_state(deployment.clone(), require_user));

    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(authenticated);

    Router::new()
        .nest("/api", api)
        .layer(cors_layer(&deployment.config().cors_origins))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .with_state(deployment)
}
