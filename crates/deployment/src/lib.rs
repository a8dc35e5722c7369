use async_trait::async_trait;
use db::DBService;
use services::services::{
    claude_api::{ClaudeApiClient, ClaudeApiError},
    config::{Config, ConfigError},
    team_permissions::TeamPermissionCache,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    ClaudeApi(#[from] ClaudeApiError),
}

/// Everything the HTTP layer needs from a running instance.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn permissions(&self) -> &TeamPermissionCache;

    /// `None` when no Anthropic key is configured; import mapping then
    /// falls back to header heuristics.
    fn claude(&self) -> Option<&ClaudeApiClient>;

    /// Starts background services. Called once after `new`.
    async fn spawn_background_services(&self);
}
