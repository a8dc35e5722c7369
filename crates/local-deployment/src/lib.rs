use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use secrecy::ExposeSecret;
use services::services::{
    claude_api::ClaudeApiClient, config::Config, invoice_overdue::InvoiceOverdueService,
    team_permissions::TeamPermissionCache,
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Config,
    db: DBService,
    permissions: TeamPermissionCache,
    claude: Option<ClaudeApiClient>,
}

impl LocalDeployment {
    pub async fn from_config(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(
            config.database_url.expose_secret(),
            config.database_max_connections,
        )
        .await?;

        let permissions = TeamPermissionCache::new(
            config.permission_cache_ttl,
            config.permission_cache_capacity,
        );

        let claude = match &config.anthropic_api_key {
            Some(key) => Some(ClaudeApiClient::new(key.clone(), None)?),
            None => {
                warn!("ANTHROPIC_API_KEY not set; import mapping will use header heuristics only");
                None
            }
        };

        Ok(Self {
            config,
            db,
            permissions,
            claude,
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        Self::from_config(Config::from_env()?).await
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn permissions(&self) -> &TeamPermissionCache {
        &self.permissions
    }

    fn claude(&self) -> Option<&ClaudeApiClient> {
        self.claude.as_ref()
    }

    async fn spawn_background_services(&self) {
        InvoiceOverdueService::spawn(self.db.clone(), self.config.overdue_sweep_interval).await;
        info!("Background services started");
    }
}
