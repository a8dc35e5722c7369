pub mod error;
pub mod middleware;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;

/// Default `RUST_LOG` when none is set.
pub const DEFAULT_LOG_FILTER: &str = "info,server=debug,services=debug,db=info";
