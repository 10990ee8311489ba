mod api;
mod shutdown;

use clap::Args;
use nexero_ingest::ClassificationPolicy;
use std::sync::Arc;
use tracing::{debug, info};

pub use api::start_api_server;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "0.0.0.0:8000", env = "NEXERO_ADDRESS")]
    pub address: String,

    /// Database connection URL (postgres:// or sqlite:)
    #[arg(long, env = "NEXERO_DATABASE_URL")]
    pub database_url: String,

    /// Deployment environment reported by /health
    #[arg(long, default_value = "development", env = "NEXERO_ENVIRONMENT")]
    pub environment: String,

    /// Allowed CORS origins, comma separated
    #[arg(
        long,
        default_value = "*",
        env = "NEXERO_CORS_ORIGINS",
        value_delimiter = ','
    )]
    pub cors_origins: Vec<String>,

    /// How the universal endpoint treats payloads: strict or lenient
    #[arg(
        long,
        default_value = "strict",
        env = "NEXERO_CLASSIFICATION_POLICY"
    )]
    pub classification_policy: ClassificationPolicy,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let serve_config = Arc::new(nexero_config::ServerConfig::new(
            &self.address,
            self.database_url.clone(),
            self.environment.clone(),
            self.cors_origins.clone(),
        )?);

        let rt = tokio::runtime::Runtime::new()?;

        debug!("Initializing database connection...");
        let db = rt.block_on(nexero_database::establish_connection(
            &serve_config.database_config(),
        ))?;

        info!(
            "Starting Nexero server on {} ({} environment, {} classification)",
            serve_config.address, serve_config.environment, self.classification_policy
        );

        rt.block_on(start_api_server(
            db,
            serve_config,
            self.classification_policy,
        ))
    }
}
