//! Service wiring: configuration to collaborators to router.

use crate::ai::{DiagnosisModel, VisionClient};
use crate::models::Config;
use crate::persist::DiagnosisPersister;
use crate::pipeline::{DiagnosisPipeline, PipelineServices, PipelineSettings};
use crate::server;
use crate::store::SupabaseClient;
use crate::Result;
use axum::Router;
use std::sync::Arc;
use tracing::{info, warn};

/// A configured diagnosis service ready to serve HTTP.
pub struct App {
    pipeline: Arc<DiagnosisPipeline>,
    bind_addr: String,
}

impl App {
    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across collaborators.
        let http_client = reqwest::Client::new();

        let model: Option<Box<dyn DiagnosisModel>> = match &config.ai_api_key {
            Some(api_key) => {
                info!("Vision model: {} via {}", config.ai_model, config.ai_base_url);
                Some(Box::new(
                    VisionClient::new_with_client(
                        api_key.clone(),
                        config.ai_base_url.clone(),
                        config.ai_model.clone(),
                        http_client.clone(),
                    )
                    .with_max_output_tokens(config.max_output_tokens)
                    .with_timeout(config.ai_timeout),
                ))
            }
            None => {
                warn!("AI_API_KEY not set; diagnosis requests will fail");
                None
            }
        };

        let persister = match (&config.supabase_url, &config.supabase_service_role_key) {
            (Some(url), Some(key)) => {
                let supabase = Arc::new(SupabaseClient::new_with_client(
                    url.clone(),
                    key.clone(),
                    http_client,
                ));
                Some(DiagnosisPersister::new(supabase.clone(), supabase))
            }
            _ => {
                warn!("SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY not set; history disabled");
                None
            }
        };

        match config.trusted_prefix() {
            Some(prefix) => info!("Accepting images under {}", prefix),
            None => warn!("SUPABASE_URL not set; every image URL will be rejected"),
        }

        let pipeline = DiagnosisPipeline::with_services(
            PipelineServices { model, persister },
            PipelineSettings::from_config(config),
        );

        Self::with_pipeline(pipeline, config.bind_addr.clone())
    }

    /// Build an app around an already assembled pipeline.
    pub fn with_pipeline(pipeline: DiagnosisPipeline, bind_addr: String) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            bind_addr,
        }
    }

    pub fn router(&self) -> Router {
        server::router(self.pipeline.clone())
    }

    /// Serve until the process is stopped. `bind_addr` overrides the configured address.
    pub async fn serve(&self, bind_addr: Option<String>) -> Result<()> {
        let addr = bind_addr.unwrap_or_else(|| self.bind_addr.clone());
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Plant diagnosis service listening on {}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
