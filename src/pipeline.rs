//! Diagnosis request pipeline.
//!
//! `Received -> Validating -> Querying -> Parsing -> Persisting -> Responding`,
//! strictly linear. Every failure up to and including parsing ends the
//! invocation with one error; persistence can only log.

use crate::ai::DiagnosisModel;
use crate::error::ModelError;
use crate::models::{Config, Diagnosis, DiagnosisRequest, PersistedDiagnosis, RetryPolicy, Session};
use crate::parse::parse_diagnosis;
use crate::persist::DiagnosisPersister;
use crate::validate::is_trusted_image_url;
use crate::{Error, Result};
use tokio_retry::RetryIf;
use tracing::{info, warn};
use uuid::Uuid;

/// Injectable collaborators. `None` means the capability is not configured.
pub struct PipelineServices {
    pub model: Option<Box<dyn DiagnosisModel>>,
    pub persister: Option<DiagnosisPersister>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Operator-configured storage prefix. `None` rejects every image.
    pub trusted_prefix: Option<String>,
    pub image_bucket: String,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            trusted_prefix: config.trusted_prefix(),
            image_bucket: config.image_bucket.clone(),
            retry: config.retry,
        }
    }
}

pub struct DiagnosisPipeline {
    model: Option<Box<dyn DiagnosisModel>>,
    persister: Option<DiagnosisPersister>,
    settings: PipelineSettings,
}

impl DiagnosisPipeline {
    pub fn with_services(services: PipelineServices, settings: PipelineSettings) -> Self {
        Self {
            model: services.model,
            persister: services.persister,
            settings,
        }
    }

    /// Run one diagnosis end to end.
    #[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
    pub async fn diagnose(&self, request: &DiagnosisRequest, session: &Session) -> Result<Diagnosis> {
        let image_url = self.validate(request)?;

        let model = self.model.as_deref().ok_or_else(|| {
            tracing::error!("Vision model API key not configured");
            Error::ModelNotConfigured
        })?;

        let raw = self.query_model(model, image_url).await?;

        let diagnosis = parse_diagnosis(&raw).map_err(|e| {
            tracing::error!("{}; model output: {}", e, raw);
            e
        })?;

        if let Some(persister) = &self.persister {
            let outcome = persister.persist(&diagnosis, image_url, session).await;
            tracing::debug!("Persistence outcome: {:?}", outcome);
        }

        info!(
            "Diagnosis complete: {} (healthy: {})",
            diagnosis.disease,
            diagnosis.is_healthy()
        );
        Ok(diagnosis)
    }

    /// The caller's stored diagnoses, newest first.
    pub async fn history(&self, session: &Session) -> Result<Vec<PersistedDiagnosis>> {
        let persister = self.persister.as_ref().ok_or(Error::HistoryUnavailable)?;
        persister.recent(session).await
    }

    fn validate<'a>(&self, request: &'a DiagnosisRequest) -> Result<&'a str> {
        let image_url = request
            .image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingImageUrl)?;

        let trusted = self
            .settings
            .trusted_prefix
            .as_deref()
            .is_some_and(|prefix| is_trusted_image_url(image_url, prefix));
        if !trusted {
            warn!("Invalid image URL: {}", image_url);
            return Err(Error::UntrustedImageUrl {
                bucket: self.settings.image_bucket.clone(),
            });
        }

        Ok(image_url)
    }

    async fn query_model(
        &self,
        model: &dyn DiagnosisModel,
        image_url: &str,
    ) -> std::result::Result<String, ModelError> {
        let max_attempts = self.settings.retry.max_attempts;
        let mut attempt = 0u32;

        RetryIf::spawn(
            self.settings.retry.delays(),
            || {
                attempt += 1;
                let current = attempt;
                async move {
                    model.query(image_url).await.map_err(|e| {
                        if current < max_attempts && e.is_retryable() {
                            warn!(
                                "Model attempt {}/{} failed: {}. Will retry...",
                                current, max_attempts, e
                            );
                        }
                        e
                    })
                }
            },
            ModelError::is_retryable,
        )
        .await
    }
}
