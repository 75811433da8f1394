//! Data models and structures
//!
//! Defines the diagnosis records exchanged with callers and the durable
//! store, the per-request session context, and service configuration.

use crate::prompts::HEALTHY_LABEL;
use crate::{Error, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use uuid::Uuid;

/// Body of a diagnosis request. One per invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    #[serde(default)]
    pub image_url: Option<String>,
}

impl DiagnosisRequest {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
        }
    }
}

/// Validated diagnosis as produced by the model.
///
/// `confidence` keeps the number exactly as the model wrote it (integer or
/// float), so the response echoes the model's value without a lossy cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub disease: String,
    pub confidence: Number,
    pub description: String,
    pub advice: String,
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        self.disease == HEALTHY_LABEL
    }

    pub fn confidence_value(&self) -> Option<f64> {
        self.confidence.as_f64()
    }
}

/// Insert payload for the `diagnoses` table. `id` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisRow {
    pub user_id: String,
    pub image_url: String,
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
}

/// A diagnosis as stored, keyed to its owner and source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDiagnosis {
    pub id: Uuid,
    pub user_id: String,
    pub image_url: String,
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    pub created_at: DateTime<Utc>,
}

/// Per-request caller context. Built from request headers and passed
/// explicitly; nothing about the caller is kept between requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub bearer: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    pub fn from_authorization(value: Option<&str>) -> Self {
        let bearer = value
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self { bearer }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_authorization(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
    }
}

/// Bounded retry around the model call. `max_attempts == 1` means no retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(2000),
        }
    }

    /// Delays between attempts; empty when retries are disabled.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.backoff).take(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub image_bucket: String,
    pub ai_api_key: Option<String>,
    pub ai_base_url: String,
    pub ai_model: String,
    pub max_output_tokens: u32,
    pub ai_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_output_tokens = parse_var::<u32, _>(&non_empty, "AI_MAX_OUTPUT_TOKENS")?.unwrap_or(500);
        let ai_timeout = parse_var::<u64, _>(&non_empty, "AI_TIMEOUT_SECS")?.map(Duration::from_secs);
        let max_attempts = parse_var::<u32, _>(&non_empty, "DIAGNOSIS_MAX_ATTEMPTS")?.unwrap_or(1);
        if max_attempts == 0 {
            return Err(Error::Config(
                "DIAGNOSIS_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let backoff_ms = parse_var::<u64, _>(&non_empty, "DIAGNOSIS_RETRY_BACKOFF_MS")?.unwrap_or(2000);

        Ok(Self {
            supabase_url: non_empty("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            supabase_service_role_key: non_empty("SUPABASE_SERVICE_ROLE_KEY"),
            image_bucket: non_empty("IMAGE_BUCKET").unwrap_or_else(|| "plant-images".to_string()),
            ai_api_key: non_empty("AI_API_KEY"),
            ai_base_url: non_empty("AI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://ai.gateway.lovable.dev".to_string()),
            ai_model: non_empty("AI_MODEL").unwrap_or_else(|| "google/gemini-2.5-flash".to_string()),
            max_output_tokens,
            ai_timeout,
            retry: RetryPolicy {
                max_attempts,
                backoff: Duration::from_millis(backoff_ms),
            },
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }

    /// Public object path every accepted image URL must start with.
    pub fn trusted_prefix(&self) -> Option<String> {
        self.supabase_url
            .as_ref()
            .map(|url| format!("{}/storage/v1/object/public/{}/", url, self.image_bucket))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", key, raw, e)))
        })
        .transpose()
}
