//! Vision model integration for plant diagnosis
//!
//! Sends a single chat-completions request carrying the image reference to an
//! OpenAI-compatible gateway and hands back the model's raw text reply.

pub mod client;
pub mod mock;
pub mod types;

pub use client::VisionClient;
pub use mock::MockDiagnosisModel;

use crate::error::ModelError;
use crate::prompts;
use async_trait::async_trait;

/// Everything sent to the model for one diagnosis. Built once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelQuery {
    pub system_instruction: String,
    pub image_url: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
}

impl ModelQuery {
    pub fn new(image_url: &str, max_output_tokens: u32) -> Self {
        Self {
            system_instruction: prompts::diagnosis_system(),
            image_url: image_url.to_string(),
            user_prompt: prompts::DIAGNOSIS_USER.trim().to_string(),
            max_output_tokens,
        }
    }
}

#[async_trait]
pub trait DiagnosisModel: Send + Sync {
    /// Submit an already validated image URL and return the unparsed reply text.
    ///
    /// Exactly one outbound call; implementations never retry.
    async fn query(&self, image_url: &str) -> Result<String, ModelError>;
}
