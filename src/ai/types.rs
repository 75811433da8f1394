//! Chat-completions request/response payloads for the vision gateway.

use super::ModelQuery;
use serde::{Deserialize, Serialize};

/// Request body for chat completions.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    /// System instruction first, then a user turn with the prompt and image.
    pub fn from_query(model: &str, query: &ModelQuery) -> Self {
        let system_message = ChatMessage {
            role: "system".to_string(),
            content: Some(ChatMessageContent::Text(query.system_instruction.clone())),
        };

        let user_message = ChatMessage {
            role: "user".to_string(),
            content: Some(ChatMessageContent::Parts(vec![
                MessagePart {
                    part_type: "text".to_string(),
                    text: Some(query.user_prompt.clone()),
                    image_url: None,
                },
                MessagePart {
                    part_type: "image_url".to_string(),
                    text: None,
                    image_url: Some(ImageUrl {
                        url: query.image_url.clone(),
                    }),
                },
            ])),
        };

        Self {
            model: model.to_string(),
            messages: vec![system_message, user_message],
            max_tokens: query.max_output_tokens,
        }
    }
}

/// Message content union.
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

/// One content segment in multipart message input.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatMessageContent>,
}

/// Top-level chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Gateways sometimes send `null` here instead of omitting the field.
    #[serde(default)]
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletionResponse {
    fn first_choice(&self) -> Option<&ChatChoice> {
        self.choices.as_deref().and_then(|choices| choices.first())
    }

    /// Text of the first choice, if it is present and non-empty.
    pub fn first_text(&self) -> Option<&str> {
        let message = self.first_choice()?.message.as_ref()?;
        match &message.content {
            Some(ChatMessageContent::Text(text)) if !text.is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.first_choice()?.finish_reason.as_deref()
    }
}
