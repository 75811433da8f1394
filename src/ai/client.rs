use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use super::{DiagnosisModel, ModelQuery};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Chat-completions client for a vision-capable model behind an
/// OpenAI-compatible gateway.
pub struct VisionClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    timeout: Option<Duration>,
}

impl VisionClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self::new_with_client(api_key, base_url, model, Client::new())
    }

    pub fn new_with_client(api_key: String, base_url: String, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_output_tokens: 500,
            timeout: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Per-request timeout. Without one the transport default applies.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send request to vision model: {}", e);
            ModelError::UpstreamFailure {
                status: None,
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Vision model API error (status {}): {}", status, error_text);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => ModelError::QuotaExhausted,
                _ => ModelError::UpstreamFailure {
                    status: Some(status.as_u16()),
                    detail: error_text,
                },
            });
        }

        let body = response.text().await.map_err(|e| ModelError::UpstreamFailure {
            status: Some(status.as_u16()),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse vision model response: {}\nBody: {}", e, body);
            ModelError::UpstreamFailure {
                status: Some(status.as_u16()),
                detail: format!("Failed to parse response envelope: {}", e),
            }
        })
    }
}

#[async_trait]
impl DiagnosisModel for VisionClient {
    async fn query(&self, image_url: &str) -> Result<String, ModelError> {
        tracing::info!("Analyzing plant image with {}", self.model);

        let query = ModelQuery::new(image_url, self.max_output_tokens);
        let request = ChatCompletionRequest::from_query(&self.model, &query);
        let response = self.chat_completion(&request).await?;

        let content = response.first_text().ok_or_else(|| {
            tracing::error!(
                "Vision model returned no message content (finish_reason: {})",
                response.finish_reason().unwrap_or("none")
            );
            ModelError::EmptyResponse
        })?;

        tracing::debug!("Vision model response: {}", content);
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IMAGE_URL: &str = "https://proj.supabase.co/storage/v1/object/public/plant-images/a.jpg";
    const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

    fn make_client(server: &MockServer) -> VisionClient {
        VisionClient::new("test-key".to_string(), server.uri(), DEFAULT_MODEL.to_string())
    }

    fn completion(content: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        }))
    }

    async fn mount_status(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_query_returns_raw_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(completion(serde_json::json!(
                "```json\n{\"disease\":\"Pas\"}\n```"
            )))
            .expect(1)
            .mount(&server)
            .await;

        let raw = make_client(&server).query(IMAGE_URL).await.unwrap();
        assert_eq!(raw, "```json\n{\"disease\":\"Pas\"}\n```");
    }

    #[tokio::test]
    async fn test_query_sends_model_image_and_token_limit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "custom-model",
                "max_tokens": 256,
                "messages": [
                    { "role": "system" },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text" },
                            { "type": "image_url", "image_url": { "url": IMAGE_URL } }
                        ]
                    }
                ]
            })))
            .respond_with(completion(serde_json::json!("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = VisionClient::new("k".to_string(), server.uri(), "custom-model".to_string())
            .with_max_output_tokens(256);
        client.query(IMAGE_URL).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        mount_status(&server, 429).await;

        let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
        assert_eq!(err, ModelError::RateLimited);
    }

    #[tokio::test]
    async fn test_payment_required_maps_to_quota_exhausted() {
        let server = MockServer::start().await;
        mount_status(&server, 402).await;

        let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
        assert_eq!(err, ModelError::QuotaExhausted);
    }

    #[tokio::test]
    async fn test_other_statuses_map_to_upstream_failure() {
        for status in [400u16, 401, 500, 503] {
            let server = MockServer::start().await;
            mount_status(&server, status).await;

            let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
            assert_eq!(
                err,
                ModelError::UpstreamFailure {
                    status: Some(status),
                    detail: "upstream says no".to_string(),
                }
            );
        }
    }

    #[tokio::test]
    async fn test_missing_or_empty_content_maps_to_empty_response() {
        for content in [serde_json::json!(null), serde_json::json!("")] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(completion(content))
                .mount(&server)
                .await;

            let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
            assert_eq!(err, ModelError::EmptyResponse);
        }

        for body in [
            serde_json::json!({ "choices": [] }),
            serde_json::json!({ "choices": null }),
            serde_json::json!({ "choices": [{}] }),
            serde_json::json!({ "choices": [{ "message": { "content": null } }] }),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
            let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
            assert_eq!(err, ModelError::EmptyResponse);
        }
    }

    #[tokio::test]
    async fn test_non_json_envelope_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = make_client(&server).query(IMAGE_URL).await.unwrap_err();
        assert!(matches!(err, ModelError::UpstreamFailure { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_upstream_failure() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let client = VisionClient::new("k".to_string(), uri, DEFAULT_MODEL.to_string());
        let err = client.query(IMAGE_URL).await.unwrap_err();
        assert!(matches!(err, ModelError::UpstreamFailure { status: None, .. }));
    }
}
