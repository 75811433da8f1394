use super::{DiagnosisStore, IdentityProvider};
use crate::models::{DiagnosisRow, PersistedDiagnosis};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const DIAGNOSES_TABLE: &str = "diagnoses";

/// Supabase auth + PostgREST client authenticated with the service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

impl SupabaseClient {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self::new_with_client(base_url, service_key, Client::new())
    }

    pub fn new_with_client(base_url: String, service_key: String, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, DIAGNOSES_TABLE)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_user(&self, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::NOT_FOUND
        {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await?;
            tracing::error!("Identity lookup failed (status {}): {}", status, error_text);
            return Err(Error::Persistence(format!(
                "Identity lookup failed (status {}): {}",
                status, error_text
            )));
        }

        let user: AuthUser = response.json().await?;
        Ok(Some(user.id))
    }
}

#[async_trait]
impl DiagnosisStore for SupabaseClient {
    async fn insert(&self, row: &DiagnosisRow) -> Result<()> {
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::Persistence(format!(
                "Insert into {} failed (status {}): {}",
                DIAGNOSES_TABLE, status, error_text
            )));
        }

        Ok(())
    }

    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<PersistedDiagnosis>> {
        let response = self
            .client
            .get(self.table_url())
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .query(&[
                (
                    "select",
                    "id,user_id,image_url,disease,confidence,description,advice,created_at"
                        .to_string(),
                ),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::Persistence(format!(
                "Reading {} failed (status {}): {}",
                DIAGNOSES_TABLE, status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnosis;
    use serde_json::Number;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> SupabaseClient {
        SupabaseClient::new(server.uri(), "service-key".to_string())
    }

    fn sample_row() -> DiagnosisRow {
        DiagnosisRow {
            user_id: "user-1".to_string(),
            image_url: "https://x/plant-images/a.jpg".to_string(),
            diagnosis: Diagnosis {
                disease: "Pas".to_string(),
                confidence: Number::from(80),
                description: "d".to_string(),
                advice: "a".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_get_user_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", "Bearer user-token"))
            .and(header("apikey", "service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-1",
                "email": "grower@example.com"
            })))
            .mount(&server)
            .await;

        let user = make_client(&server).get_user("user-token").await.unwrap();
        assert_eq!(user.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_get_user_rejected_token_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid JWT"))
            .mount(&server)
            .await;

        let user = make_client(&server).get_user("expired").await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_get_user_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = make_client(&server).get_user("t").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_insert_posts_flat_row_with_service_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/diagnoses"))
            .and(header("Authorization", "Bearer service-key"))
            .and(body_json(serde_json::json!({
                "user_id": "user-1",
                "image_url": "https://x/plant-images/a.jpg",
                "disease": "Pas",
                "confidence": 80,
                "description": "d",
                "advice": "a"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        make_client(&server).insert(&sample_row()).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_failure_is_persistence_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/diagnoses"))
            .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
            .mount(&server)
            .await;

        let err = make_client(&server).insert(&sample_row()).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_list_recent_filters_orders_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/diagnoses"))
            .and(query_param("user_id", "eq.user-1"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "7d9f0c5e-3b8a-4f7e-9a51-2f1c3e4d5a6b",
                "user_id": "user-1",
                "image_url": "https://x/plant-images/a.jpg",
                "disease": "Pas",
                "confidence": 80,
                "description": "d",
                "advice": "a",
                "created_at": "2026-03-01T10:15:00.123456+00:00"
            }])))
            .mount(&server)
            .await;

        let rows = make_client(&server).list_recent("user-1", 20).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].diagnosis.disease, "Pas");
        assert_eq!(rows[0].diagnosis.confidence, Number::from(80));
    }
}
