use super::DiagnosisModel;
use crate::error::ModelError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

const DEFAULT_REPLY: &str = r#"{"disease":"Sağlıklı Bitki","confidence":90,"description":"Yapraklar sağlıklı görünüyor.","advice":"- Düzenli sulamaya devam edin."}"#;

#[derive(Clone)]
pub struct MockDiagnosisModel {
    responses: Arc<Mutex<Vec<Result<String, ModelError>>>>,
    call_count: Arc<Mutex<usize>>,
    image_urls: Arc<Mutex<Vec<String>>>,
}

impl MockDiagnosisModel {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            image_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(Ok(reply.into()));
        self
    }

    pub fn with_error(self, error: ModelError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_image_urls(&self) -> Vec<String> {
        self.image_urls.lock().unwrap().clone()
    }
}

impl Default for MockDiagnosisModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiagnosisModel for MockDiagnosisModel {
    async fn query(&self, image_url: &str) -> Result<String, ModelError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        self.image_urls.lock().unwrap().push(image_url.to_string());

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(DEFAULT_REPLY.to_string())
        } else {
            let index = (*count - 1) % responses.len();
            responses[index].clone()
        }
    }
}
