use super::{DiagnosisStore, IdentityProvider};
use crate::models::{DiagnosisRow, PersistedDiagnosis};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    users: Arc<Mutex<HashMap<String, String>>>,
    lookup_count: Arc<Mutex<usize>>,
    fail_lookups: bool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, token: &str, user_id: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(token.to_string(), user_id.to_string());
        self
    }

    /// Every lookup errors, as if the auth service were down.
    pub fn failing(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn get_lookup_count(&self) -> usize {
        *self.lookup_count.lock().unwrap()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_user(&self, token: &str) -> Result<Option<String>> {
        *self.lookup_count.lock().unwrap() += 1;

        if self.fail_lookups {
            return Err(Error::Persistence("auth service unreachable".to_string()));
        }

        Ok(self.users.lock().unwrap().get(token).cloned())
    }
}

/// In-memory store. Rows get an id and timestamp on insert like the real table.
#[derive(Clone, Default)]
pub struct MockDiagnosisStore {
    rows: Arc<Mutex<Vec<PersistedDiagnosis>>>,
    insert_count: Arc<Mutex<usize>>,
    fail_inserts: bool,
}

impl MockDiagnosisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every insert fails, as if the store were unreachable.
    pub fn failing(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn get_insert_count(&self) -> usize {
        *self.insert_count.lock().unwrap()
    }

    pub fn get_rows(&self) -> Vec<PersistedDiagnosis> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisStore for MockDiagnosisStore {
    async fn insert(&self, row: &DiagnosisRow) -> Result<()> {
        *self.insert_count.lock().unwrap() += 1;

        if self.fail_inserts {
            return Err(Error::Persistence("store unreachable".to_string()));
        }

        self.rows.lock().unwrap().push(PersistedDiagnosis {
            id: Uuid::new_v4(),
            user_id: row.user_id.clone(),
            image_url: row.image_url.clone(),
            diagnosis: row.diagnosis.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<PersistedDiagnosis>> {
        let rows = self.rows.lock().unwrap();
        // Insertion order is creation order.
        Ok(rows
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
