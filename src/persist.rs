//! Best-effort diagnosis history.
//!
//! Writing history never blocks or changes a diagnosis response: a missing
//! credential, an unresolvable one, or a failed write all end in a log line.

use crate::models::{Diagnosis, DiagnosisRow, PersistedDiagnosis, Session};
use crate::store::{DiagnosisStore, IdentityProvider};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Number of records returned by a history read.
pub const HISTORY_LIMIT: usize = 20;

/// Outcome of a persistence attempt, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored,
    NoCredential,
    UnknownCaller,
    Failed,
}

#[derive(Clone)]
pub struct DiagnosisPersister {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DiagnosisStore>,
}

impl DiagnosisPersister {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DiagnosisStore>) -> Self {
        Self { identity, store }
    }

    async fn resolve_user(&self, token: &str) -> Option<String> {
        match self.identity.get_user(token).await {
            Ok(Some(user_id)) => Some(user_id),
            Ok(None) => {
                warn!("Bearer credential did not resolve to a user");
                None
            }
            Err(e) => {
                warn!("Identity lookup failed: {}", e);
                None
            }
        }
    }

    /// Record a diagnosis for the caller. Never fails.
    pub async fn persist(
        &self,
        diagnosis: &Diagnosis,
        image_url: &str,
        session: &Session,
    ) -> PersistOutcome {
        let Some(token) = session.bearer.as_deref() else {
            return PersistOutcome::NoCredential;
        };
        let Some(user_id) = self.resolve_user(token).await else {
            return PersistOutcome::UnknownCaller;
        };

        let row = DiagnosisRow {
            user_id,
            image_url: image_url.to_string(),
            diagnosis: diagnosis.clone(),
        };

        match self.store.insert(&row).await {
            Ok(()) => {
                info!("Stored diagnosis for user {}", row.user_id);
                PersistOutcome::Stored
            }
            Err(e) => {
                error!("Database insert error: {}", e);
                PersistOutcome::Failed
            }
        }
    }

    /// The caller's most recent diagnoses, newest first.
    pub async fn recent(&self, session: &Session) -> Result<Vec<PersistedDiagnosis>> {
        let token = session.bearer.as_deref().ok_or(Error::Unauthorized)?;
        let user_id = self.resolve_user(token).await.ok_or(Error::Unauthorized)?;
        self.store.list_recent(&user_id, HISTORY_LIMIT).await
    }
}
