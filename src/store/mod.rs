//! Identity and durable-store collaborators
//!
//! The pipeline only needs to turn a bearer token into a user id and to
//! append diagnosis rows; history reads go through the same store. Both are
//! served by the project's Supabase instance over its REST endpoints.

pub mod client;
pub mod mock;

pub use client::SupabaseClient;
pub use mock::{MockDiagnosisStore, MockIdentityProvider};

use crate::models::{DiagnosisRow, PersistedDiagnosis};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to a user id. `Ok(None)` when the token is not
    /// accepted.
    async fn get_user(&self, token: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait DiagnosisStore: Send + Sync {
    async fn insert(&self, row: &DiagnosisRow) -> Result<()>;
    /// Most recent diagnoses of one user, newest first.
    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<PersistedDiagnosis>>;
}
