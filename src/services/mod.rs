// Service exports
pub mod auth;
pub mod memory;
pub mod notifier;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    CallSession, CallSummary, CandidateFilter, CandidateRecord, ConstraintSet, RecruiterDecision, SessionFields,
    SessionStatus,
};

pub use auth::{AuthError, Claims, Identity, TokenVerifier};
pub use memory::MemoryStore;
pub use notifier::{LogNotifier, NotifyError, WebhookNotifier};
pub use postgres::PostgresStore;

/// Errors raised by a persistence backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Persistence collaborator consumed by the matching and session core
#[async_trait]
pub trait Store: Send + Sync {
    /// Candidates accepted by `filter`, in a stable fetch order
    async fn get_candidate_pool(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRecord>, StoreError>;

    /// `Err(NotFound)` for an unknown recruiter, `Ok(None)` when none is configured
    async fn get_constraint_set(&self, recruiter_id: &str) -> Result<Option<ConstraintSet>, StoreError>;

    async fn create_session(&self, session: &CallSession) -> Result<(), StoreError>;

    /// Set the status and merge any `Some` fields into the stored session
    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        fields: SessionFields,
    ) -> Result<(), StoreError>;

    async fn get_session(&self, id: &str) -> Result<Option<CallSession>, StoreError>;

    /// Maintain a user's online flag
    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Notification collaborator; callers never await it on the critical path
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_decision(
        &self,
        session: &CallSession,
        decision: &RecruiterDecision,
        notes: Option<&str>,
    ) -> Result<(), NotifyError>;

    async fn notify_summary(&self, session: &CallSession, summary: &CallSummary) -> Result<(), NotifyError>;
}
