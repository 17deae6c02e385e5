//! crates/exam_forge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{StudySession, StudySessionSummary, User, UserCredentials};
use crate::schema::OutputSchema;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Structured Generation
//=========================================================================================

/// Everything the structured generation service needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPrompt {
    pub instruction: String,
    /// An optional `data:` URI for an image the model should look at.
    pub media: Option<String>,
    pub schema: OutputSchema,
}

#[async_trait]
pub trait StructuredGenerationService: Send + Sync {
    /// Sends the prompt once and returns the schema-shaped object.
    ///
    /// `Ok(None)` means the model answered with no output at all.
    async fn generate_structured(&self, prompt: StructuredPrompt) -> PortResult<Option<Value>>;
}

//=========================================================================================
// Document Store
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_anonymous_user(&self) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Study Sessions ---
    /// Creates the session, merging into any existing record with the same id.
    async fn upsert_study_session(&self, session: &StudySession) -> PortResult<()>;

    /// Lists the owner's sessions, most recently uploaded first.
    async fn list_recent_study_sessions(
        &self,
        owner: Uuid,
        limit: usize,
    ) -> PortResult<Vec<StudySessionSummary>>;

    async fn get_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<StudySession>;

    async fn delete_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<()>;
}
