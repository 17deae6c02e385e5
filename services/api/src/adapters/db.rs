//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_forge_core::domain::{
    Mode, StudySession, StudySessionSummary, User, UserCredentials,
};
use exam_forge_core::ports::{DatabaseService, PortError, PortResult};
use exam_forge_core::schema::IntelligenceResult;
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    is_anonymous: bool,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            is_anonymous: self.is_anonymous,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

fn parse_mode(raw: &str) -> PortResult<Mode> {
    raw.parse::<Mode>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

#[derive(FromRow)]
struct StudySessionRecord {
    id: Uuid,
    owner: Uuid,
    title: String,
    source_type: String,
    extracted_text: String,
    mode: String,
    generated_content: Json<Value>,
    uploaded_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl StudySessionRecord {
    fn to_domain(self) -> PortResult<StudySession> {
        let mode = parse_mode(&self.mode)?;
        let result = IntelligenceResult::from_payload(mode, self.generated_content.0).map_err(|e| {
            PortError::Unexpected(format!("Stored content of session {} is unreadable: {}", self.id, e))
        })?;
        Ok(StudySession {
            id: self.id,
            owner: self.owner,
            title: self.title,
            source_type: self.source_type,
            extracted_text: self.extracted_text,
            uploaded_at: self.uploaded_at,
            created_at: self.created_at,
            mode,
            result,
        })
    }
}

#[derive(FromRow)]
struct StudySessionSummaryRecord {
    id: Uuid,
    title: String,
    mode: String,
    source_type: String,
    uploaded_at: DateTime<Utc>,
}
impl StudySessionSummaryRecord {
    fn to_domain(self) -> PortResult<StudySessionSummary> {
        Ok(StudySessionSummary {
            id: self.id,
            title: self.title,
            mode: parse_mode(&self.mode)?,
            source_type: self.source_type,
            uploaded_at: self.uploaded_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_anonymous_user(&self) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, is_anonymous) VALUES ($1, TRUE) RETURNING user_id, email, is_anonymous",
        )
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, is_anonymous FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password, is_anonymous) VALUES ($1, $2, $3, FALSE) RETURNING user_id, email, is_anonymous",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn upsert_study_session(&self, session: &StudySession) -> PortResult<()> {
        let payload = session
            .result
            .payload()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // `created_at` is left to the database default and never overwritten.
        sqlx::query(
            "INSERT INTO study_sessions (id, owner, title, source_type, extracted_text, mode, generated_content, uploaded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 source_type = EXCLUDED.source_type, \
                 extracted_text = EXCLUDED.extracted_text, \
                 mode = EXCLUDED.mode, \
                 generated_content = EXCLUDED.generated_content, \
                 uploaded_at = EXCLUDED.uploaded_at \
             WHERE study_sessions.owner = EXCLUDED.owner",
        )
        .bind(session.id)
        .bind(session.owner)
        .bind(&session.title)
        .bind(&session.source_type)
        .bind(&session.extracted_text)
        .bind(session.mode.as_str())
        .bind(Json(payload))
        .bind(session.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_recent_study_sessions(
        &self,
        owner: Uuid,
        limit: usize,
    ) -> PortResult<Vec<StudySessionSummary>> {
        let records = sqlx::query_as::<_, StudySessionSummaryRecord>(
            "SELECT id, title, mode, source_type, uploaded_at FROM study_sessions WHERE owner = $1 ORDER BY uploaded_at DESC LIMIT $2",
        )
        .bind(owner)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, StudySessionRecord>(
            "SELECT id, owner, title, source_type, extracted_text, mode, generated_content, uploaded_at, created_at FROM study_sessions WHERE id = $1 AND owner = $2",
        )
        .bind(session_id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Study session {} not found", session_id)))?;
        record.to_domain()
    }

    async fn delete_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM study_sessions WHERE id = $1 AND owner = $2")
            .bind(session_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Study session {} not found",
                session_id
            )));
        }
        Ok(())
    }
}
