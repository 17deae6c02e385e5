//! crates/exam_forge_core/src/testing.rs
//!
//! In-memory fakes for the core ports, shared by the unit tests of this crate
//! and (through the `test-support` feature) by the service crate's tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::{StudySession, StudySessionSummary, User, UserCredentials};
use crate::ports::{
    DatabaseService, PortError, PortResult, StructuredGenerationService, StructuredPrompt,
};

//=========================================================================================
// Structured Generation
//=========================================================================================

/// A generation service that answers every prompt with the same canned reply.
pub struct FakeGenerator {
    reply: Result<Option<Value>, String>,
    prompts: Mutex<Vec<StructuredPrompt>>,
}

impl FakeGenerator {
    pub fn returning(value: Value) -> Self {
        Self::with_reply(Ok(Some(value)))
    }

    pub fn empty() -> Self {
        Self::with_reply(Ok(None))
    }

    pub fn failing() -> Self {
        Self::with_reply(Err("model endpoint unreachable".to_string()))
    }

    fn with_reply(reply: Result<Option<Value>, String>) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<StructuredPrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StructuredGenerationService for FakeGenerator {
    async fn generate_structured(&self, prompt: StructuredPrompt) -> PortResult<Option<Value>> {
        self.prompts.lock().unwrap().push(prompt);
        self.reply.clone().map_err(PortError::Unexpected)
    }
}

pub fn survival_payload() -> Value {
    json!({
        "revisionSummary": "Cells are the basic unit of life.",
        "keyFormulas": ["$C_6H_{12}O_6$"],
        "importantDefinitions": ["Organelle: a specialised subunit of a cell"],
        "criticalTheorems": []
    })
}

pub fn weaponizer_payload(questions: usize) -> Value {
    let probable: Vec<String> = (1..=questions).map(|i| format!("Question {i}?")).collect();
    json!({
        "probableQuestions": probable,
        "predictedWeightage": "High",
        "importantDerivations": ["$$\\Delta U = Q - W$$"],
        "strategicStudySuggestions": ["Revise the first law daily"]
    })
}

pub fn trap_payload() -> Value {
    json!({
        "commonMistakes": ["Dropping the sign of work"],
        "misconceptions": ["Heat and temperature are the same"],
        "trickQuestions": ["Is an adiabatic process isothermal?"],
        "frequentlyConfusedConcepts": ["Heat vs temperature"],
        "summary": "Watch the sign conventions."
    })
}

pub fn mcq_payload(count: usize) -> Value {
    let mcqs: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "question": format!("What is {i} + {i}?"),
                "options": [format!("{}", i * 2), format!("{}", i * 2 + 1), "0"],
                "answer": format!("{}", i * 2),
                "explanation": "Addition."
            })
        })
        .collect();
    json!({ "mcqs": mcqs })
}

//=========================================================================================
// Document Store
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    passwords: HashMap<String, (Uuid, String)>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    study_sessions: HashMap<Uuid, StudySession>,
}

/// A `DatabaseService` backed by hash maps.
///
/// Writes can be held back with [`InMemoryDb::gated`] and released with
/// [`InMemoryDb::release_write`]; every finished write signals `written`.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    fail_writes: bool,
    gate: Option<Notify>,
    pub written: Notify,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn release_write(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn stored_sessions(&self) -> usize {
        self.tables.lock().unwrap().study_sessions.len()
    }

    pub fn insert_session(&self, session: StudySession) {
        self.tables
            .lock()
            .unwrap()
            .study_sessions
            .insert(session.id, session);
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_anonymous_user(&self) -> PortResult<User> {
        let user = User {
            user_id: Uuid::new_v4(),
            email: None,
            is_anonymous: true,
        };
        self.tables
            .lock()
            .unwrap()
            .users
            .insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.tables
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.passwords.contains_key(email) {
            return Err(PortError::Unexpected(format!("{email} is already registered")));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
            is_anonymous: false,
        };
        tables
            .passwords
            .insert(email.to_string(), (user.user_id, hashed_password.to_string()));
        tables.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables
            .lock()
            .unwrap()
            .passwords
            .get(email)
            .map(|(user_id, hashed_password)| UserCredentials {
                user_id: *user_id,
                email: email.to_string(),
                hashed_password: hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .lock()
            .unwrap()
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables.lock().unwrap().auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().unwrap().auth_sessions.remove(session_id);
        Ok(())
    }

    async fn upsert_study_session(&self, session: &StudySession) -> PortResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let outcome = if self.fail_writes {
            Err(PortError::Unexpected("document store is read-only".to_string()))
        } else {
            self.insert_session(session.clone());
            Ok(())
        };
        self.written.notify_one();
        outcome
    }

    async fn list_recent_study_sessions(
        &self,
        owner: Uuid,
        limit: usize,
    ) -> PortResult<Vec<StudySessionSummary>> {
        let tables = self.tables.lock().unwrap();
        let mut sessions: Vec<&StudySession> = tables
            .study_sessions
            .values()
            .filter(|session| session.owner == owner)
            .collect();
        sessions.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(sessions
            .into_iter()
            .take(limit)
            .map(StudySessionSummary::from)
            .collect())
    }

    async fn get_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<StudySession> {
        self.tables
            .lock()
            .unwrap()
            .study_sessions
            .get(&session_id)
            .filter(|session| session.owner == owner)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Study session {} not found", session_id)))
    }

    async fn delete_study_session(&self, owner: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.study_sessions.get(&session_id) {
            Some(session) if session.owner == owner => {
                tables.study_sessions.remove(&session_id);
                Ok(())
            }
            _ => Err(PortError::NotFound(format!(
                "Study session {} not found",
                session_id
            ))),
        }
    }
}
