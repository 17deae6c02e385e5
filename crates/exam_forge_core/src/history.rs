//! crates/exam_forge_core/src/history.rs
//!
//! The read-only view of a user's past sessions.

use uuid::Uuid;

use crate::domain::StudySessionSummary;
use crate::ports::{DatabaseService, PortResult};

pub const HISTORY_LIMIT: usize = 20;

/// The owner's most recent sessions, newest first.
///
/// Built from scratch for whichever owner is passed in, so a change of
/// identity simply means loading a new history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistory {
    pub owner: Uuid,
    pub sessions: Vec<StudySessionSummary>,
}

impl SessionHistory {
    pub async fn load(db: &dyn DatabaseService, owner: Uuid) -> PortResult<Self> {
        let sessions = db.list_recent_study_sessions(owner, HISTORY_LIMIT).await?;
        Ok(Self { owner, sessions })
    }
}
