//! crates/exam_forge_core/src/recorder.rs
//!
//! Turns a finished generation into a `StudySession` and persists it in the
//! background. The caller never waits on the write; failed writes are reported
//! on a dedicated channel instead of to the caller.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::PreparedInput;
use crate::domain::{Mode, StudyInput, StudySession};
use crate::ports::{DatabaseService, PortError};
use crate::schema::IntelligenceResult;

pub const TITLE_LENGTH: usize = 30;
pub const UNTITLED_SESSION: &str = "Untitled Session";
pub const TEXT_SOURCE_TYPE: &str = "TEXT";

/// A background write that did not make it into the store.
#[derive(Debug)]
pub struct PersistenceFailure {
    pub session_id: Uuid,
    pub owner: Uuid,
    pub error: PortError,
}

/// Derives a session title from the typed text or the first attachment.
pub fn derive_title(input: &StudyInput) -> String {
    let text = input.raw_text.trim_start();
    if !text.is_empty() {
        return text.chars().take(TITLE_LENGTH).collect();
    }
    input
        .attachments
        .first()
        .map(|asset| asset.name.clone())
        .unwrap_or_else(|| UNTITLED_SESSION.to_string())
}

#[derive(Clone)]
pub struct SessionRecorder {
    db: Arc<dyn DatabaseService>,
    failures: mpsc::UnboundedSender<PersistenceFailure>,
}

impl SessionRecorder {
    /// Creates a recorder and the receiving end of its failure channel.
    pub fn new(
        db: Arc<dyn DatabaseService>,
    ) -> (Self, mpsc::UnboundedReceiver<PersistenceFailure>) {
        let (failures, failure_rx) = mpsc::unbounded_channel();
        (Self { db, failures }, failure_rx)
    }

    /// Builds the session record and spawns its write. Returns without waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record(
        &self,
        owner: Uuid,
        mode: Mode,
        input: &StudyInput,
        result: IntelligenceResult,
    ) -> StudySession {
        let now = Utc::now();
        let session = StudySession {
            id: Uuid::new_v4(),
            owner,
            title: derive_title(input),
            source_type: input
                .attachments
                .first()
                .map(|asset| asset.mime_type.clone())
                .unwrap_or_else(|| TEXT_SOURCE_TYPE.to_string()),
            extracted_text: PreparedInput::from_input(input).corpus,
            uploaded_at: now,
            created_at: now,
            mode,
            result,
        };

        let db = self.db.clone();
        let failures = self.failures.clone();
        let pending = session.clone();
        tokio::spawn(async move {
            if let Err(error) = db.upsert_study_session(&pending).await {
                // The receiver may already be gone during shutdown.
                let _ = failures.send(PersistenceFailure {
                    session_id: pending.id,
                    owner: pending.owner,
                    error,
                });
            }
        });

        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UploadedAsset, PDF_MIME};
    use crate::schema::TrapDetectorOutput;
    use crate::testing::InMemoryDb;

    fn result() -> IntelligenceResult {
        IntelligenceResult::TrapDetector(TrapDetectorOutput {
            common_mistakes: vec![],
            misconceptions: vec![],
            trick_questions: vec![],
            frequently_confused_concepts: vec![],
            summary: "None found.".into(),
        })
    }

    #[test]
    fn title_is_the_first_thirty_characters_of_the_text() {
        let input = StudyInput::new("The mitochondria is the powerhouse of the cell", vec![]);
        assert_eq!(derive_title(&input), "The mitochondria is the powerh");
        assert_eq!(derive_title(&input).chars().count(), 30);
    }

    #[test]
    fn title_falls_back_to_the_first_attachment_then_untitled() {
        let notes = UploadedAsset::document("notes.pdf", PDF_MIME, 1, String::new());
        assert_eq!(derive_title(&StudyInput::new("", vec![notes])), "notes.pdf");
        assert_eq!(derive_title(&StudyInput::default()), "Untitled Session");
    }

    #[test]
    fn title_skips_leading_whitespace() {
        let input = StudyInput::new("\n\n   Optics notes", vec![]);
        assert_eq!(derive_title(&input), "Optics notes");
    }

    #[test]
    fn title_counts_characters_not_bytes() {
        let input = StudyInput::new("é".repeat(40), vec![]);
        assert_eq!(derive_title(&input), "é".repeat(30));
    }

    #[tokio::test]
    async fn record_returns_before_the_write_lands() {
        let db = Arc::new(InMemoryDb::gated());
        let (recorder, _failures) = SessionRecorder::new(db.clone());
        let owner = Uuid::new_v4();

        let session = recorder.record(owner, Mode::TrapDetector, &StudyInput::new("Optics", vec![]), result());
        assert_eq!(session.owner, owner);
        assert_eq!(session.source_type, "TEXT");
        assert_eq!(db.stored_sessions(), 0);

        db.release_write();
        db.written.notified().await;
        assert_eq!(db.stored_sessions(), 1);
        let stored = db.get_study_session(owner, session.id).await.unwrap();
        assert_eq!(stored.title, "Optics");
        assert_eq!(stored.extracted_text, "Optics");
    }

    #[tokio::test]
    async fn failed_writes_go_to_the_failure_channel() {
        let db = Arc::new(InMemoryDb::failing_writes());
        let (recorder, mut failures) = SessionRecorder::new(db.clone());
        let owner = Uuid::new_v4();
        let input = StudyInput::new(
            "",
            vec![UploadedAsset::document("notes.pdf", PDF_MIME, 9, "[Content of PDF: notes.pdf]".into())],
        );

        let session = recorder.record(owner, Mode::TrapDetector, &input, result());
        assert_eq!(session.title, "notes.pdf");
        assert_eq!(session.source_type, PDF_MIME);

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.session_id, session.id);
        assert_eq!(failure.owner, owner);
        assert_eq!(db.stored_sessions(), 0);
    }
}
