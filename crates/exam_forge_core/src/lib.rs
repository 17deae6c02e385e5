pub mod dispatch;
pub mod domain;
pub mod error;
pub mod generation;
pub mod history;
pub mod ports;
pub mod recorder;
pub mod report;
pub mod schema;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dispatch::dispatch;
pub use domain::{
    AssetKind, Mode, StudyInput, StudySession, StudySessionSummary, UploadedAsset,
    User, UserCredentials,
};
pub use error::{GenerationFailure, StudyError};
pub use history::SessionHistory;
pub use ports::{DatabaseService, PortError, PortResult, StructuredGenerationService, StructuredPrompt};
pub use recorder::{PersistenceFailure, SessionRecorder};
pub use schema::IntelligenceResult;
