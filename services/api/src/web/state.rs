//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the background task that
//! reports failed session writes.

use crate::config::Config;
use exam_forge_core::ports::{DatabaseService, StructuredGenerationService};
use exam_forge_core::recorder::{PersistenceFailure, SessionRecorder};
use std::sync::Arc;
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::error;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub generator: Arc<dyn StructuredGenerationService>,
    pub recorder: SessionRecorder,
}

impl AppState {
    /// Builds the state and starts draining the recorder's failure channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        generator: Arc<dyn StructuredGenerationService>,
    ) -> Self {
        let (recorder, failures) = SessionRecorder::new(db.clone());
        spawn_failure_logger(failures);
        Self {
            db,
            config,
            generator,
            recorder,
        }
    }
}

//=========================================================================================
// Persistence Failure Logging
//=========================================================================================

/// Logs every session write that failed in the background.
///
/// The task ends once every `SessionRecorder` clone has been dropped.
pub fn spawn_failure_logger(mut failures: UnboundedReceiver<PersistenceFailure>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            error!(
                "Failed to persist study session {} for user {}: {:?}",
                failure.session_id, failure.owner, failure.error
            );
        }
    })
}
