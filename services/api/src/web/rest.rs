//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{AuthResponse, LoginRequest, SignupRequest},
    state::AppState,
    uploads::{read_generation_form, UploadError},
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use exam_forge_core::{
    dispatch,
    domain::{Mode, StudyInput, StudySession, StudySessionSummary},
    history::SessionHistory,
    ports::PortError,
    report::{render_report, report_file_name},
    IntelligenceResult, StudyError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

pub const INPUT_REQUIRED_MESSAGE: &str =
    "Please provide some text, an image, or a document to analyze.";
pub const GENERATION_FAILED_MESSAGE: &str = "Could not generate intelligence.";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_handler,
        list_sessions_handler,
        get_session_handler,
        delete_session_handler,
        session_report_handler,
        crate::web::auth::anonymous_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
    ),
    components(
        schemas(SessionResponse, SessionSummaryResponse, SignupRequest, LoginRequest, AuthResponse)
    ),
    tags(
        (name = "ExamForge AI API", description = "Turns study material into exam-focused intelligence.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A stored session together with its generated content.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String, example = "survival")]
    pub mode: Mode,
    pub source_type: String,
    pub extracted_text: String,
    pub uploaded_at: DateTime<Utc>,
    /// `{"mode": "...", "result": {...}}`
    #[schema(value_type = Object)]
    pub generated_content: IntelligenceResult,
}

impl From<StudySession> for SessionResponse {
    fn from(session: StudySession) -> Self {
        Self {
            id: session.id,
            title: session.title,
            mode: session.mode,
            source_type: session.source_type,
            extracted_text: session.extracted_text,
            uploaded_at: session.uploaded_at,
            generated_content: session.result,
        }
    }
}

/// One entry of the session history.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummaryResponse {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String, example = "mcq-generator")]
    pub mode: Mode,
    pub source_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StudySessionSummary> for SessionSummaryResponse {
    fn from(summary: StudySessionSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            mode: summary.mode,
            source_type: summary.source_type,
            uploaded_at: summary.uploaded_at,
        }
    }
}

fn port_error_response(e: PortError, what: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(_) => {
            error!("Failed to access {}: {:?}", what, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to access {}", what),
            )
        }
    }
}

//=========================================================================================
// Generation
//=========================================================================================

/// Runs one generation for `owner` and hands the result to the recorder.
///
/// The response is built from the record the recorder returns; the write
/// itself finishes in the background.
pub async fn run_generation(
    app_state: &AppState,
    owner: Uuid,
    mode: Mode,
    input: StudyInput,
) -> Result<SessionResponse, (StatusCode, String)> {
    info!(
        "Generating {} intelligence for user {} ({} attachments)",
        mode,
        owner,
        input.attachments.len()
    );

    let result = dispatch(app_state.generator.as_ref(), mode, &input)
        .await
        .map_err(|e| match e {
            StudyError::InputMissing => (StatusCode::BAD_REQUEST, INPUT_REQUIRED_MESSAGE.to_string()),
            StudyError::GenerationFailed { .. } => {
                error!("{} generation failed for user {}: {}", mode, owner, e);
                (StatusCode::BAD_GATEWAY, GENERATION_FAILED_MESSAGE.to_string())
            }
        })?;

    let session = app_state.recorder.record(owner, mode, &input, result);
    info!("Generated {} intelligence as session {}", mode, session.id);
    Ok(session.into())
}

/// Generate study intelligence from text and uploaded files.
///
/// Accepts a multipart/form-data request with a `mode` field, an optional
/// `text` field and any number of image, PDF or PPTX file parts.
#[utoipa::path(
    post,
    path = "/generate",
    request_body(content_type = "multipart/form-data", description = "The mode, typed notes and attachments."),
    responses(
        (status = 200, description = "Intelligence generated", body = SessionResponse),
        (status = 400, description = "No input, unknown mode or unsupported file"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "The generation service produced no usable output")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let form = read_generation_form(&mut multipart, app_state.config.max_upload_bytes)
        .await
        .map_err(|e| {
            if let UploadError::Multipart(_) = e {
                error!("Failed to read generation form: {:?}", e);
            }
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let session = run_generation(&app_state, user_id, form.mode, form.input).await?;
    Ok(Json(session))
}

//=========================================================================================
// Session History
//=========================================================================================

/// List the signed-in user's 20 most recent sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Session history", body = [SessionSummaryResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = SessionHistory::load(app_state.db.as_ref(), user_id)
        .await
        .map_err(|e| port_error_response(e, "session history"))?;

    let sessions: Vec<SessionSummaryResponse> =
        history.sessions.into_iter().map(Into::into).collect();
    Ok(Json(sessions))
}

/// Load one session with its generated content.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state
        .db
        .get_study_session(user_id, session_id)
        .await
        .map_err(|e| port_error_response(e, "Session"))?;
    Ok(Json(SessionResponse::from(session)))
}

/// Delete one of the signed-in user's sessions.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .db
        .delete_study_session(user_id, session_id)
        .await
        .map_err(|e| port_error_response(e, "Session"))?;
    info!("Deleted session {} for user {}", session_id, user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Download a session's result as a Markdown report.
#[utoipa::path(
    get,
    path = "/sessions/{id}/report",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "The Markdown report", body = String, content_type = "text/markdown"),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn session_report_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state
        .db
        .get_study_session(user_id, session_id)
        .await
        .map_err(|e| port_error_response(e, "Session"))?;

    let generated_at = Utc::now();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report_file_name(session.mode, generated_at)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        render_report(&session.result, generated_at),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::to_bytes;
    use exam_forge_core::domain::UploadedAsset;
    use exam_forge_core::ports::{DatabaseService, StructuredGenerationService};
    use exam_forge_core::testing::{survival_payload, weaponizer_payload, FakeGenerator, InMemoryDb};

    fn state(db: Arc<InMemoryDb>, generator: FakeGenerator) -> Arc<AppState> {
        let generator: Arc<dyn StructuredGenerationService> = Arc::new(generator);
        Arc::new(AppState::new(db, Arc::new(Config::for_tests()), generator))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn empty_input_is_a_bad_request() {
        let app_state = state(Arc::new(InMemoryDb::new()), FakeGenerator::returning(survival_payload()));

        let (status, message) = run_generation(&app_state, Uuid::new_v4(), Mode::Survival, StudyInput::default())
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, INPUT_REQUIRED_MESSAGE);
    }

    #[tokio::test]
    async fn generation_failures_share_one_message() {
        let app_state = state(Arc::new(InMemoryDb::new()), FakeGenerator::returning(weaponizer_payload(7)));

        let (status, message) = run_generation(
            &app_state,
            Uuid::new_v4(),
            Mode::Weaponizer,
            StudyInput::new("Electrostatics", vec![]),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(message, GENERATION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn successful_generation_is_recorded_for_the_owner() {
        let db = Arc::new(InMemoryDb::new());
        let app_state = state(db.clone(), FakeGenerator::returning(survival_payload()));
        let owner = Uuid::new_v4();
        let input = StudyInput::new(
            "",
            vec![UploadedAsset::image("board.jpg", "image/jpeg", 3, "data:image/jpeg;base64,AAAA".into())],
        );

        let session = run_generation(&app_state, owner, Mode::Survival, input).await.unwrap();
        assert_eq!(session.title, "board.jpg");
        assert_eq!(session.source_type, "image/jpeg");
        assert_eq!(session.generated_content.mode(), Mode::Survival);

        db.written.notified().await;
        let stored = db.get_study_session(owner, session.id).await.unwrap();
        assert_eq!(stored.result, session.generated_content);
    }

    #[tokio::test]
    async fn sessions_can_be_listed_loaded_reported_and_deleted() {
        let db = Arc::new(InMemoryDb::new());
        let app_state = state(db.clone(), FakeGenerator::returning(survival_payload()));
        let owner = Uuid::new_v4();

        let session = run_generation(&app_state, owner, Mode::Survival, StudyInput::new("Cell biology", vec![]))
            .await
            .unwrap();
        db.written.notified().await;

        let listed = list_sessions_handler(State(app_state.clone()), Extension(owner))
            .await
            .unwrap()
            .into_response();
        assert_eq!(listed.status(), StatusCode::OK);
        assert!(body_text(listed).await.contains("Cell biology"));

        let report = session_report_handler(State(app_state.clone()), Extension(owner), Path(session.id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(
            report.headers()[header::CONTENT_TYPE],
            "text/markdown; charset=utf-8"
        );
        let markdown = body_text(report).await;
        assert!(markdown.contains("**Mode:** SURVIVAL"));
        assert!(markdown.contains("## Key Formulas\n- $C_6H_{12}O_6$"));

        let deleted = delete_session_handler(State(app_state.clone()), Extension(owner), Path(session.id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let (status, _) = get_session_handler(State(app_state), Extension(owner), Path(session.id))
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_cannot_load_a_session() {
        let db = Arc::new(InMemoryDb::new());
        let app_state = state(db.clone(), FakeGenerator::returning(survival_payload()));

        let session = run_generation(&app_state, Uuid::new_v4(), Mode::Survival, StudyInput::new("Private notes", vec![]))
            .await
            .unwrap();
        db.written.notified().await;

        let (status, _) = get_session_handler(State(app_state), Extension(Uuid::new_v4()), Path(session.id))
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
