//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: anonymous sign-in, signup, login, logout and the
//! current-user lookup.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use exam_forge_core::domain::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use utoipa::ToSchema;
use crate::web::state::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 6;
const SESSION_COOKIE: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl From<User> for AuthResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            is_anonymous: user.is_anonymous,
        }
    }
}

//=========================================================================================
// Session Cookie Helpers
//=========================================================================================

/// Finds the auth session id in a `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
}

/// Creates an auth session for `user_id` and returns its `Set-Cookie` value.
async fn start_auth_session(
    state: &AppState,
    user_id: Uuid,
) -> Result<String, (StatusCode, String)> {
    let lifetime = Duration::days(state.config.auth_session_days);
    let auth_session_id = Uuid::new_v4().to_string();

    state
        .db
        .create_auth_session(&auth_session_id, user_id, Utc::now() + lifetime)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        lifetime.num_seconds()
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/anonymous - Start a session for a fresh anonymous user
#[utoipa::path(
    post,
    path = "/auth/anonymous",
    responses(
        (status = 201, description = "Anonymous user created", body = AuthResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn anonymous_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.db.create_anonymous_user().await.map_err(|e| {
        error!("Failed to create anonymous user: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
    })?;

    let cookie = start_auth_session(&state, user.user_id).await?;
    info!("Started anonymous session for user {}", user.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "An email address is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Passwords need at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    let user = state
        .db
        .create_user_with_email(email, &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to create user: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
        })?;

    let cookie = start_auth_session(&state, user.user_id).await?;
    info!("Registered user {}", user.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_creds = state
        .db
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()));
    }

    let cookie = start_auth_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: Some(user_creds.email),
        is_anonymous: false,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/me - The user behind the current session
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The signed-in user", body = AuthResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.db.get_user(user_id).await.map_err(|e| {
        error!("Failed to load user {}: {:?}", user_id, e);
        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
    })?;
    Ok(Json(AuthResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::HeaderValue;
    use axum::response::Response;
    use exam_forge_core::ports::{DatabaseService, StructuredGenerationService};
    use exam_forge_core::testing::{survival_payload, FakeGenerator, InMemoryDb};

    fn state(db: Arc<InMemoryDb>) -> Arc<AppState> {
        let generator: Arc<dyn StructuredGenerationService> =
            Arc::new(FakeGenerator::returning(survival_payload()));
        Arc::new(AppState::new(db, Arc::new(Config::for_tests()), generator))
    }

    fn cookie_of(response: &Response) -> String {
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_string()
    }

    fn session_of(cookie: &str) -> String {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        session_id_from_headers(&headers).unwrap().split(';').next().unwrap().to_string()
    }

    #[test]
    fn session_id_is_read_from_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; sessionless=1"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123"));
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn anonymous_users_get_a_session() {
        let db = Arc::new(InMemoryDb::new());
        let response = anonymous_handler(State(state(db.clone())))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = cookie_of(&response);
        assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 60 * 60)));

        let user_id = db.validate_auth_session(&session_of(&cookie)).await.unwrap();
        assert!(db.get_user(user_id).await.unwrap().is_anonymous);
    }

    #[tokio::test]
    async fn signup_rejects_short_passwords_and_blank_emails() {
        let app_state = state(Arc::new(InMemoryDb::new()));

        let (status, _) = signup_handler(
            State(app_state.clone()),
            Json(SignupRequest { email: "a@b.c".into(), password: "12345".into() }),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = signup_handler(
            State(app_state),
            Json(SignupRequest { email: "  ".into(), password: "123456".into() }),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_up_users_can_log_in_and_out() {
        let db = Arc::new(InMemoryDb::new());
        let app_state = state(db.clone());

        let signup = signup_handler(
            State(app_state.clone()),
            Json(SignupRequest { email: "ada@example.com".into(), password: "analytical".into() }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(signup.status(), StatusCode::CREATED);

        let (status, _) = login_handler(
            State(app_state.clone()),
            Json(LoginRequest { email: "ada@example.com".into(), password: "wrong-password".into() }),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let login = login_handler(
            State(app_state.clone()),
            Json(LoginRequest { email: "ada@example.com".into(), password: "analytical".into() }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(login.status(), StatusCode::OK);

        let session_id = session_of(&cookie_of(&login));
        let user_id = db.validate_auth_session(&session_id).await.unwrap();
        let me = me_handler(State(app_state.clone()), Extension(user_id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(me.status(), StatusCode::OK);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        );
        let logout = logout_handler(State(app_state), headers)
            .await
            .unwrap()
            .into_response();
        assert!(cookie_of(&logout).contains("Max-Age=0"));
        assert!(db.validate_auth_session(&session_id).await.is_err());
    }
}
