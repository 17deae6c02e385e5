pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod uploads;

// Re-export the handlers the binary wires into the router.
pub use auth::{anonymous_handler, login_handler, logout_handler, me_handler, signup_handler};
pub use middleware::require_auth;
pub use rest::{
    delete_session_handler, generate_handler, get_session_handler, list_sessions_handler,
    session_report_handler,
};
