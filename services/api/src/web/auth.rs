//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, logout and the current session.

use crate::web::middleware::{session_cookie, SESSION_COOKIE};
use crate::web::rest::{error_response, HandlerError};
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bite_core::domain::User;
use bite_core::ports::PortError;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<User> for AuthResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn internal(message: &str) -> HandlerError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn invalid_credentials() -> HandlerError {
    error_response(StatusCode::UNAUTHORIZED, "Invalid email or password")
}

fn session_set_cookie(session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        ttl.num_seconds()
    )
}

/// Opens a session for `user_id` and returns the `Set-Cookie` value for it.
async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, HandlerError> {
    let session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);

    state
        .db
        .create_auth_session(&session_id, user_id, Utc::now() + ttl)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            internal("Failed to create session")
        })?;

    Ok(session_set_cookie(&session_id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account and sign it in
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid email or password too short", body = crate::web::rest::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::web::rest::ErrorBody),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let email = normalize_email(&req.email);
    if !email.contains('@') {
        return Err(error_response(StatusCode::BAD_REQUEST, "Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            internal("Failed to hash password")
        })?
        .to_string();

    let user = state
        .db
        .create_user_with_email(&email, name, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::AlreadyExists(_) => {
                error_response(StatusCode::CONFLICT, "Email already registered")
            }
            other => {
                error!("Failed to create user: {:?}", other);
                internal("Failed to create user")
            }
        })?;

    let cookie = open_session(&state, user.user_id).await?;
    info!(user_id = %user.user_id, "User signed up");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

/// POST /auth/login - Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::web::rest::ErrorBody),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let email = normalize_email(&req.email);
    let creds = state.db.get_user_by_email(&email).await.map_err(|e| {
        if !matches!(e, PortError::NotFound(_)) {
            error!("Failed to get user: {:?}", e);
        }
        invalid_credentials()
    })?;

    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        internal("Authentication error")
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid_credentials())?;

    let user = state.db.get_user_by_id(creds.user_id).await.map_err(|e| {
        error!("Failed to load user after login: {:?}", e);
        internal("Authentication error")
    })?;
    let cookie = open_session(&state, user.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

/// POST /auth/logout - Invalidate the current session
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
) -> Result<impl IntoResponse, HandlerError> {
    let session_id = session_cookie(&headers)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "No session found"))?;

    state
        .db
        .delete_auth_session(session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            internal("Failed to logout")
        })?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_set_cookie("", Duration::zero()))],
    ))
}

/// GET /auth/session - The signed-in user, or `null`
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "The current user, or null without a live session", body = Option<AuthResponse>)
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Option<AuthResponse>>, HandlerError> {
    let Some(session_id) = session_cookie(&headers) else {
        return Ok(Json(None));
    };

    let user_id = match state.db.validate_auth_session(session_id).await {
        Ok(user_id) => user_id,
        Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => return Ok(Json(None)),
        Err(e) => {
            error!("Failed to validate auth session: {:?}", e);
            return Err(internal("Failed to read session"));
        }
    };

    match state.db.get_user_by_id(user_id).await {
        Ok(user) => Ok(Json(Some(user.into()))),
        Err(PortError::NotFound(_)) => Ok(Json(None)),
        Err(e) => {
            error!("Failed to load session user: {:?}", e);
            Err(internal("Failed to read session"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn cookie_carries_the_session_and_lifetime() {
        let cookie = session_set_cookie("abc", Duration::days(1));
        assert_eq!(
            cookie,
            "session=abc; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=86400"
        );
        assert!(session_set_cookie("", Duration::zero()).ends_with("Max-Age=0"));
    }
}
