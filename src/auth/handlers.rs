use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::dto::{LoginRequest, PublicUser, RegisterRequest, TokenResponse};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let (Some(name), Some(email), Some(password)) =
        (payload.name, payload.email, payload.password)
    else {
        return Err(AppError::BadRequest(
            "name, email and password are required".into(),
        ));
    };
    let email = email.trim().to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let hash = hash_password(&password)?;
    let role = payload.role.unwrap_or(Role::Participant);

    // The unique index on email is authoritative; the store's violation is
    // surfaced as a 400 to the client.
    let user = User::create(&state.db, &name, &email, &hash, role)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                warn!(email = %email, "email already registered");
                AppError::BadRequest("Email already registered".into())
            } else {
                AppError::Internal(e.into())
            }
        })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::BadRequest(
            "email and password are required".into(),
        ));
    };
    let email = email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AppError::Unauthenticated("Invalid credentials".into())
        })?;

    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = user.id, "login invalid password");
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse { token }))
}
