use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trackshare_db::entities::user::{self, UserRole};
use trackshare_db::{NewUser, UserChanges};
use uuid::Uuid;

use super::jwt::{generate_token_pair, validate_token, TokenPair, TokenType};
use super::middleware::AuthUser;
use super::password::{check_password_length, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;

// ─── Request/Response DTOs ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

// ─── Validation ─────────────────────────────────────────────────────

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub(crate) fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_email(email: &str) -> ApiResult<String> {
    let email = normalize_email(email);
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.contains(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            });
    if !valid {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(email)
}

fn new_password_hash(password: &str) -> ApiResult<String> {
    check_password_length(password).map_err(ApiError::Validation)?;
    hash_password(password).map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn issue_tokens(state: &AppState, user: &user::Model) -> ApiResult<TokenPair> {
    generate_token_pair(user.id, &user.name, user.role.as_str(), &state.jwt)
        .map_err(|e| ApiError::Internal(format!("token generation failed: {e}")))
}

// ─── Handlers ──────────────────────────────────────────────────────

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let name = validate_name(&body.name)?;
    let email = validate_email(&body.email)?;
    let password_hash = new_password_hash(&body.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    // First account on a fresh instance administers it.
    let role = if state.users.count().await? == 0 {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let created = state
        .users
        .insert(NewUser {
            name,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = %created.id, role = %created.role, "user registered");

    let tokens = issue_tokens(&state, &created)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: created.into(),
            tokens,
        }),
    ))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::unauthenticated("Invalid email or password");

    let user = state
        .users
        .find_by_email(&normalize_email(&body.email))
        .await?
        .ok_or_else(invalid)?;

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("stored password hash unreadable: {e}")))?;
    if !valid {
        tracing::debug!(user_id = %user.id, "login rejected");
        return Err(invalid());
    }

    let tokens = issue_tokens(&state, &user)?;
    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = validate_token(&body.refresh_token, &state.jwt.secret)
        .map_err(|_| ApiError::unauthenticated("Invalid or expired refresh token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthenticated("Invalid token type"));
    }

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User no longer exists"))?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// GET /api/v1/auth/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user.into()))
}

/// PUT /api/v1/auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut changes = UserChanges::default();

    if let Some(name) = body.name.as_deref() {
        changes.name = Some(validate_name(name)?);
    }
    if let Some(email) = body.email.as_deref() {
        let email = validate_email(email)?;
        if email != auth_user.email {
            if let Some(other) = state.users.find_by_email(&email).await? {
                if other.id != auth_user.id {
                    return Err(ApiError::Conflict("Email already in use".to_string()));
                }
            }
            changes.email = Some(email);
        }
    }
    if let Some(password) = body.password.as_deref() {
        changes.password_hash = Some(new_password_hash(password)?);
    }

    let updated = state
        .users
        .update(auth_user.id, changes)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    tracing::info!(user_id = %updated.id, "profile updated");
    Ok(Json(updated.into()))
}
