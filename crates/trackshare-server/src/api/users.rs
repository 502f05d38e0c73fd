use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use trackshare_db::entities::user::UserRole;
use trackshare_db::UserChanges;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::auth::routes::{validate_email, validate_name, UserResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::tracks::MessageResponse;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Admin edit of another account. Passwords stay with their owner.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::InvalidIdentifier("user"))
}

fn parse_role(raw: &str) -> ApiResult<UserRole> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation("Role must be one of: admin, moderator, user"))
}

// An admin demoting themselves could leave the instance without one.
fn check_not_self_demotion(id: Uuid, admin: &AuthUser, role: &UserRole) -> ApiResult<()> {
    if id == admin.id && !role.is_admin() {
        return Err(ApiError::validation("You cannot remove your own admin role"));
    }
    Ok(())
}

/// GET /api/v1/auth/users (moderator or admin)
pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/v1/auth/users/{id} (admin)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(parse_user_id(&id)?)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user.into()))
}

/// PUT /api/v1/auth/users/{id}/role (admin)
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_user_id(&id)?;
    let role = parse_role(&body.role)?;
    check_not_self_demotion(id, &admin, &role)?;

    let updated = state
        .users
        .set_role(id, role)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    tracing::info!(user_id = %updated.id, role = %updated.role, admin_id = %admin.id, "user role changed");
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/users/{id} (admin)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_user_id(&id)?;
    let role = body.role.as_deref().map(parse_role).transpose()?;
    if let Some(role) = &role {
        check_not_self_demotion(id, &admin, role)?;
    }

    let existing = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut changes = UserChanges::default();
    if let Some(name) = body.name.as_deref() {
        changes.name = Some(validate_name(name)?);
    }
    if let Some(email) = body.email.as_deref() {
        let email = validate_email(email)?;
        if email != existing.email {
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(ApiError::Conflict("Email already in use".to_string()));
            }
            changes.email = Some(email);
        }
    }

    let mut updated = state
        .users
        .update(id, changes)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    if let Some(role) = role.filter(|r| *r != updated.role) {
        updated = state
            .users
            .set_role(id, role)
            .await?
            .ok_or(ApiError::NotFound("User"))?;
    }

    tracing::info!(user_id = %updated.id, admin_id = %admin.id, "user updated by admin");
    Ok(Json(updated.into()))
}

/// DELETE /api/v1/auth/users/{id} (admin)
///
/// The user's tracks and their stored files go first, then the account.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_user_id(&id)?;
    if id == admin.id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }
    if state.users.find_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    let removed_tracks = state.tracks.remove_all_for_owner(id).await?;
    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound("User"));
    }

    tracing::info!(user_id = %id, admin_id = %admin.id, removed_tracks, "user deleted");
    Ok(Json(MessageResponse {
        message: "User removed".to_string(),
    }))
}
