use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::errors::ErrorKind;
use std::convert::Infallible;
use std::sync::Arc;
use trackshare_db::entities::user::{self, UserRole};
use uuid::Uuid;

use super::jwt::{validate_token, TokenType};
use crate::error::ApiError;
use crate::state::AppState;

/// Identity attached to the request once the bearer token has been verified
/// and the user looked up. The role is the stored one, not the token's.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&user::Model> for AuthUser {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// Extractor for routes where authentication is optional.
#[derive(Clone, Debug)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

async fn resolve_identity(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = validate_token(token, &state.jwt.secret).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::unauthenticated("Token expired"),
        _ => ApiError::unauthenticated("Invalid token"),
    })?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::unauthenticated("Invalid token"));
    }

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User not found"))?;

    Ok(AuthUser::from(&user))
}

/// Middleware: require a valid access token belonging to an existing user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::unauthenticated("Not authorized, no token"))?;
    let user = resolve_identity(&state, &token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Middleware: attach the identity when a valid token is present, let
/// anonymous requests through. A bad token is treated as anonymous.
pub async fn attach_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = bearer_token(&request) {
        match resolve_identity(&state, &token).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(ApiError::Database(e)) => return Err(ApiError::Database(e)),
            Err(_) => {}
        }
    }
    Ok(next.run(request).await)
}

fn current_user(request: &Request) -> Result<&AuthUser, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthenticated("Not authorized"))
}

/// Middleware: admin role required. Layer it inside [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    if !current_user(&request)?.is_admin() {
        return Err(ApiError::forbidden("Not authorized as admin"));
    }
    Ok(next.run(request).await)
}

/// Middleware: moderator or admin role required. Layer it inside [`require_auth`].
pub async fn require_moderator(request: Request, next: Next) -> Result<Response, ApiError> {
    if !current_user(&request)?.role.can_moderate() {
        return Err(ApiError::forbidden("Not authorized as moderator"));
    }
    Ok(next.run(request).await)
}
