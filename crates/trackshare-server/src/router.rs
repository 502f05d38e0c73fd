use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::auth;
use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// HTTP-level settings that do not belong in [`AppState`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub cors_origins: Vec<String>,
    /// Per-IP rate limiting on the public auth routes. Needs the server to
    /// be started with connect info.
    pub auth_rate_limit: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            auth_rate_limit: true,
        }
    }
}

impl From<&ServerConfig> for RouterOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            cors_origins: config.cors_origins.clone(),
            auth_rate_limit: config.auth_rate_limit,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if origins.is_empty() {
        // No cross-origin access at all.
        tracing::warn!("CORS_ORIGINS not set, cross-origin requests will be refused");
        return CorsLayer::new().allow_methods(methods);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    tracing::info!("CORS allowed origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn auth_routes(state: &Arc<AppState>, options: &RouterOptions) -> Router<Arc<AppState>> {
    let mut public = Router::new()
        .route("/register", post(auth::routes::register))
        .route("/login", post(auth::routes::login))
        .route("/refresh", post(auth::routes::refresh));

    if options.auth_rate_limit {
        // 10 request burst, one token back every 6 seconds, per client IP.
        match GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
        {
            Some(conf) => public = public.layer(GovernorLayer::new(Arc::new(conf))),
            None => tracing::error!("invalid rate limiter configuration, auth routes are not rate limited"),
        }
    }

    let profile = Router::new()
        .route(
            "/profile",
            get(auth::routes::get_profile).put(auth::routes::update_profile),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let moderation = Router::new()
        .route("/users", get(api::users::list_users))
        .layer(axum_middleware::from_fn(auth::middleware::require_moderator))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let admin = Router::new()
        .route(
            "/users/{id}",
            get(api::users::get_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/users/{id}/role", put(api::users::update_user_role))
        .layer(axum_middleware::from_fn(auth::middleware::require_admin))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    public.merge(profile).merge(moderation).merge(admin)
}

fn music_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/music", get(api::music::list_music))
        .merge(
            Router::new()
                .route("/music/{id}", get(api::music::get_music))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    auth::middleware::attach_identity,
                )),
        );

    let protected = Router::new()
        .merge(
            Router::new()
                .route("/music", post(api::music::create_music))
                .route("/music/{id}", put(api::music::update_music))
                .layer(DefaultBodyLimit::max(state.upload_limits.body_limit())),
        )
        .route("/music/user/mymusic", get(api::music::my_music))
        .route("/music/mymusic", get(api::music::my_music))
        .route(
            "/music/{id}",
            axum::routing::delete(api::music::delete_music),
        )
        .route("/music/{id}/publish", put(api::music::publish_music))
        .route("/music/{id}/like", put(api::music::toggle_like))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let admin = Router::new()
        .route("/music/admin/all", get(api::music::list_all_music))
        .route("/music/admin", get(api::music::list_all_music))
        .layer(axum_middleware::from_fn(auth::middleware::require_admin))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    public.merge(protected).merge(admin)
}

/// Assemble the full application: JSON API under `/api/v1`, stored assets
/// under `/uploads`, plus tracing, CORS and security headers.
pub fn build_router(state: Arc<AppState>, options: &RouterOptions) -> Router {
    let api_routes = Router::new()
        .nest("/auth", auth_routes(&state, options))
        .merge(music_routes(&state));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/uploads/{kind}/{name}", get(api::media::serve_asset))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&options.cors_origins))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}
