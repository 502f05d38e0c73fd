use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::middleware::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::tracks::{
    parse_status_filter, LikeResponse, MessageResponse, OwnerFields, PageRequest,
    PaginatedResponse, TrackResponse,
};
use crate::upload::receive_track_upload;

/// Paging values arrive as raw text so that garbage falls back to the
/// defaults instead of failing the request.
#[derive(Debug, Deserialize, Default)]
pub struct ListMusicQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MyMusicQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AdminMusicQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// A body that is not `multipart/form-data` is an upload error like any other.
fn multipart_body(body: Result<Multipart, MultipartRejection>) -> ApiResult<Multipart> {
    body.map_err(|rejection| {
        ApiError::Upload(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    })
}

/// POST /api/v1/music
pub async fn create_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<TrackResponse>)> {
    let multipart = multipart_body(multipart)?;
    let input = receive_track_upload(state.storage.as_ref(), &state.upload_limits, multipart).await?;
    let record = state.tracks.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /api/v1/music
pub async fn list_music(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListMusicQuery>,
) -> ApiResult<Json<PaginatedResponse<TrackResponse>>> {
    let page = PageRequest::parse(params.page.as_deref(), params.limit.as_deref());
    let result = state
        .tracks
        .list_published(page, params.search, params.genre)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/music/{id}
pub async fn get_music(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TrackResponse>> {
    let record = state.tracks.get(&id, viewer.as_ref()).await?;
    let response = state
        .tracks
        .present_one(record, OwnerFields::Contact)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/music/user/mymusic
pub async fn my_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<MyMusicQuery>,
) -> ApiResult<Json<Vec<TrackResponse>>> {
    let status = parse_status_filter(params.status.as_deref());
    let records = state.tracks.list_mine(&user, status).await?;
    Ok(Json(records.into_iter().map(TrackResponse::from).collect()))
}

/// PUT /api/v1/music/{id}
pub async fn update_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<TrackResponse>> {
    let multipart = multipart_body(multipart)?;
    let input = receive_track_upload(state.storage.as_ref(), &state.upload_limits, multipart).await?;
    let record = state.tracks.update(&id, &user, input).await?;
    Ok(Json(record.into()))
}

/// PUT /api/v1/music/{id}/publish
pub async fn publish_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<TrackResponse>> {
    let record = state.tracks.publish(&id, &user).await?;
    Ok(Json(record.into()))
}

/// DELETE /api/v1/music/{id}
pub async fn delete_music(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.tracks.delete(&id, &user).await?;
    Ok(Json(MessageResponse {
        message: "Music deleted successfully".to_string(),
    }))
}

/// PUT /api/v1/music/{id}/like
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeResponse>> {
    let toggle = state.tracks.toggle_like(&id, &user).await?;
    let (message, action) = if toggle.liked {
        ("Music liked", "liked")
    } else {
        ("Music unliked", "unliked")
    };
    Ok(Json(LikeResponse {
        message: message.to_string(),
        action,
        like_count: toggle.like_count,
    }))
}

/// GET /api/v1/music/admin/all (admin)
pub async fn list_all_music(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminMusicQuery>,
) -> ApiResult<Json<PaginatedResponse<TrackResponse>>> {
    let page = PageRequest::parse(params.page.as_deref(), params.limit.as_deref());
    let status = parse_status_filter(params.status.as_deref());
    let owner = params.owner.or(params.user_id);
    let result = state.tracks.list_all(page, status, owner.as_deref()).await?;
    Ok(Json(result))
}
