use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use trackshare_storage::{content_type_for, is_safe_asset_name, AssetKind, StorageError};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /uploads/{kind}/{name}
///
/// Serves a stored asset. Stored names are unique and never rewritten, so
/// responses are cacheable forever.
pub async fn serve_asset(
    State(state): State<Arc<AppState>>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let kind: AssetKind = kind.parse().map_err(|_| ApiError::NotFound("File"))?;
    if !is_safe_asset_name(&name) {
        return Err(ApiError::validation("Invalid file name"));
    }

    let data = match state.storage.read(kind, &name).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_)) => return Err(ApiError::NotFound("File")),
        Err(StorageError::InvalidName(_)) => return Err(ApiError::validation("Invalid file name")),
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&name))),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=31536000, immutable"),
            ),
        ],
        data,
    )
        .into_response())
}
