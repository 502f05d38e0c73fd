//! Multipart intake for track create / update requests.
//!
//! Every file field is checked against its MIME allow-list, its size ceiling
//! and its content signature before anything is written. Only when the whole
//! request is acceptable are the files stored; the handler then receives a
//! [`TrackInput`] carrying the stored asset names.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use trackshare_db::entities::track::TrackStatus;
use trackshare_storage::{AssetKind, StorageBackend};

use crate::config::UploadLimits;
use crate::error::ApiError;
use crate::tracks::TrackInput;

pub const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/ogg",
    "audio/flac",
    "audio/x-flac",
    "audio/aac",
    "audio/mp4",
    "audio/x-m4a",
];

pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Extension used when the client filename does not carry one.
fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "",
    }
}

fn asset_kind_for_field(name: &str) -> Option<AssetKind> {
    match name {
        "audio_file" | "audioFile" => Some(AssetKind::Audio),
        "cover_image" | "backgroundImage" | "background_image" => Some(AssetKind::Image),
        _ => None,
    }
}

/// Recognised audio containers: MP3 (ID3 or frame sync), FLAC, Ogg, WAV,
/// AIFF, MP4/M4A (`ftyp` box) and raw ADTS AAC.
pub fn looks_like_audio(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    data.starts_with(b"ID3")
        || (data[0] == 0xFF && (data[1] & 0xE0) == 0xE0)
        || data.starts_with(b"fLaC")
        || data.starts_with(b"OggS")
        || (data.starts_with(b"RIFF") && &data[8..12] == b"WAVE")
        || (data.starts_with(b"FORM") && &data[8..12] == b"AIFF")
        || &data[4..8] == b"ftyp"
}

/// JPEG, PNG or WebP.
pub fn looks_like_image(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
        || (data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP")
}

fn label(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Audio => "Audio",
        AssetKind::Image => "Image",
    }
}

fn malformed(e: MultipartError) -> ApiError {
    ApiError::Upload(format!("Malformed multipart body: {}", e.body_text()))
}

struct PendingFile {
    kind: AssetKind,
    original_name: String,
    fallback_ext: &'static str,
    data: Vec<u8>,
}

/// Read one file field, enforcing the MIME allow-list and size ceiling while
/// streaming. Returns `None` for an empty part (a form with no file chosen).
async fn read_file_field(
    mut field: Field<'_>,
    kind: AssetKind,
    limits: &UploadLimits,
) -> Result<Option<PendingFile>, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let mime = field
        .content_type()
        .map(|m| m.to_ascii_lowercase())
        .unwrap_or_default();

    let allowed = match kind {
        AssetKind::Audio => AUDIO_MIME_TYPES,
        AssetKind::Image => IMAGE_MIME_TYPES,
    };

    let max = limits.max_for(kind);
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if data.len() + chunk.len() > max {
            return Err(ApiError::Upload(format!(
                "{} file exceeds the {} MB limit",
                label(kind),
                max / (1024 * 1024)
            )));
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() && original_name.is_empty() {
        return Ok(None);
    }

    if !allowed.contains(&mime.as_str()) {
        return Err(ApiError::Upload(format!(
            "Unsupported {} type: {}",
            label(kind).to_lowercase(),
            if mime.is_empty() { "unknown" } else { mime.as_str() }
        )));
    }

    let recognised = match kind {
        AssetKind::Audio => looks_like_audio(&data),
        AssetKind::Image => looks_like_image(&data),
    };
    if !recognised {
        return Err(ApiError::Upload(format!(
            "File content does not match a recognized {} format",
            label(kind).to_lowercase()
        )));
    }

    Ok(Some(PendingFile {
        kind,
        fallback_ext: extension_for_mime(&mime),
        original_name,
        data,
    }))
}

fn parse_is_public(value: &str) -> Result<TrackStatus, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(TrackStatus::Published),
        "false" | "0" | "off" | "no" | "" => Ok(TrackStatus::Draft),
        other => Err(ApiError::validation(format!("Invalid is_public value: {other}"))),
    }
}

/// Best-effort removal of assets stored for a request that did not go through.
pub async fn discard_assets(storage: &dyn StorageBackend, assets: &[(AssetKind, String)]) {
    for (kind, name) in assets {
        if let Err(e) = storage.delete(*kind, name).await {
            tracing::warn!(%kind, name = %name, error = %e, "failed to remove orphaned upload");
        }
    }
}

/// Consume a track multipart body and store its files.
pub async fn receive_track_upload(
    storage: &dyn StorageBackend,
    limits: &UploadLimits,
    mut multipart: Multipart,
) -> Result<TrackInput, ApiError> {
    let mut input = TrackInput::default();
    let mut is_public: Option<String> = None;
    let mut audio: Option<PendingFile> = None;
    let mut image: Option<PendingFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(kind) = asset_kind_for_field(&name) {
            let slot = match kind {
                AssetKind::Audio => &mut audio,
                AssetKind::Image => &mut image,
            };
            if slot.is_some() {
                return Err(ApiError::Upload(format!(
                    "Only one {} file is allowed",
                    label(kind).to_lowercase()
                )));
            }
            *slot = read_file_field(field, kind, limits).await?;
            continue;
        }

        match name.as_str() {
            "title" => input.title = Some(field.text().await.map_err(malformed)?),
            "description" => input.description = Some(field.text().await.map_err(malformed)?),
            "genre" => input.genre = Some(field.text().await.map_err(malformed)?),
            "status" => {
                let value = field.text().await.map_err(malformed)?;
                let value = value.trim();
                if !value.is_empty() {
                    input.status = Some(value.parse::<TrackStatus>().map_err(|_| {
                        ApiError::validation("Status must be 'draft' or 'published'")
                    })?);
                }
            }
            "is_public" => is_public = Some(field.text().await.map_err(malformed)?),
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    // `status` is canonical; `is_public` only fills in when it is absent.
    if input.status.is_none() {
        if let Some(flag) = is_public.as_deref() {
            input.status = Some(parse_is_public(flag)?);
        }
    }

    let mut stored: Vec<(AssetKind, String)> = Vec::new();
    for file in [audio, image].into_iter().flatten() {
        match storage
            .put(file.kind, &file.original_name, file.fallback_ext, &file.data)
            .await
        {
            Ok(name) => {
                tracing::debug!(kind = %file.kind, name = %name, bytes = file.data.len(), "stored upload");
                stored.push((file.kind, name));
            }
            Err(e) => {
                discard_assets(storage, &stored).await;
                return Err(e.into());
            }
        }
    }

    for (kind, name) in stored {
        match kind {
            AssetKind::Audio => input.audio_file = Some(name),
            AssetKind::Image => input.background_image = Some(name),
        }
    }

    Ok(input)
}
