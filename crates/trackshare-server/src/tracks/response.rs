use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use trackshare_db::entities::track::TrackStatus;
use trackshare_db::TrackRecord;
use uuid::Uuid;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Who uploaded a track. `email` is only filled in on detail and admin views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackOwner {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub audio_file: String,
    pub background_image: String,
    pub owner_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<TrackOwner>,
    pub genre: Option<String>,
    pub status: TrackStatus,
    /// Derived from `status`.
    pub is_public: bool,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub play_count: i64,
    pub like_count: u64,
    pub likes: Vec<Uuid>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<TrackRecord> for TrackResponse {
    fn from(record: TrackRecord) -> Self {
        let like_count = record.like_count();
        let t = record.track;
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            audio_file: t.audio_file,
            background_image: t.background_image,
            owner_id: t.owner_id,
            owner: None,
            genre: t.genre,
            is_public: t.status.is_published(),
            status: t.status,
            published_at: t.published_at,
            play_count: t.plays,
            like_count,
            likes: record.likes,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Validated 1-based paging. Anything unparsable or non-positive falls back
/// to the defaults and `limit` is capped at [`MAX_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn positive(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

impl PageRequest {
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(request.limit),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: String,
    pub action: &'static str,
    pub like_count: u64,
}
