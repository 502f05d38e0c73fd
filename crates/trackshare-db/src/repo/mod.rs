//! Persistence seams used by the HTTP layer.
//!
//! Both traits have a Postgres implementation backed by sea-orm and an
//! in-memory one used by tests and local experiments.

use async_trait::async_trait;
use sea_orm::{prelude::DateTimeWithTimeZone, DbErr};
use uuid::Uuid;

use crate::entities::track::{self, TrackStatus};
use crate::entities::user::{self, UserRole};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryTrackRepository, MemoryUserRepository};
pub use postgres::{SeaOrmTrackRepository, SeaOrmUserRepository};

/// A track together with the ids of the users who liked it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub track: track::Model,
    pub likes: Vec<Uuid>,
}

impl TrackRecord {
    pub fn like_count(&self) -> u64 {
        self.likes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct NewTrack {
    pub title: String,
    pub description: Option<String>,
    pub audio_file: String,
    pub background_image: String,
    pub owner_id: Uuid,
    pub genre: Option<String>,
    pub status: TrackStatus,
    pub published_at: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackOrder {
    #[default]
    NewestCreated,
    NewestPublished,
}

/// Filter, ordering and 1-based pagination for track listings.
#[derive(Debug, Clone, Default)]
pub struct TrackQuery {
    pub status: Option<TrackStatus>,
    pub owner_id: Option<Uuid>,
    pub genre: Option<String>,
    /// Full-text search over title and description.
    pub search: Option<String>,
    pub order: TrackOrder,
    pub page: u64,
    pub limit: u64,
}

impl TrackQuery {
    pub(crate) fn page_index(&self) -> u64 {
        self.page.max(1) - 1
    }

    pub(crate) fn page_size(&self) -> u64 {
        self.limit.max(1)
    }

    pub(crate) fn search_terms(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct TrackPage {
    pub items: Vec<TrackRecord>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    /// `true` when the call added a like, `false` when it removed one.
    pub liked: bool,
    pub like_count: u64,
}

#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn insert(&self, new: NewTrack) -> Result<TrackRecord, DbErr>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackRecord>, DbErr>;

    /// Persist the editable fields of `track` (title, description, genre,
    /// assets, status, published_at). Owner, plays and likes are untouched.
    async fn save(&self, track: &track::Model) -> Result<TrackRecord, DbErr>;

    /// Atomically add one play. Returns `false` if the track does not exist.
    async fn increment_plays(&self, id: Uuid) -> Result<bool, DbErr>;

    /// Remove `user_id`'s like if present, add it otherwise.
    async fn toggle_like(&self, track_id: Uuid, user_id: Uuid) -> Result<LikeToggle, DbErr>;

    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, DbErr>;

    async fn list(&self, query: &TrackQuery) -> Result<TrackPage, DbErr>;

    /// All tracks of one owner, newest first.
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<TrackStatus>,
    ) -> Result<Vec<TrackRecord>, DbErr>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, new: NewUser) -> Result<user::Model, DbErr>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, DbErr>;

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr>;

    /// Users with the given ids, in no particular order. Unknown ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<user::Model>, DbErr>;

    async fn count(&self) -> Result<u64, DbErr>;

    async fn list(&self) -> Result<Vec<user::Model>, DbErr>;

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, DbErr>;

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<Option<user::Model>, DbErr>;

    /// Returns `false` if nothing was deleted. Tracks and likes go with the
    /// user through the foreign key cascade.
    async fn delete(&self, id: Uuid) -> Result<bool, DbErr>;
}
