use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use trackshare_db::entities::track::{self, TrackStatus, DEFAULT_BACKGROUND_IMAGE};
use trackshare_db::{
    LikeToggle, NewTrack, TrackOrder, TrackQuery, TrackRecord, TrackRepository, UserRepository,
};
use trackshare_storage::{AssetKind, StorageBackend};
use uuid::Uuid;

use super::response::{PageRequest, PaginatedResponse, TrackOwner, TrackResponse};
use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::upload::discard_assets;

/// Fields of a create or update request. Asset names refer to files the
/// upload handler has already stored.
#[derive(Debug, Clone, Default)]
pub struct TrackInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: Option<TrackStatus>,
    pub audio_file: Option<String>,
    pub background_image: Option<String>,
}

impl TrackInput {
    fn stored_assets(&self) -> Vec<(AssetKind, String)> {
        let mut assets = Vec::new();
        if let Some(name) = &self.audio_file {
            assets.push((AssetKind::Audio, name.clone()));
        }
        if let Some(name) = &self.background_image {
            assets.push((AssetKind::Image, name.clone()));
        }
        assets
    }
}

/// Column widths of `tracks.title` and `tracks.genre`, in characters.
pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_GENRE_CHARS: usize = 128;

fn check_lengths(title: Option<&str>, genre: Option<&str>) -> Result<(), ApiError> {
    if title.is_some_and(|t| t.chars().count() > MAX_TITLE_CHARS) {
        return Err(ApiError::Validation(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    if genre.is_some_and(|g| g.chars().count() > MAX_GENRE_CHARS) {
        return Err(ApiError::Validation(format!(
            "Genre must be at most {MAX_GENRE_CHARS} characters"
        )));
    }
    Ok(())
}

/// Which owner details a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFields {
    Name,
    /// Name and email.
    Contact,
}

/// Trimmed text, `None` when blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_track_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::InvalidIdentifier("music"))
}

/// Draft and published filters from a query string; anything else means
/// "no filter".
pub fn parse_status_filter(raw: Option<&str>) -> Option<TrackStatus> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// The track lifecycle: ownership, visibility and publication rules on top
/// of a [`TrackRepository`], with asset cleanup through [`StorageBackend`].
#[derive(Clone)]
pub struct TrackService {
    tracks: Arc<dyn TrackRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn StorageBackend>,
}

impl TrackService {
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            tracks,
            users,
            storage,
        }
    }

    async fn discard(&self, assets: &[(AssetKind, String)]) {
        discard_assets(self.storage.as_ref(), assets).await;
    }

    async fn remove_asset(&self, kind: AssetKind, name: &str, track_id: Uuid) {
        if kind == AssetKind::Image && name == DEFAULT_BACKGROUND_IMAGE {
            return;
        }
        if let Err(e) = self.storage.delete(kind, name).await {
            tracing::warn!(%track_id, %kind, name, error = %e, "failed to delete track asset");
        }
    }

    async fn remove_track_assets(&self, track: &track::Model) {
        self.remove_asset(AssetKind::Audio, &track.audio_file, track.id)
            .await;
        self.remove_asset(AssetKind::Image, &track.background_image, track.id)
            .await;
    }

    /// Owner summaries for a batch of records, one user lookup in total.
    async fn owners(
        &self,
        records: &[TrackRecord],
        fields: OwnerFields,
    ) -> Result<HashMap<Uuid, TrackOwner>, ApiError> {
        let mut ids: Vec<Uuid> = records.iter().map(|r| r.track.owner_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let users = self.users.find_many(&ids).await?;
        Ok(users
            .into_iter()
            .map(|u| {
                let owner = TrackOwner {
                    id: u.id,
                    name: u.name,
                    email: (fields == OwnerFields::Contact).then_some(u.email),
                };
                (u.id, owner)
            })
            .collect())
    }

    /// Turn records into responses with the owner attached. A track whose
    /// owner no longer exists is returned without one.
    pub async fn present(
        &self,
        records: Vec<TrackRecord>,
        fields: OwnerFields,
    ) -> Result<Vec<TrackResponse>, ApiError> {
        let owners = self.owners(&records, fields).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let owner = owners.get(&record.track.owner_id).cloned();
                TrackResponse {
                    owner,
                    ..TrackResponse::from(record)
                }
            })
            .collect())
    }

    pub async fn present_one(
        &self,
        record: TrackRecord,
        fields: OwnerFields,
    ) -> Result<TrackResponse, ApiError> {
        self.present(vec![record], fields)
            .await?
            .pop()
            .ok_or_else(|| ApiError::Internal("track response went missing".to_string()))
    }

    async fn load(&self, raw_id: &str) -> Result<TrackRecord, ApiError> {
        let id = parse_track_id(raw_id)?;
        self.tracks
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("Music"))
    }

    /// Load a track the actor is allowed to modify (owner or admin).
    async fn load_for_edit(&self, raw_id: &str, actor: &AuthUser) -> Result<TrackRecord, ApiError> {
        let record = self.load(raw_id).await?;
        if record.track.owner_id != actor.id && !actor.is_admin() {
            return Err(ApiError::forbidden("Not authorized"));
        }
        Ok(record)
    }

    pub async fn create(&self, owner: &AuthUser, input: TrackInput) -> Result<TrackRecord, ApiError> {
        let uploaded = input.stored_assets();

        let (Some(title), Some(audio_file)) = (non_blank(input.title), input.audio_file) else {
            self.discard(&uploaded).await;
            return Err(ApiError::validation("Title and audio file are required"));
        };
        let genre = non_blank(input.genre);
        if let Err(e) = check_lengths(Some(&title), genre.as_deref()) {
            self.discard(&uploaded).await;
            return Err(e);
        }

        let status = input.status.unwrap_or(TrackStatus::Draft);
        let new = NewTrack {
            title,
            description: non_blank(input.description),
            audio_file,
            background_image: input
                .background_image
                .unwrap_or_else(|| DEFAULT_BACKGROUND_IMAGE.to_string()),
            owner_id: owner.id,
            genre,
            status,
            published_at: status.is_published().then(|| Utc::now().fixed_offset()),
        };

        match self.tracks.insert(new).await {
            Ok(record) => {
                tracing::info!(
                    track_id = %record.track.id,
                    owner_id = %owner.id,
                    status = %record.track.status,
                    "track created"
                );
                Ok(record)
            }
            Err(e) => {
                self.discard(&uploaded).await;
                Err(e.into())
            }
        }
    }

    /// Published tracks only, newest publication first.
    pub async fn list_published(
        &self,
        page: PageRequest,
        search: Option<String>,
        genre: Option<String>,
    ) -> Result<PaginatedResponse<TrackResponse>, ApiError> {
        let query = TrackQuery {
            status: Some(TrackStatus::Published),
            genre: non_blank(genre),
            search: non_blank(search),
            order: TrackOrder::NewestPublished,
            page: page.page,
            limit: page.limit,
            ..Default::default()
        };
        let result = self.tracks.list(&query).await?;
        let data = self.present(result.items, OwnerFields::Name).await?;
        Ok(PaginatedResponse::new(data, result.total, page))
    }

    /// Fetch one track. Drafts are visible to their owner only; fetching a
    /// published track counts as a play.
    pub async fn get(&self, raw_id: &str, viewer: Option<&AuthUser>) -> Result<TrackRecord, ApiError> {
        let mut record = self.load(raw_id).await?;

        if !record.track.status.is_published() {
            if viewer.is_some_and(|v| v.id == record.track.owner_id) {
                return Ok(record);
            }
            return Err(ApiError::forbidden("Not authorized to access this draft"));
        }

        if self.tracks.increment_plays(record.track.id).await? {
            record.track.plays += 1;
        }
        Ok(record)
    }

    pub async fn list_mine(
        &self,
        owner: &AuthUser,
        status: Option<TrackStatus>,
    ) -> Result<Vec<TrackRecord>, ApiError> {
        Ok(self.tracks.list_by_owner(owner.id, status).await?)
    }

    pub async fn update(
        &self,
        raw_id: &str,
        actor: &AuthUser,
        input: TrackInput,
    ) -> Result<TrackRecord, ApiError> {
        let uploaded = input.stored_assets();
        let title = non_blank(input.title);
        let genre_given = input.genre.is_some();
        let genre = non_blank(input.genre);

        let checked = match check_lengths(title.as_deref(), genre.as_deref()) {
            Ok(()) => self.load_for_edit(raw_id, actor).await,
            Err(e) => Err(e),
        };
        let record = match checked {
            Ok(record) => record,
            Err(e) => {
                self.discard(&uploaded).await;
                return Err(e);
            }
        };

        let mut track: track::Model = record.track;
        let mut replaced: Vec<(AssetKind, String)> = Vec::new();

        if let Some(title) = title {
            track.title = title;
        }
        if input.description.is_some() {
            track.description = non_blank(input.description);
        }
        if genre_given {
            track.genre = genre;
        }
        if let Some(status) = input.status {
            match (track.status, status) {
                (TrackStatus::Draft, TrackStatus::Published) => {
                    track.published_at = Some(Utc::now().fixed_offset());
                }
                (TrackStatus::Published, TrackStatus::Draft) => track.published_at = None,
                _ => {}
            }
            track.status = status;
        }
        if let Some(audio_file) = input.audio_file {
            replaced.push((
                AssetKind::Audio,
                std::mem::replace(&mut track.audio_file, audio_file),
            ));
        }
        if let Some(image) = input.background_image {
            replaced.push((
                AssetKind::Image,
                std::mem::replace(&mut track.background_image, image),
            ));
        }

        let saved = match self.tracks.save(&track).await {
            Ok(saved) => saved,
            Err(e) => {
                self.discard(&uploaded).await;
                return Err(e.into());
            }
        };

        for (kind, name) in &replaced {
            self.remove_asset(*kind, name, saved.track.id).await;
        }

        tracing::info!(track_id = %saved.track.id, actor_id = %actor.id, "track updated");
        Ok(saved)
    }

    pub async fn publish(&self, raw_id: &str, actor: &AuthUser) -> Result<TrackRecord, ApiError> {
        let record = self.load_for_edit(raw_id, actor).await?;
        if record.track.status.is_published() {
            return Err(ApiError::AlreadyPublished);
        }

        let mut track = record.track;
        track.status = TrackStatus::Published;
        track.published_at = Some(Utc::now().fixed_offset());

        let saved = self.tracks.save(&track).await?;
        tracing::info!(track_id = %saved.track.id, actor_id = %actor.id, "track published");
        Ok(saved)
    }

    /// Delete a track and its stored assets. Asset removal is best-effort.
    pub async fn delete(&self, raw_id: &str, actor: &AuthUser) -> Result<(), ApiError> {
        let record = self.load_for_edit(raw_id, actor).await?;
        let track = &record.track;

        self.remove_track_assets(track).await;
        if !self.tracks.delete(track.id).await? {
            return Err(ApiError::NotFound("Music"));
        }

        tracing::info!(track_id = %track.id, actor_id = %actor.id, "track deleted");
        Ok(())
    }

    /// Delete every track of one owner along with the stored assets. Run
    /// before the owner's account is removed. Returns how many went.
    pub async fn remove_all_for_owner(&self, owner_id: Uuid) -> Result<usize, ApiError> {
        let records = self.tracks.list_by_owner(owner_id, None).await?;
        for record in &records {
            self.remove_track_assets(&record.track).await;
            self.tracks.delete(record.track.id).await?;
        }

        tracing::info!(%owner_id, count = records.len(), "owner tracks removed");
        Ok(records.len())
    }

    pub async fn toggle_like(&self, raw_id: &str, actor: &AuthUser) -> Result<LikeToggle, ApiError> {
        let record = self.load(raw_id).await?;
        if !record.track.status.is_published() {
            return Err(ApiError::InvalidState(
                "Cannot like unpublished music".to_string(),
            ));
        }

        let toggle = self.tracks.toggle_like(record.track.id, actor.id).await?;
        tracing::debug!(
            track_id = %record.track.id,
            user_id = %actor.id,
            liked = toggle.liked,
            "like toggled"
        );
        Ok(toggle)
    }

    /// Every track regardless of owner or status, newest first.
    pub async fn list_all(
        &self,
        page: PageRequest,
        status: Option<TrackStatus>,
        owner: Option<&str>,
    ) -> Result<PaginatedResponse<TrackResponse>, ApiError> {
        let owner_id = match owner.map(str::trim).filter(|o| !o.is_empty()) {
            Some(raw) => {
                Some(Uuid::parse_str(raw).map_err(|_| ApiError::InvalidIdentifier("user"))?)
            }
            None => None,
        };

        let query = TrackQuery {
            status,
            owner_id,
            order: TrackOrder::NewestCreated,
            page: page.page,
            limit: page.limit,
            ..Default::default()
        };
        let result = self.tracks.list(&query).await?;
        let data = self.present(result.items, OwnerFields::Contact).await?;
        Ok(PaginatedResponse::new(data, result.total, page))
    }
}
