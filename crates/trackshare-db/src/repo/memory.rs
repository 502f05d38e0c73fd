use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DbErr;
use std::cmp::Reverse;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    LikeToggle, NewTrack, NewUser, TrackOrder, TrackPage, TrackQuery, TrackRecord,
    TrackRepository, UserChanges, UserRepository,
};
use crate::entities::track::{self, TrackStatus};
use crate::entities::user::{self, UserRole};

/// Track store kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryTrackRepository {
    tracks: RwLock<Vec<TrackRecord>>,
}

impl MemoryTrackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tracks.read().await.is_empty()
    }
}

fn matches_search(track: &track::Model, terms: &str) -> bool {
    let haystack = format!(
        "{} {}",
        track.title,
        track.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    terms
        .split_whitespace()
        .all(|term| haystack.contains(&term.to_lowercase()))
}

fn matches_query(track: &track::Model, query: &TrackQuery) -> bool {
    if query.status.is_some_and(|s| s != track.status) {
        return false;
    }
    if query.owner_id.is_some_and(|o| o != track.owner_id) {
        return false;
    }
    if let Some(genre) = &query.genre {
        if track.genre.as_deref() != Some(genre.as_str()) {
            return false;
        }
    }
    match query.search_terms() {
        Some(terms) => matches_search(track, terms),
        None => true,
    }
}

#[async_trait]
impl TrackRepository for MemoryTrackRepository {
    async fn insert(&self, new: NewTrack) -> Result<TrackRecord, DbErr> {
        let now = Utc::now().fixed_offset();
        let record = TrackRecord {
            track: track::Model {
                id: Uuid::new_v4(),
                title: new.title,
                description: new.description,
                audio_file: new.audio_file,
                background_image: new.background_image,
                owner_id: new.owner_id,
                genre: new.genre,
                status: new.status,
                published_at: new.published_at,
                plays: 0,
                created_at: now,
                updated_at: now,
            },
            likes: Vec::new(),
        };

        self.tracks.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackRecord>, DbErr> {
        let tracks = self.tracks.read().await;
        Ok(tracks.iter().find(|r| r.track.id == id).cloned())
    }

    async fn save(&self, track: &track::Model) -> Result<TrackRecord, DbErr> {
        let mut tracks = self.tracks.write().await;
        let record = tracks
            .iter_mut()
            .find(|r| r.track.id == track.id)
            .ok_or(DbErr::RecordNotUpdated)?;

        let stored = &mut record.track;
        stored.title = track.title.clone();
        stored.description = track.description.clone();
        stored.audio_file = track.audio_file.clone();
        stored.background_image = track.background_image.clone();
        stored.genre = track.genre.clone();
        stored.status = track.status;
        stored.published_at = track.published_at;
        stored.updated_at = Utc::now().fixed_offset();

        Ok(record.clone())
    }

    async fn increment_plays(&self, id: Uuid) -> Result<bool, DbErr> {
        let mut tracks = self.tracks.write().await;
        match tracks.iter_mut().find(|r| r.track.id == id) {
            Some(record) => {
                record.track.plays += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn toggle_like(&self, track_id: Uuid, user_id: Uuid) -> Result<LikeToggle, DbErr> {
        let mut tracks = self.tracks.write().await;
        let record = tracks
            .iter_mut()
            .find(|r| r.track.id == track_id)
            .ok_or_else(|| DbErr::RecordNotFound(format!("track {track_id}")))?;

        let liked = match record.likes.iter().position(|u| *u == user_id) {
            Some(index) => {
                record.likes.remove(index);
                false
            }
            None => {
                record.likes.push(user_id);
                true
            }
        };

        Ok(LikeToggle {
            liked,
            like_count: record.likes.len() as u64,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let mut tracks = self.tracks.write().await;
        let before = tracks.len();
        tracks.retain(|r| r.track.id != id);
        Ok(tracks.len() != before)
    }

    async fn list(&self, query: &TrackQuery) -> Result<TrackPage, DbErr> {
        let tracks = self.tracks.read().await;

        // Newest insertion first so the stable sort breaks ties the same way.
        let mut matching: Vec<&TrackRecord> = tracks
            .iter()
            .rev()
            .filter(|r| matches_query(&r.track, query))
            .collect();

        match query.order {
            TrackOrder::NewestPublished => {
                matching.sort_by_key(|r| Reverse((r.track.published_at, r.track.created_at)))
            }
            TrackOrder::NewestCreated => matching.sort_by_key(|r| Reverse(r.track.created_at)),
        }

        let total = matching.len() as u64;
        let size = query.page_size() as usize;
        let items = matching
            .into_iter()
            .skip(query.page_index() as usize * size)
            .take(size)
            .cloned()
            .collect();

        Ok(TrackPage { items, total })
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<TrackStatus>,
    ) -> Result<Vec<TrackRecord>, DbErr> {
        let tracks = self.tracks.read().await;
        let mut owned: Vec<TrackRecord> = tracks
            .iter()
            .rev()
            .filter(|r| r.track.owner_id == owner_id)
            .filter(|r| status.is_none_or(|s| s == r.track.status))
            .cloned()
            .collect();
        owned.sort_by_key(|r| Reverse(r.track.created_at));
        Ok(owned)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<Vec<user::Model>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, new: NewUser) -> Result<user::Model, DbErr> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(DbErr::Custom(format!(
                "duplicate key value violates unique constraint on email {}",
                new.email
            )));
        }

        let now = Utc::now().fixed_offset();
        let model = user::Model {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        users.push(model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, DbErr> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<user::Model>, DbErr> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, DbErr> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn list(&self) -> Result<Vec<user::Model>, DbErr> {
        Ok(self.users.read().await.clone())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, DbErr> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(DbErr::Custom(format!(
                    "duplicate key value violates unique constraint on email {email}"
                )));
            }
        }

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now().fixed_offset();
        Ok(Some(user.clone()))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<Option<user::Model>, DbErr> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.role = role;
        user.updated_at = Utc::now().fixed_offset();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}
