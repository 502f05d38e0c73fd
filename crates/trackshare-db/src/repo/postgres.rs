use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    LikeToggle, NewTrack, NewUser, TrackOrder, TrackPage, TrackQuery, TrackRecord,
    TrackRepository, UserChanges, UserRepository,
};
use crate::entities::track::{self, TrackStatus};
use crate::entities::track_like;
use crate::entities::user::{self, UserRole};

/// Matches the `idx_tracks_fts` expression index created by the migrations.
const SEARCH_CONDITION: &str = "to_tsvector('english', coalesce(title, '') || ' ' || coalesce(description, '')) @@ plainto_tsquery('english', $1)";

#[derive(Debug, Clone)]
pub struct SeaOrmTrackRepository {
    db: DatabaseConnection,
}

impl SeaOrmTrackRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn likes_for(&self, track_ids: Vec<Uuid>) -> Result<HashMap<Uuid, Vec<Uuid>>, DbErr> {
        let mut likes: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if track_ids.is_empty() {
            return Ok(likes);
        }

        let rows = track_like::Entity::find()
            .filter(track_like::Column::TrackId.is_in(track_ids))
            .order_by_asc(track_like::Column::CreatedAt)
            .all(&self.db)
            .await?;

        for row in rows {
            likes.entry(row.track_id).or_default().push(row.user_id);
        }
        Ok(likes)
    }

    async fn with_likes(&self, tracks: Vec<track::Model>) -> Result<Vec<TrackRecord>, DbErr> {
        let mut likes = self
            .likes_for(tracks.iter().map(|t| t.id).collect())
            .await?;

        Ok(tracks
            .into_iter()
            .map(|track| {
                let likes = likes.remove(&track.id).unwrap_or_default();
                TrackRecord { track, likes }
            })
            .collect())
    }
}

#[async_trait]
impl TrackRepository for SeaOrmTrackRepository {
    async fn insert(&self, new: NewTrack) -> Result<TrackRecord, DbErr> {
        let now = Utc::now().fixed_offset();
        let model = track::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            description: Set(new.description),
            audio_file: Set(new.audio_file),
            background_image: Set(new.background_image),
            owner_id: Set(new.owner_id),
            genre: Set(new.genre),
            status: Set(new.status),
            published_at: Set(new.published_at),
            plays: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(TrackRecord {
            track: model,
            likes: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackRecord>, DbErr> {
        let Some(model) = track::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        Ok(self.with_likes(vec![model]).await?.pop())
    }

    async fn save(&self, track: &track::Model) -> Result<TrackRecord, DbErr> {
        let active = track::ActiveModel {
            id: ActiveValue::Unchanged(track.id),
            title: Set(track.title.clone()),
            description: Set(track.description.clone()),
            audio_file: Set(track.audio_file.clone()),
            background_image: Set(track.background_image.clone()),
            genre: Set(track.genre.clone()),
            status: Set(track.status),
            published_at: Set(track.published_at),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };

        let updated = active.update(&self.db).await?;
        let mut records = self.with_likes(vec![updated]).await?;
        records
            .pop()
            .ok_or_else(|| DbErr::RecordNotFound(format!("track {}", track.id)))
    }

    async fn increment_plays(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = track::Entity::update_many()
            .col_expr(track::Column::Plays, Expr::col(track::Column::Plays).add(1))
            .filter(track::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn toggle_like(&self, track_id: Uuid, user_id: Uuid) -> Result<LikeToggle, DbErr> {
        let removed = track_like::Entity::delete_many()
            .filter(track_like::Column::TrackId.eq(track_id))
            .filter(track_like::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        let liked = if removed.rows_affected > 0 {
            false
        } else {
            let entry = track_like::ActiveModel {
                track_id: Set(track_id),
                user_id: Set(user_id),
                created_at: Set(Utc::now().fixed_offset()),
            };
            track_like::Entity::insert(entry)
                .on_conflict(
                    OnConflict::columns([track_like::Column::TrackId, track_like::Column::UserId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?;
            true
        };

        let like_count = track_like::Entity::find()
            .filter(track_like::Column::TrackId.eq(track_id))
            .count(&self.db)
            .await?;

        Ok(LikeToggle { liked, like_count })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = track::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list(&self, query: &TrackQuery) -> Result<TrackPage, DbErr> {
        let mut select = track::Entity::find();

        if let Some(status) = query.status {
            select = select.filter(track::Column::Status.eq(status));
        }
        if let Some(owner_id) = query.owner_id {
            select = select.filter(track::Column::OwnerId.eq(owner_id));
        }
        if let Some(genre) = &query.genre {
            select = select.filter(track::Column::Genre.eq(genre.clone()));
        }
        if let Some(terms) = query.search_terms() {
            select = select.filter(Expr::cust_with_values(SEARCH_CONDITION, [terms]));
        }

        select = match query.order {
            TrackOrder::NewestPublished => select
                .order_by_desc(track::Column::PublishedAt)
                .order_by_desc(track::Column::CreatedAt),
            TrackOrder::NewestCreated => select.order_by_desc(track::Column::CreatedAt),
        };

        let paginator = select.paginate(&self.db, query.page_size());
        let total = paginator.num_items().await?;
        let tracks = paginator.fetch_page(query.page_index()).await?;

        Ok(TrackPage {
            items: self.with_likes(tracks).await?,
            total,
        })
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<TrackStatus>,
    ) -> Result<Vec<TrackRecord>, DbErr> {
        let mut select = track::Entity::find().filter(track::Column::OwnerId.eq(owner_id));
        if let Some(status) = status {
            select = select.filter(track::Column::Status.eq(status));
        }

        let tracks = select
            .order_by_desc(track::Column::CreatedAt)
            .all(&self.db)
            .await?;
        self.with_likes(tracks).await
    }
}

#[derive(Debug, Clone)]
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn insert(&self, new: NewUser) -> Result<user::Model, DbErr> {
        let now = Utc::now().fixed_offset();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            password_hash: Set(new.password_hash),
            role: Set(new.role),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find_by_id(id).one(&self.db).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<user::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
    }

    async fn count(&self) -> Result<u64, DbErr> {
        user::Entity::find().count(&self.db).await
    }

    async fn list(&self) -> Result<Vec<user::Model>, DbErr> {
        user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, DbErr> {
        let Some(existing) = user::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(Utc::now().fixed_offset());

        active.update(&self.db).await.map(Some)
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<Option<user::Model>, DbErr> {
        let Some(existing) = user::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: user::ActiveModel = existing.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now().fixed_offset());

        active.update(&self.db).await.map(Some)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = user::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
