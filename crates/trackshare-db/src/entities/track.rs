use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Image reference every track starts with until a cover is uploaded.
/// It is not a stored asset and must never be deleted.
pub const DEFAULT_BACKGROUND_IMAGE: &str = "default-music-background.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "track_status")]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "published")]
    Published,
}

impl TrackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TrackStatus::Draft => "draft",
            TrackStatus::Published => "published",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, TrackStatus::Published)
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TrackStatus::Draft),
            "published" => Ok(TrackStatus::Published),
            other => Err(format!("unknown track status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub audio_file: String,
    pub background_image: String,
    pub owner_id: Uuid,
    pub genre: Option<String>,
    pub status: TrackStatus,
    pub published_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(default_value = "0")]
    pub plays: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::track_like::Entity")]
    TrackLike,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::track_like::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackLike.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
