use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_users::Users;
use super::m20240601_000002_create_tracks::Tracks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TrackLikes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TrackLikes::TrackId).uuid().not_null())
                    .col(ColumnDef::new(TrackLikes::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(TrackLikes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(TrackLikes::TrackId)
                            .col(TrackLikes::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_track_likes_track_id")
                            .from(TrackLikes::Table, TrackLikes::TrackId)
                            .to(Tracks::Table, Tracks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_track_likes_user_id")
                            .from(TrackLikes::Table, TrackLikes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_track_likes_user_id")
                    .table(TrackLikes::Table)
                    .col(TrackLikes::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackLikes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TrackLikes {
    Table,
    TrackId,
    UserId,
    CreatedAt,
}
