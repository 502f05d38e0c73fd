use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE TYPE track_status AS ENUM ('draft', 'published')")
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tracks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tracks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tracks::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Tracks::Description).text().null())
                    .col(ColumnDef::new(Tracks::AudioFile).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Tracks::BackgroundImage)
                            .string_len(512)
                            .not_null()
                            .default("default-music-background.jpg"),
                    )
                    .col(ColumnDef::new(Tracks::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Tracks::Genre).string_len(128).null())
                    .col(
                        ColumnDef::new(Tracks::Status)
                            .custom(Alias::new("track_status"))
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Tracks::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::Plays)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Tracks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tracks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracks_owner_id")
                            .from(Tracks::Table, Tracks::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_owner_id")
                    .table(Tracks::Table)
                    .col(Tracks::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Public listing filters on status and sorts by publication date.
        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_status_published_at")
                    .table(Tracks::Table)
                    .col(Tracks::Status)
                    .col(Tracks::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_genre")
                    .table(Tracks::Table)
                    .col(Tracks::Genre)
                    .to_owned(),
            )
            .await?;

        // Expression must match the search condition in the track repository.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX idx_tracks_fts ON tracks USING gin(to_tsvector('english', coalesce(title, '') || ' ' || coalesce(description, '')))",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tracks::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS track_status")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Tracks {
    Table,
    Id,
    Title,
    Description,
    AudioFile,
    BackgroundImage,
    OwnerId,
    Genre,
    Status,
    PublishedAt,
    Plays,
    CreatedAt,
    UpdatedAt,
}
