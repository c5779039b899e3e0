use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // feeds 表：去重依赖 url 唯一约束，而不是 url_hash
        manager
            .create_table(
                Table::create()
                    .table(Feeds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Feeds::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Feeds::UrlHash).big_integer().not_null())
                    .col(ColumnDef::new(Feeds::Url).text().not_null().unique_key())
                    .col(ColumnDef::new(Feeds::OwnerUserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Feeds::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Feeds::State)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_feeds_url_hash")
                    .table(Feeds::Table)
                    .col(Feeds::UrlHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_feeds_owner_user_id")
                    .table(Feeds::Table)
                    .col(Feeds::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_feeds_owner_user_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_feeds_url_hash").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Feeds::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Feeds {
    Table,
    Id,
    UrlHash,
    Url,
    OwnerUserId,
    CreatedAt,
    State,
}
