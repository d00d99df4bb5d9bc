use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Venues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Venues::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Venues::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Venues::City).string_len(120).not_null())
                    .col(ColumnDef::new(Venues::State).string_len(120).not_null())
                    .col(ColumnDef::new(Venues::Address).string_len(120).not_null())
                    .col(
                        ColumnDef::new(Venues::Phone)
                            .string_len(120)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Venues::Genres).json_binary().not_null())
                    .col(ColumnDef::new(Venues::ImageLink).string_len(500).null())
                    .col(ColumnDef::new(Venues::Website).string_len(500).null())
                    .col(ColumnDef::new(Venues::FacebookLink).string_len(120).null())
                    .col(
                        ColumnDef::new(Venues::SeekingTalent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Venues::SeekingDescription).text().null())
                    .col(
                        ColumnDef::new(Venues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_venues_name")
                    .table(Venues::Table)
                    .col(Venues::Name)
                    .to_owned(),
            )
            .await?;

        // Locale grouping reads by (city, state)
        manager
            .create_index(
                Index::create()
                    .name("idx_venues_city_state")
                    .table(Venues::Table)
                    .col(Venues::City)
                    .col(Venues::State)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Venues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Venues {
    Table,
    Id,
    Name,
    City,
    State,
    Address,
    Phone,
    Genres,
    ImageLink,
    Website,
    FacebookLink,
    SeekingTalent,
    SeekingDescription,
    CreatedAt,
}
