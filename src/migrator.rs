use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_keywords_table::Migration),
            Box::new(m20240101_000003_create_order_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Categories::Name).string_len(50).not_null())
                        .col(ColumnDef::new(Categories::ParentId).integer().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_categories_parent")
                                .from(Categories::Table, Categories::ParentId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_parent_id")
                        .table(Categories::Table)
                        .col(Categories::ParentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Channels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Channels::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Channels::GroupId).integer().not_null())
                        .col(ColumnDef::new(Channels::CategoryId).integer().not_null())
                        .col(ColumnDef::new(Channels::Url).string_len(50).not_null())
                        .col(
                            ColumnDef::new(Channels::Sequence)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_channels_category")
                                .from(Channels::Table, Channels::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_channels_category_id")
                        .table(Channels::Table)
                        .col(Channels::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Skus::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Skus::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Skus::Name).string_len(200).not_null())
                        .col(ColumnDef::new(Skus::Caption).string_len(100).null())
                        .col(ColumnDef::new(Skus::CategoryId).integer().not_null())
                        .col(ColumnDef::new(Skus::Price).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Skus::CostPrice).decimal_len(10, 2).not_null())
                        .col(
                            ColumnDef::new(Skus::MarketPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Skus::Stock).integer().not_null().default(0))
                        .col(ColumnDef::new(Skus::Sales).integer().not_null().default(0))
                        .col(ColumnDef::new(Skus::Comments).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Skus::IsLaunched)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Skus::DefaultImageUrl).string_len(200).null())
                        .col(ColumnDef::new(Skus::Author).string_len(200).null())
                        .col(ColumnDef::new(Skus::DescDetail).text().null())
                        .col(ColumnDef::new(Skus::DescService).text().null())
                        .col(ColumnDef::new(Skus::CreateTime).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Skus::UpdateTime).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_skus_category")
                                .from(Skus::Table, Skus::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_skus_category_launched")
                        .table(Skus::Table)
                        .col(Skus::CategoryId)
                        .col(Skus::IsLaunched)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_skus_name")
                        .table(Skus::Table)
                        .col(Skus::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Skus::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Channels::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Categories {
        Table,
        Id,
        Name,
        ParentId,
    }

    #[derive(DeriveIden)]
    enum Channels {
        Table,
        Id,
        GroupId,
        CategoryId,
        Url,
        Sequence,
    }

    #[derive(DeriveIden)]
    enum Skus {
        Table,
        Id,
        Name,
        Caption,
        CategoryId,
        Price,
        CostPrice,
        MarketPrice,
        Stock,
        Sales,
        Comments,
        IsLaunched,
        DefaultImageUrl,
        Author,
        DescDetail,
        DescService,
        CreateTime,
        UpdateTime,
    }
}

mod m20240101_000002_create_keywords_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_keywords_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Keywords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Keywords::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Keywords::Name).string_len(50).not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Keywords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Keywords {
        Table,
        Id,
        Name,
    }
}

mod m20240101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderInfo::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderInfo::OrderId)
                                .string_len(64)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderInfo::UserId).integer().not_null())
                        .col(ColumnDef::new(OrderInfo::TotalCount).integer().not_null().default(1))
                        .col(
                            ColumnDef::new(OrderInfo::TotalAmount)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderInfo::Freight).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(OrderInfo::PayMethod).integer().not_null())
                        .col(ColumnDef::new(OrderInfo::Status).integer().not_null())
                        .col(
                            ColumnDef::new(OrderInfo::CreateTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_info_user_id")
                        .table(OrderInfo::Table)
                        .col(OrderInfo::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Payments::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Payments::OrderId).string_len(64).not_null())
                        .col(ColumnDef::new(Payments::TradeId).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Payments::CreateTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Provider trade numbers are the idempotency key for payment callbacks
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_trade_id")
                        .table(Payments::Table)
                        .col(Payments::TradeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_order_id")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderInfo::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderInfo {
        Table,
        OrderId,
        UserId,
        TotalCount,
        TotalAmount,
        Freight,
        PayMethod,
        Status,
        CreateTime,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        TradeId,
        CreateTime,
    }
}
