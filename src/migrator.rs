use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_products_table::Migration),
            Box::new(m20240101_000003_create_orders_tables::Migration),
            Box::new(m20240101_000004_create_cod_tables::Migration),
            Box::new(m20240101_000005_create_returns_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Users {
        Table,
        Id,
        Name,
        Role,
        CreatedAt,
    }
}

mod m20240101_000002_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Stock).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Name,
        Sku,
        UnitPrice,
        Stock,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::ItemsSubtotal)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ShippingPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TaxPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::ShipName).string().not_null())
                        .col(ColumnDef::new(Orders::ShipPhone).string().not_null())
                        .col(ColumnDef::new(Orders::ShipStreet).string().not_null())
                        .col(ColumnDef::new(Orders::ShipCity).string().not_null())
                        .col(ColumnDef::new(Orders::ShipState).string().not_null())
                        .col(ColumnDef::new(Orders::ShipPostalCode).string().not_null())
                        .col(ColumnDef::new(Orders::ShipCountry).string().not_null())
                        .col(ColumnDef::new(Orders::SpecialInstructions).string().null())
                        .col(ColumnDef::new(Orders::IsPaid).boolean().not_null().default(false))
                        .col(ColumnDef::new(Orders::PaidAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::IsDelivered)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::DeliveredAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Orders::Version).integer().not_null().default(1))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Size).string().null())
                        .col(ColumnDef::new(OrderItems::Color).string().null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub(super) enum Orders {
        Table,
        Id,
        CustomerId,
        Status,
        PaymentMethod,
        ItemsSubtotal,
        ShippingPrice,
        TaxPrice,
        TotalPrice,
        ShipName,
        ShipPhone,
        ShipStreet,
        ShipCity,
        ShipState,
        ShipPostalCode,
        ShipCountry,
        SpecialInstructions,
        IsPaid,
        PaidAt,
        IsDelivered,
        DeliveredAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(Iden)]
    pub(super) enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        LineTotal,
        Size,
        Color,
        CreatedAt,
    }
}

mod m20240101_000004_create_cod_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000003_create_orders_tables::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_cod_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CodRecords::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CodRecords::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CodRecords::OrderId).uuid().not_null().unique_key())
                        .col(ColumnDef::new(CodRecords::CustomerId).uuid().not_null())
                        .col(
                            ColumnDef::new(CodRecords::PaymentStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CodRecords::DeliveryStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CodRecords::AssignedStaffId).uuid().null())
                        .col(
                            ColumnDef::new(CodRecords::CollectedAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CodRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CodRecords::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cod_records_order")
                                .from(CodRecords::Table, CodRecords::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryAttempts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryAttempts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryAttempts::CodRecordId).uuid().not_null())
                        .col(
                            ColumnDef::new(DeliveryAttempts::AttemptNumber)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryAttempts::Status).string_len(32).not_null())
                        .col(ColumnDef::new(DeliveryAttempts::RecordedBy).uuid().not_null())
                        .col(ColumnDef::new(DeliveryAttempts::Notes).string().null())
                        .col(
                            ColumnDef::new(DeliveryAttempts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_attempts_cod_record")
                                .from(DeliveryAttempts::Table, DeliveryAttempts::CodRecordId)
                                .to(CodRecords::Table, CodRecords::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Backstop for per-record attempt serialization: a concurrent
            // writer computing the same next number fails on this constraint
            // instead of producing a duplicate.
            manager
                .create_index(
                    Index::create()
                        .name("uniq_delivery_attempts_record_number")
                        .table(DeliveryAttempts::Table)
                        .col(DeliveryAttempts::CodRecordId)
                        .col(DeliveryAttempts::AttemptNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryAttempts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CodRecords::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub(super) enum CodRecords {
        Table,
        Id,
        OrderId,
        CustomerId,
        PaymentStatus,
        DeliveryStatus,
        AssignedStaffId,
        CollectedAmount,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub(super) enum DeliveryAttempts {
        Table,
        Id,
        CodRecordId,
        AttemptNumber,
        Status,
        RecordedBy,
        Notes,
        CreatedAt,
    }
}

mod m20240101_000005_create_returns_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000004_create_cod_tables::CodRecords;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_returns_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Returns::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Returns::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Returns::CodRecordId).uuid().not_null())
                        .col(ColumnDef::new(Returns::Reason).string().not_null())
                        .col(
                            ColumnDef::new(Returns::ReturnFee)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Returns::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Returns::RequestedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Returns::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Returns::UpdatedAt).timestamp_with_time_zone().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_returns_cod_record")
                                .from(Returns::Table, Returns::CodRecordId)
                                .to(CodRecords::Table, CodRecords::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ReturnItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(ReturnItems::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(ReturnItems::OrderItemId).uuid().not_null())
                        .col(ColumnDef::new(ReturnItems::Quantity).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_items_return")
                                .from(ReturnItems::Table, ReturnItems::ReturnId)
                                .to(Returns::Table, Returns::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Returns::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Returns {
        Table,
        Id,
        CodRecordId,
        Reason,
        ReturnFee,
        Status,
        RequestedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum ReturnItems {
        Table,
        Id,
        ReturnId,
        OrderItemId,
        Quantity,
    }
}
