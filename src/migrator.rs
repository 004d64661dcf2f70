use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_tables::Migration),
            Box::new(m20240301_000002_create_source_document_tables::Migration),
            Box::new(m20240301_000003_create_ledger_tables::Migration),
            Box::new(m20240301_000004_create_ledger_settings_table::Migration),
        ]
    }
}

mod m20240301_000001_create_products_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_tables"
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
                        .col(ColumnDef::new(Products::Id).string().not_null().primary_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::UnitOfMeasure).string().not_null())
                        .col(ColumnDef::new(Products::Cost).decimal().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::Inventoriable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::Kind).string().not_null())
                        .col(ColumnDef::new(Products::LotPrefix).string().null())
                        .col(ColumnDef::new(Products::Version).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductInputs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductInputs::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductInputs::ProductId).string().not_null())
                        .col(
                            ColumnDef::new(ProductInputs::InputProductId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductInputs::Quantity).decimal().not_null())
                        .col(ColumnDef::new(ProductInputs::Position).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_inputs_product")
                                .from(ProductInputs::Table, ProductInputs::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_inputs_input")
                                .from(ProductInputs::Table, ProductInputs::InputProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Reverse "is input of" lookup used by the cost cascade
            manager
                .create_index(
                    Index::create()
                        .name("idx_product_inputs_input_product")
                        .table(ProductInputs::Table)
                        .col(ProductInputs::InputProductId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductInputs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        Id,
        Name,
        UnitOfMeasure,
        Cost,
        Inventoriable,
        Kind,
        LotPrefix,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductInputs {
        Table,
        Id,
        ProductId,
        InputProductId,
        Quantity,
        Position,
    }
}

mod m20240301_000002_create_source_document_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_source_document_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Supplier).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::ProductId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_items_order")
                                .from(PurchaseOrderItems::Table, PurchaseOrderItems::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductionOrders::ProductId).string().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::PlannedQuantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrderLines::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderLines::ProductionOrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderLines::ProductId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderLines::RequiredQuantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrderLines::Status).string().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_order_lines_order")
                                .from(
                                    ProductionOrderLines::Table,
                                    ProductionOrderLines::ProductionOrderId,
                                )
                                .to(ProductionOrders::Table, ProductionOrders::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        Supplier,
        Status,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        Quantity,
        UnitPrice,
    }

    #[derive(DeriveIden)]
    enum ProductionOrders {
        Table,
        Id,
        ProductId,
        PlannedQuantity,
        Status,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionOrderLines {
        Table,
        Id,
        ProductionOrderId,
        ProductId,
        RequiredQuantity,
        Status,
    }
}

mod m20240301_000003_create_ledger_tables {
    use super::m20240301_000001_create_products_tables::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Lots keep a plain (unconstrained) document reference: they are detached, never
            // deleted, when the source document goes away.
            manager
                .create_table(
                    Table::create()
                        .table(Lots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Lots::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Lots::BatchNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Lots::ProductionDate).date().null())
                        .col(ColumnDef::new(Lots::ExpirationDate).date().null())
                        .col(ColumnDef::new(Lots::PurchaseOrderId).integer().null())
                        .col(ColumnDef::new(Lots::ProductionOrderId).integer().null())
                        .col(
                            ColumnDef::new(Lots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseTransactions::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::CausationType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::CausationId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::AccountingState)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::JournalEntryId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::SupportDocumentUrl)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(WarehouseTransactions::Notes).text().null())
                        .col(ColumnDef::new(WarehouseTransactions::ApprovedBy).string().null())
                        .col(
                            ColumnDef::new(WarehouseTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_warehouse_transactions_causation")
                        .table(WarehouseTransactions::Table)
                        .col(WarehouseTransactions::CausationType)
                        .col(WarehouseTransactions::CausationId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionUsers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionUsers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransactionUsers::TransactionId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionUsers::Username).string().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_users_transaction")
                                .from(TransactionUsers::Table, TransactionUsers::TransactionId)
                                .to(WarehouseTransactions::Table, WarehouseTransactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movements::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Movements::TransactionId).integer().not_null())
                        .col(ColumnDef::new(Movements::ProductId).string().not_null())
                        .col(ColumnDef::new(Movements::Quantity).decimal().not_null())
                        .col(ColumnDef::new(Movements::Warehouse).string().not_null())
                        .col(ColumnDef::new(Movements::MovementType).string().not_null())
                        .col(ColumnDef::new(Movements::LotId).integer().null())
                        .col(ColumnDef::new(Movements::ProductionAreaId).integer().null())
                        .col(
                            ColumnDef::new(Movements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_transaction")
                                .from(Movements::Table, Movements::TransactionId)
                                .to(WarehouseTransactions::Table, WarehouseTransactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_product")
                                .from(Movements::Table, Movements::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_lot")
                                .from(Movements::Table, Movements::LotId)
                                .to(Lots::Table, Lots::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Kardex ordering and range sums
            manager
                .create_index(
                    Index::create()
                        .name("idx_movements_product_created_id")
                        .table(Movements::Table)
                        .col(Movements::ProductId)
                        .col(Movements::CreatedAt)
                        .col(Movements::Id)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransactionUsers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Lots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Lots {
        Table,
        Id,
        BatchNumber,
        ProductionDate,
        ExpirationDate,
        PurchaseOrderId,
        ProductionOrderId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseTransactions {
        Table,
        Id,
        CausationType,
        CausationId,
        AccountingState,
        JournalEntryId,
        SupportDocumentUrl,
        Notes,
        ApprovedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TransactionUsers {
        Table,
        Id,
        TransactionId,
        Username,
    }

    #[derive(DeriveIden)]
    enum Movements {
        Table,
        Id,
        TransactionId,
        ProductId,
        Quantity,
        Warehouse,
        MovementType,
        LotId,
        ProductionAreaId,
        CreatedAt,
    }
}

mod m20240301_000004_create_ledger_settings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_ledger_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LedgerSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerSettings::Id)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(LedgerSettings::ForcedDeletionEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(LedgerSettings::BulkLoadEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(LedgerSettings::AdjustmentsEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(LedgerSettings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerSettings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LedgerSettings {
        Table,
        Id,
        ForcedDeletionEnabled,
        BulkLoadEnabled,
        AdjustmentsEnabled,
        CreatedAt,
    }
}
