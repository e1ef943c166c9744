use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_basket_tables::Migration),
            Box::new(m20240301_000003_create_payment_tables::Migration),
            Box::new(m20240301_000004_create_checkout_tables::Migration),
            Box::new(m20240301_000005_create_order_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
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
                        .col(
                            ColumnDef::new(Products::ProductId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::StoreId).integer().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Category).string().not_null())
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::AverageRating)
                                .decimal_len(3, 2)
                                .not_null()
                                .default(0),
                        )
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
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_store_id")
                        .table(Products::Table)
                        .col(Products::StoreId)
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

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        ProductId,
        StoreId,
        Name,
        Category,
        UnitPrice,
        StockQuantity,
        AverageRating,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_basket_tables {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_basket_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BasketItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BasketItems::CustomerId).integer().not_null())
                        .col(ColumnDef::new(BasketItems::ProductId).integer().not_null())
                        .col(ColumnDef::new(BasketItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(BasketItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BasketItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(BasketItems::CustomerId)
                                .col(BasketItems::ProductId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_basket_items_product")
                                .from(BasketItems::Table, BasketItems::ProductId)
                                .to(Products::Table, Products::ProductId),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BasketItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BasketItems {
        Table,
        CustomerId,
        ProductId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_payment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_payment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Payments::PaymentId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Payments::CustomerId).integer().not_null())
                        .col(ColumnDef::new(Payments::Method).string_len(16).not_null())
                        .col(ColumnDef::new(Payments::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
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
                        .name("idx_payments_customer_id")
                        .table(Payments::Table)
                        .col(Payments::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentCards::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentCards::CardId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PaymentCards::HolderName).string().not_null())
                        .col(ColumnDef::new(PaymentCards::CardNumber).string().not_null())
                        .col(ColumnDef::new(PaymentCards::CardType).string().not_null())
                        .col(ColumnDef::new(PaymentCards::Cvv).string_len(4).not_null())
                        .col(ColumnDef::new(PaymentCards::ExpiryDate).string().not_null())
                        .col(ColumnDef::new(PaymentCards::Brand).string().not_null())
                        .col(
                            ColumnDef::new(PaymentCards::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OnlineTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OnlineTransactions::TransactionId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OnlineTransactions::PaymentId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OnlineTransactions::CardId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OnlineTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_online_transactions_payment")
                                .from(OnlineTransactions::Table, OnlineTransactions::PaymentId)
                                .to(Payments::Table, Payments::PaymentId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_online_transactions_card")
                                .from(OnlineTransactions::Table, OnlineTransactions::CardId)
                                .to(PaymentCards::Table, PaymentCards::CardId),
                        )
                        .to_owned(),
                )
                .await?;

            // A card is charged at most once per payment
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_online_transactions_card_payment")
                        .table(OnlineTransactions::Table)
                        .col(OnlineTransactions::CardId)
                        .col(OnlineTransactions::PaymentId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OnlineTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentCards::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        PaymentId,
        CustomerId,
        Method,
        Status,
        Amount,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PaymentCards {
        Table,
        CardId,
        HolderName,
        CardNumber,
        CardType,
        Cvv,
        ExpiryDate,
        Brand,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OnlineTransactions {
        Table,
        TransactionId,
        PaymentId,
        CardId,
        CreatedAt,
    }
}

mod m20240301_000004_create_checkout_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_checkout_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // customer_id as primary key: one session per customer
            manager
                .create_table(
                    Table::create()
                        .table(CheckoutSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckoutSessions::CustomerId)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingAddress)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::PaymentId).integer().null())
                        .col(
                            ColumnDef::new(CheckoutSessions::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CheckoutItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckoutItems::CustomerId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutItems::ProductId).integer().not_null())
                        .col(ColumnDef::new(CheckoutItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CheckoutItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(CheckoutItems::CustomerId)
                                .col(CheckoutItems::ProductId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_checkout_items_session")
                                .from(CheckoutItems::Table, CheckoutItems::CustomerId)
                                .to(CheckoutSessions::Table, CheckoutSessions::CustomerId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CheckoutItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CheckoutSessions {
        Table,
        CustomerId,
        ShippingAddress,
        PaymentId,
        Amount,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CheckoutItems {
        Table,
        CustomerId,
        ProductId,
        Quantity,
        UnitPrice,
    }
}

mod m20240301_000005_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CustomerOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerOrders::OrderId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::CustomerId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerOrders::PaymentId).integer().not_null())
                        .col(
                            ColumnDef::new(CustomerOrders::ShippingAddress)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::OrderTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::OrderStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::EstimatedDeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrders::UpdatedAt)
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
                        .name("idx_customer_orders_customer_id")
                        .table(CustomerOrders::Table)
                        .col(CustomerOrders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(OrderItems::OrderId)
                                .col(OrderItems::ProductId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(CustomerOrders::Table, CustomerOrders::OrderId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderSimulations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderSimulations::OrderId)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OrderSimulations::OutForDeliveryDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderSimulations::DeliveryDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_simulations_order")
                                .from(OrderSimulations::Table, OrderSimulations::OrderId)
                                .to(CustomerOrders::Table, CustomerOrders::OrderId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderSimulations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CustomerOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CustomerOrders {
        Table,
        OrderId,
        CustomerId,
        PaymentId,
        ShippingAddress,
        OrderTotal,
        OrderStatus,
        EstimatedDeliveryDate,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        OrderId,
        ProductId,
        Quantity,
        UnitPrice,
    }

    #[derive(DeriveIden)]
    enum OrderSimulations {
        Table,
        OrderId,
        OutForDeliveryDate,
        DeliveryDate,
    }
}
