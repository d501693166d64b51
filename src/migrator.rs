use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_sites_table::Migration),
            Box::new(m20240101_000002_create_bookings_table::Migration),
            Box::new(m20240101_000003_create_booking_files_table::Migration),
            Box::new(m20240101_000004_create_cart_items_table::Migration),
        ]
    }
}

mod m20240101_000001_create_sites_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_sites_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sites::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sites::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sites::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Sites::Name).string().not_null())
                        .col(ColumnDef::new(Sites::Location).string().not_null())
                        .col(ColumnDef::new(Sites::City).string().null())
                        .col(
                            ColumnDef::new(Sites::PricePerMonth)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sites::PrintingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sites::MountingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sites::Status).string().not_null())
                        .col(ColumnDef::new(Sites::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Sites::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sites_owner_id")
                        .table(Sites::Table)
                        .col(Sites::OwnerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sites_status")
                        .table(Sites::Table)
                        .col(Sites::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sites::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Sites {
        Table,
        Id,
        OwnerId,
        Name,
        Location,
        City,
        PricePerMonth,
        PrintingCharge,
        MountingCharge,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::SiteId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::StartDate).date().not_null())
                        .col(ColumnDef::new(Bookings::EndDate).date().not_null())
                        // External gateway order id; assigned at most once per
                        // booking and the unit of payment idempotency.
                        .col(ColumnDef::new(Bookings::OrderId).string().null())
                        .col(ColumnDef::new(Bookings::TransactionId).string().null())
                        .col(ColumnDef::new(Bookings::Status).string().not_null())
                        .col(
                            ColumnDef::new(Bookings::BaseAmount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::PrintingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::MountingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::Discount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Bookings::Gst).decimal_len(16, 2).not_null())
                        .col(ColumnDef::new(Bookings::PaidAmount).decimal_len(16, 2).null())
                        .col(
                            ColumnDef::new(Bookings::SettlementAmount)
                                .decimal_len(16, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::CommissionAmount)
                                .decimal_len(16, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(Bookings::MediaDownloaded).boolean().not_null())
                        .col(ColumnDef::new(Bookings::MediaDownloadDate).date().null())
                        .col(ColumnDef::new(Bookings::PrintingStarted).boolean().not_null())
                        .col(ColumnDef::new(Bookings::PrintingStartDate).date().null())
                        .col(ColumnDef::new(Bookings::MountingStarted).boolean().not_null())
                        .col(ColumnDef::new(Bookings::MountingStartDate).date().null())
                        .col(ColumnDef::new(Bookings::SiteLive).boolean().not_null())
                        .col(ColumnDef::new(Bookings::SiteLiveDate).date().null())
                        .col(ColumnDef::new(Bookings::Paid25OnLive).boolean().not_null())
                        .col(ColumnDef::new(Bookings::Paid25OnMid).boolean().not_null())
                        .col(ColumnDef::new(Bookings::Paid50OnEnd).boolean().not_null())
                        .col(ColumnDef::new(Bookings::PayoutId).string().null())
                        .col(ColumnDef::new(Bookings::PayoutDate).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Bookings::BookingDate).date().not_null())
                        .col(ColumnDef::new(Bookings::PaymentDate).date().null())
                        .col(ColumnDef::new(Bookings::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Bookings::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            // The storage layer, not application locking, enforces
            // exactly-one-booking-per-payment.
            manager
                .create_index(
                    Index::create()
                        .name("uq_bookings_order_id")
                        .table(Bookings::Table)
                        .col(Bookings::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bookings_site_id")
                        .table(Bookings::Table)
                        .col(Bookings::SiteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bookings_buyer_id")
                        .table(Bookings::Table)
                        .col(Bookings::BuyerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bookings_vendor_id")
                        .table(Bookings::Table)
                        .col(Bookings::VendorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Bookings {
        Table,
        Id,
        SiteId,
        BuyerId,
        VendorId,
        StartDate,
        EndDate,
        OrderId,
        TransactionId,
        Status,
        BaseAmount,
        PrintingCharge,
        MountingCharge,
        Discount,
        Gst,
        PaidAmount,
        SettlementAmount,
        CommissionAmount,
        MediaDownloaded,
        MediaDownloadDate,
        PrintingStarted,
        PrintingStartDate,
        MountingStarted,
        MountingStartDate,
        SiteLive,
        SiteLiveDate,
        #[iden = "paid_25_on_live"]
        Paid25OnLive,
        #[iden = "paid_25_on_mid"]
        Paid25OnMid,
        #[iden = "paid_50_on_end"]
        Paid50OnEnd,
        PayoutId,
        PayoutDate,
        BookingDate,
        PaymentDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_booking_files_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_booking_files_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BookingFiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BookingFiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingFiles::BookingId).uuid().not_null())
                        .col(ColumnDef::new(BookingFiles::Category).string().not_null())
                        .col(ColumnDef::new(BookingFiles::Url).string().not_null())
                        .col(ColumnDef::new(BookingFiles::Name).string().null())
                        .col(ColumnDef::new(BookingFiles::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_booking_files_booking_id")
                        .table(BookingFiles::Table)
                        .col(BookingFiles::BookingId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BookingFiles::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum BookingFiles {
        Table,
        Id,
        BookingId,
        Category,
        Url,
        Name,
        CreatedAt,
    }
}

mod m20240101_000004_create_cart_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_cart_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::SiteId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::StartDate).date().not_null())
                        .col(ColumnDef::new(CartItems::EndDate).date().not_null())
                        .col(
                            ColumnDef::new(CartItems::PrintingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::MountingCharge)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::Discount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::Months).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::QuotedTotal)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(CartItems::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            // A buyer holds at most one cart row per site; the storage layer
            // backs the duplicate check.
            manager
                .create_index(
                    Index::create()
                        .name("uq_cart_items_buyer_site")
                        .table(CartItems::Table)
                        .col(CartItems::BuyerId)
                        .col(CartItems::SiteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_cart_items_buyer_id")
                        .table(CartItems::Table)
                        .col(CartItems::BuyerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum CartItems {
        Table,
        Id,
        BuyerId,
        SiteId,
        StartDate,
        EndDate,
        PrintingCharge,
        MountingCharge,
        Discount,
        Months,
        QuotedTotal,
        CreatedAt,
        UpdatedAt,
    }
}
