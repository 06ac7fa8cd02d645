use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_staff_users_table::Migration),
            Box::new(m20240101_000002_create_parties_table::Migration),
            Box::new(m20240101_000003_create_lookup_entries_table::Migration),
            Box::new(m20240101_000004_create_consoles_table::Migration),
            Box::new(m20240101_000005_create_shipments_table::Migration),
            Box::new(m20240101_000006_create_shipment_children_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_staff_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_staff_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StaffUsers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StaffUsers::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(StaffUsers::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StaffUsers::FullName).string().null())
                        .col(ColumnDef::new(StaffUsers::Phone).string_len(32).null())
                        .col(
                            ColumnDef::new(StaffUsers::IsAgent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StaffUsers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum StaffUsers {
        Table,
        Id,
        Username,
        FullName,
        Phone,
        IsAgent,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_parties_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_parties_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Parties::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parties::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parties::Role).string_len(16).not_null())
                        .col(ColumnDef::new(Parties::Name).string().not_null())
                        .col(ColumnDef::new(Parties::NationalId).string_len(64).null())
                        .col(ColumnDef::new(Parties::Code).string_len(32).null())
                        .col(ColumnDef::new(Parties::Phone).string_len(32).null())
                        .col(ColumnDef::new(Parties::Email).string().null())
                        .col(ColumnDef::new(Parties::Address).string().null())
                        .col(ColumnDef::new(Parties::City).string().null())
                        .col(ColumnDef::new(Parties::Country).string().null())
                        .col(
                            ColumnDef::new(Parties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parties::UpdatedAt)
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
                        .name("idx_parties_role_name")
                        .table(Parties::Table)
                        .col(Parties::Role)
                        .col(Parties::Name)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Parties::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Parties {
        Table,
        Id,
        Role,
        Name,
        NationalId,
        Code,
        Phone,
        Email,
        Address,
        City,
        Country,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_lookup_entries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_lookup_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LookupEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LookupEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LookupEntries::Kind).string_len(8).not_null())
                        .col(ColumnDef::new(LookupEntries::Data).string().not_null())
                        .col(ColumnDef::new(LookupEntries::CountryName).string().null())
                        .col(ColumnDef::new(LookupEntries::CountryAbbr).string_len(8).null())
                        .col(ColumnDef::new(LookupEntries::AirportAbbr).string_len(8).null())
                        .col(
                            ColumnDef::new(LookupEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LookupEntries::UpdatedAt)
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
                        .name("idx_lookup_entries_kind_data")
                        .table(LookupEntries::Table)
                        .col(LookupEntries::Kind)
                        .col(LookupEntries::Data)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LookupEntries::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum LookupEntries {
        Table,
        Id,
        Kind,
        Data,
        CountryName,
        CountryAbbr,
        AirportAbbr,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_consoles_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_consoles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Consoles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Consoles::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Consoles::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Consoles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Consoles::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Consoles {
        Table,
        Id,
        Code,
        CreatedAt,
    }
}

mod m20240101_000005_create_shipments_table {
    use super::m20240101_000001_create_staff_users_table::StaffUsers;
    use super::m20240101_000002_create_parties_table::Parties;
    use super::m20240101_000003_create_lookup_entries_table::LookupEntries;
    use super::m20240101_000004_create_consoles_table::Consoles;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_shipments_table"
        }
    }

    fn party_fk(name: &str, column: Shipments) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(Shipments::Table, column)
            .to(Parties::Table, Parties::Id)
            .on_delete(ForeignKeyAction::Restrict)
            .on_update(ForeignKeyAction::Cascade)
            .to_owned()
    }

    fn lookup_fk(name: &str, column: Shipments) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(Shipments::Table, column)
            .to(LookupEntries::Table, LookupEntries::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .on_update(ForeignKeyAction::Cascade)
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create shipments table that mirrors entities::shipment::Model
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Shipments::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Shipments::Reference)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Shipments::Priority)
                                .string_len(8)
                                .not_null()
                                .default("green"),
                        )
                        .col(ColumnDef::new(Shipments::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::SpId).uuid().null())
                        .col(ColumnDef::new(Shipments::AgentId).uuid().null())
                        .col(ColumnDef::new(Shipments::CarrierId).uuid().null())
                        .col(ColumnDef::new(Shipments::ShipperId).uuid().null())
                        .col(ColumnDef::new(Shipments::ConsigneeId).uuid().null())
                        .col(ColumnDef::new(Shipments::HawbShipperId).uuid().null())
                        .col(ColumnDef::new(Shipments::HawbConsigneeId).uuid().null())
                        .col(ColumnDef::new(Shipments::PolId).uuid().null())
                        .col(ColumnDef::new(Shipments::PodId).uuid().null())
                        .col(ColumnDef::new(Shipments::TermId).uuid().null())
                        .col(ColumnDef::new(Shipments::Via).string().null())
                        .col(
                            ColumnDef::new(Shipments::Mode)
                                .string_len(8)
                                .not_null()
                                .default("air"),
                        )
                        .col(ColumnDef::new(Shipments::Mawb).string_len(64).null())
                        .col(ColumnDef::new(Shipments::Hawb).string_len(64).null())
                        .col(ColumnDef::new(Shipments::FirstMaster).string_len(64).null())
                        .col(ColumnDef::new(Shipments::FirstHouse).string_len(64).null())
                        .col(ColumnDef::new(Shipments::FlightNo).string_len(32).null())
                        .col(ColumnDef::new(Shipments::ManifestNo).string_len(64).null())
                        .col(ColumnDef::new(Shipments::Etdw).date().null())
                        .col(ColumnDef::new(Shipments::Etd).date().null())
                        .col(ColumnDef::new(Shipments::Eta).date().null())
                        .col(ColumnDef::new(Shipments::TransitTime).integer().null())
                        .col(ColumnDef::new(Shipments::Pieces).integer().null())
                        .col(ColumnDef::new(Shipments::GrossWeight).decimal_len(16, 3).null())
                        .col(ColumnDef::new(Shipments::Volume).decimal_len(16, 3).null())
                        .col(
                            ColumnDef::new(Shipments::ChargeableWeight)
                                .decimal_len(16, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::FirstGrossWeight)
                                .decimal_len(16, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::FirstChargeableWeight)
                                .decimal_len(16, 3)
                                .null(),
                        )
                        .col(ColumnDef::new(Shipments::Commodity).string().null())
                        .col(ColumnDef::new(Shipments::HsCode).string_len(32).null())
                        .col(ColumnDef::new(Shipments::ConsoleId).uuid().null())
                        .col(
                            ColumnDef::new(Shipments::InqReplied)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Shipments::Confirmed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Shipments::ConfirmedAt).timestamp().null())
                        .col(ColumnDef::new(Shipments::Currency).string_len(8).null())
                        .col(ColumnDef::new(Shipments::FreightCharge).decimal_len(16, 2).null())
                        .col(
                            ColumnDef::new(Shipments::HandlingCharge)
                                .decimal_len(16, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(Shipments::ExtraCharges).decimal_len(16, 2).null())
                        .col(ColumnDef::new(Shipments::TotalCharges).decimal_len(16, 2).null())
                        .col(ColumnDef::new(Shipments::InvoiceDeadline).date().null())
                        .col(
                            ColumnDef::new(Shipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(&mut party_fk("fk_shipments_client", Shipments::ClientId))
                        .foreign_key(&mut party_fk("fk_shipments_agent", Shipments::AgentId))
                        .foreign_key(&mut party_fk("fk_shipments_carrier", Shipments::CarrierId))
                        .foreign_key(&mut party_fk("fk_shipments_shipper", Shipments::ShipperId))
                        .foreign_key(&mut party_fk(
                            "fk_shipments_consignee",
                            Shipments::ConsigneeId,
                        ))
                        .foreign_key(&mut party_fk(
                            "fk_shipments_hawb_shipper",
                            Shipments::HawbShipperId,
                        ))
                        .foreign_key(&mut party_fk(
                            "fk_shipments_hawb_consignee",
                            Shipments::HawbConsigneeId,
                        ))
                        .foreign_key(&mut lookup_fk("fk_shipments_pol", Shipments::PolId))
                        .foreign_key(&mut lookup_fk("fk_shipments_pod", Shipments::PodId))
                        .foreign_key(&mut lookup_fk("fk_shipments_term", Shipments::TermId))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_sp")
                                .from(Shipments::Table, Shipments::SpId)
                                .to(StaffUsers::Table, StaffUsers::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_console")
                                .from(Shipments::Table, Shipments::ConsoleId)
                                .to(Consoles::Table, Consoles::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_shipments_client_id", Shipments::ClientId),
                ("idx_shipments_eta", Shipments::Eta),
                ("idx_shipments_created_at", Shipments::CreatedAt),
                ("idx_shipments_mawb", Shipments::Mawb),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Shipments::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden, Clone, Copy)]
    pub enum Shipments {
        Table,
        Id,
        Reference,
        Priority,
        ClientId,
        SpId,
        AgentId,
        CarrierId,
        ShipperId,
        ConsigneeId,
        HawbShipperId,
        HawbConsigneeId,
        PolId,
        PodId,
        TermId,
        Via,
        Mode,
        Mawb,
        Hawb,
        FirstMaster,
        FirstHouse,
        FlightNo,
        ManifestNo,
        Etdw,
        Etd,
        Eta,
        TransitTime,
        Pieces,
        GrossWeight,
        Volume,
        ChargeableWeight,
        FirstGrossWeight,
        FirstChargeableWeight,
        Commodity,
        HsCode,
        ConsoleId,
        InqReplied,
        Confirmed,
        ConfirmedAt,
        Currency,
        FreightCharge,
        HandlingCharge,
        ExtraCharges,
        TotalCharges,
        InvoiceDeadline,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_shipment_children_tables {
    use super::m20240101_000001_create_staff_users_table::StaffUsers;
    use super::m20240101_000005_create_shipments_table::Shipments;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_shipment_children_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Charges::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Charges::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Charges::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(Charges::Description).string().not_null())
                        .col(ColumnDef::new(Charges::Amount).decimal_len(16, 2).not_null())
                        .col(ColumnDef::new(Charges::Currency).string_len(8).not_null())
                        .col(ColumnDef::new(Charges::Payer).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Charges::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Charges::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_charges_shipment")
                                .from(Charges::Table, Charges::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentComments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentComments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentComments::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentComments::Text).text().not_null())
                        .col(ColumnDef::new(ShipmentComments::AuthorId).uuid().null())
                        .col(ColumnDef::new(ShipmentComments::AuthorName).string().not_null())
                        .col(
                            ColumnDef::new(ShipmentComments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_comments_shipment")
                                .from(ShipmentComments::Table, ShipmentComments::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentOperators::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ShipmentOperators::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentOperators::StaffUserId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(ShipmentOperators::ShipmentId)
                                .col(ShipmentOperators::StaffUserId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_operators_shipment")
                                .from(ShipmentOperators::Table, ShipmentOperators::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_operators_staff_user")
                                .from(ShipmentOperators::Table, ShipmentOperators::StaffUserId)
                                .to(StaffUsers::Table, StaffUsers::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_charges_shipment_id")
                        .table(Charges::Table)
                        .col(Charges::ShipmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_comments_shipment_id")
                        .table(ShipmentComments::Table)
                        .col(ShipmentComments::ShipmentId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentOperators::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShipmentComments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Charges::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Charges {
        Table,
        Id,
        ShipmentId,
        Description,
        Amount,
        Currency,
        Payer,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum ShipmentComments {
        Table,
        Id,
        ShipmentId,
        Text,
        AuthorId,
        AuthorName,
        CreatedAt,
    }

    #[derive(Iden)]
    enum ShipmentOperators {
        Table,
        ShipmentId,
        StaffUserId,
    }
}
