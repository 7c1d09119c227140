use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Orders::OrderNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                    .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                    .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
                    .col(ColumnDef::new(Orders::AddressHouse).string().not_null())
                    .col(ColumnDef::new(Orders::AddressArea).string().not_null())
                    .col(ColumnDef::new(Orders::AddressLandmark).string().null())
                    .col(ColumnDef::new(Orders::AddressCity).string().not_null())
                    .col(ColumnDef::new(Orders::AddressState).string().not_null())
                    .col(ColumnDef::new(Orders::AddressPincode).string().not_null())
                    .col(
                        ColumnDef::new(Orders::Subtotal)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Discount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Orders::Tax).decimal().not_null().default(0.0))
                    .col(
                        ColumnDef::new(Orders::ServiceCharge)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::FinalAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Orders::Priority)
                            .string()
                            .not_null()
                            .default("medium"),
                    )
                    .col(ColumnDef::new(Orders::Notes).text().null())
                    .col(ColumnDef::new(Orders::AdminNotes).text().null())
                    .col(ColumnDef::new(Orders::Rating).small_integer().null())
                    .col(ColumnDef::new(Orders::Review).text().null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                    .col(
                        ColumnDef::new(Orders::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderNumber,
    CustomerName,
    CustomerPhone,
    CustomerEmail,
    AddressHouse,
    AddressArea,
    AddressLandmark,
    AddressCity,
    AddressState,
    AddressPincode,
    Subtotal,
    Discount,
    Tax,
    ServiceCharge,
    FinalAmount,
    Status,
    Priority,
    Notes,
    AdminNotes,
    Rating,
    Review,
    CreatedAt,
    UpdatedAt,
    Version,
}
