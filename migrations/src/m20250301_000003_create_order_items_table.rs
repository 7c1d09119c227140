use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_orders_table::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ServiceName).string().not_null())
                    .col(ColumnDef::new(OrderItems::VariantId).uuid().null())
                    .col(ColumnDef::new(OrderItems::VariantName).string().null())
                    .col(ColumnDef::new(OrderItems::CategoryId).string().not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                    .col(ColumnDef::new(OrderItems::TotalPrice).decimal().not_null())
                    .col(
                        ColumnDef::new(OrderItems::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(OrderItems::EngineerId).uuid().null())
                    .col(ColumnDef::new(OrderItems::EngineerName).string().null())
                    .col(ColumnDef::new(OrderItems::AssignedAt).timestamp().null())
                    .col(ColumnDef::new(OrderItems::ScheduledDate).date().null())
                    .col(ColumnDef::new(OrderItems::TimeSlot).string().null())
                    .col(ColumnDef::new(OrderItems::CompletedAt).timestamp().null())
                    .col(ColumnDef::new(OrderItems::Notes).text().null())
                    .col(ColumnDef::new(OrderItems::Rating).small_integer().null())
                    .col(ColumnDef::new(OrderItems::Review).text().null())
                    .col(ColumnDef::new(OrderItems::Position).integer().not_null())
                    .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(OrderItems::UpdatedAt).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order_id")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderItems {
    Table,
    Id,
    OrderId,
    ServiceId,
    ServiceName,
    VariantId,
    VariantName,
    CategoryId,
    Quantity,
    UnitPrice,
    TotalPrice,
    Status,
    EngineerId,
    EngineerName,
    AssignedAt,
    ScheduledDate,
    TimeSlot,
    CompletedAt,
    Notes,
    Rating,
    Review,
    Position,
    CreatedAt,
    UpdatedAt,
}
