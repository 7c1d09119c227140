pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_orders_table;
mod m20250301_000002_create_employees_table;
mod m20250301_000003_create_order_items_table;
mod m20250301_000004_add_workflow_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_orders_table::Migration),
            Box::new(m20250301_000002_create_employees_table::Migration),
            Box::new(m20250301_000003_create_order_items_table::Migration),
            Box::new(m20250301_000004_add_workflow_indexes::Migration),
        ]
    }
}
