pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_tables;
mod m20250101_000002_create_internal_wallets_tables;
mod m20250101_000003_create_internal_ledger_table;
mod m20250101_000004_create_withdraw_requests_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_tables::Migration),
            Box::new(m20250101_000002_create_internal_wallets_tables::Migration),
            Box::new(m20250101_000003_create_internal_ledger_table::Migration),
            Box::new(m20250101_000004_create_withdraw_requests_table::Migration)
        ]
    }
}
