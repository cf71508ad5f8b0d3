use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_internal_wallets_tables::InternalWallet;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(InternalLedger::Table)
                .if_not_exists()
                .col(ColumnDef::new(InternalLedger::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(InternalLedger::WalletId).uuid().not_null())
                .col(ColumnDef::new(InternalLedger::EntryType).string_len(20).not_null())
                .col(ColumnDef::new(InternalLedger::Amount).decimal_len(78, 0).not_null())
                .col(ColumnDef::new(InternalLedger::TokenSymbol).string_len(20).not_null())
                .col(ColumnDef::new(InternalLedger::Reference).string().null())
                .col(ColumnDef::new(InternalLedger::Metadata).json_binary().null())
                .col(ColumnDef::new(InternalLedger::CreatedBy).string().null())
                .col(
                    ColumnDef::new(InternalLedger::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_internal_ledger_wallet")
                        .from(InternalLedger::Table, InternalLedger::WalletId)
                        .to(InternalWallet::Table, InternalWallet::Id)
                        .on_delete(ForeignKeyAction::Restrict)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_internal_ledger_wallet_created")
                .table(InternalLedger::Table)
                .col(InternalLedger::WalletId)
                .col(InternalLedger::CreatedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(InternalLedger::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum InternalLedger {
    #[sea_orm(iden = "internal_ledger")]
    Table,
    Id,
    WalletId,
    EntryType,
    Amount,
    TokenSymbol,
    Reference,
    Metadata,
    CreatedBy,
    CreatedAt,
}
