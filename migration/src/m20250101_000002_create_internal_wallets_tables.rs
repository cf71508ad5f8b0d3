use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_users_tables::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(InternalWallet::Table)
                .if_not_exists()
                .col(ColumnDef::new(InternalWallet::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(InternalWallet::UserId).uuid().not_null().unique_key())
                .col(ColumnDef::new(InternalWallet::WalletAddress).string_len(42).null())
                .col(ColumnDef::new(InternalWallet::DefaultWithdrawAddress).string_len(42).null())
                .col(
                    ColumnDef::new(InternalWallet::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(InternalWallet::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_internal_wallets_user")
                        .from(InternalWallet::Table, InternalWallet::UserId)
                        .to(User::Table, User::Id)
                        .on_delete(ForeignKeyAction::Restrict)
                )
                .to_owned()
        ).await?;

        manager.create_table(
            Table::create()
                .table(InternalBalance::Table)
                .if_not_exists()
                .col(ColumnDef::new(InternalBalance::WalletId).uuid().not_null().primary_key())
                .col(
                    ColumnDef::new(InternalBalance::Balance)
                        .decimal_len(78, 0)
                        .not_null()
                        .default(0)
                        .check(Expr::col(InternalBalance::Balance).gte(0))
                )
                .col(
                    ColumnDef::new(InternalBalance::PendingOnchain)
                        .decimal_len(78, 0)
                        .not_null()
                        .default(0)
                        .check(Expr::col(InternalBalance::PendingOnchain).gte(0))
                )
                .col(
                    ColumnDef::new(InternalBalance::LockedAmount)
                        .decimal_len(78, 0)
                        .not_null()
                        .default(0)
                        .check(Expr::col(InternalBalance::LockedAmount).gte(0))
                )
                .col(
                    ColumnDef::new(InternalBalance::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(InternalBalance::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_internal_balances_wallet")
                        .from(InternalBalance::Table, InternalBalance::WalletId)
                        .to(InternalWallet::Table, InternalWallet::Id)
                        .on_delete(ForeignKeyAction::Restrict)
                )
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(InternalBalance::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(InternalWallet::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub enum InternalWallet {
    #[sea_orm(iden = "internal_wallets")]
    Table,
    Id,
    UserId,
    WalletAddress,
    DefaultWithdrawAddress,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InternalBalance {
    #[sea_orm(iden = "internal_balances")]
    Table,
    WalletId,
    Balance,
    PendingOnchain,
    LockedAmount,
    CreatedAt,
    UpdatedAt,
}
