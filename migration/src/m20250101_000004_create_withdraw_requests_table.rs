use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_users_tables::User;
use super::m20250101_000002_create_internal_wallets_tables::InternalWallet;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(WithdrawRequest::Table)
                .if_not_exists()
                .col(ColumnDef::new(WithdrawRequest::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(WithdrawRequest::WalletId).uuid().not_null())
                .col(ColumnDef::new(WithdrawRequest::UserId).uuid().null())
                .col(ColumnDef::new(WithdrawRequest::TokenSymbol).string_len(20).not_null())
                .col(
                    ColumnDef::new(WithdrawRequest::Amount)
                        .decimal_len(78, 0)
                        .not_null()
                        .check(Expr::col(WithdrawRequest::Amount).gt(0))
                )
                .col(ColumnDef::new(WithdrawRequest::DestinationAddress).string_len(42).not_null())
                .col(
                    ColumnDef::new(WithdrawRequest::Status)
                        .string_len(20)
                        .not_null()
                        .default("pending")
                )
                .col(ColumnDef::new(WithdrawRequest::ReviewerId).string().null())
                .col(ColumnDef::new(WithdrawRequest::TxHash).string().null())
                .col(ColumnDef::new(WithdrawRequest::Notes).text().null())
                .col(
                    ColumnDef::new(WithdrawRequest::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(WithdrawRequest::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_withdraw_requests_wallet")
                        .from(WithdrawRequest::Table, WithdrawRequest::WalletId)
                        .to(InternalWallet::Table, InternalWallet::Id)
                        .on_delete(ForeignKeyAction::Restrict)
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_withdraw_requests_user")
                        .from(WithdrawRequest::Table, WithdrawRequest::UserId)
                        .to(User::Table, User::Id)
                        .on_delete(ForeignKeyAction::SetNull)
                )
                .to_owned()
        ).await?;

        // Limit checks sum a user's requests over a time window
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_withdraw_requests_user_created")
                .table(WithdrawRequest::Table)
                .col(WithdrawRequest::UserId)
                .col(WithdrawRequest::CreatedAt)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_withdraw_requests_wallet_created")
                .table(WithdrawRequest::Table)
                .col(WithdrawRequest::WalletId)
                .col(WithdrawRequest::CreatedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(WithdrawRequest::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum WithdrawRequest {
    #[sea_orm(iden = "withdraw_requests")]
    Table,
    Id,
    WalletId,
    UserId,
    TokenSymbol,
    Amount,
    DestinationAddress,
    Status,
    ReviewerId,
    TxHash,
    Notes,
    CreatedAt,
    UpdatedAt,
}
