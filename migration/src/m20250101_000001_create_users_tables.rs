use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(User::Table)
                .if_not_exists()
                .col(ColumnDef::new(User::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(User::Email).string().null().unique_key())
                .col(ColumnDef::new(User::Name).string().null())
                .col(
                    ColumnDef::new(User::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        // Addresses are stored lowercase, so the primary key is the uniqueness guard
        manager.create_table(
            Table::create()
                .table(UserWallet::Table)
                .if_not_exists()
                .col(ColumnDef::new(UserWallet::Address).string_len(42).not_null().primary_key())
                .col(ColumnDef::new(UserWallet::UserId).uuid().not_null())
                .col(ColumnDef::new(UserWallet::IsPrimary).boolean().not_null().default(false))
                .col(
                    ColumnDef::new(UserWallet::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_user_wallets_user")
                        .from(UserWallet::Table, UserWallet::UserId)
                        .to(User::Table, User::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_user_wallets_user_id")
                .table(UserWallet::Table)
                .col(UserWallet::UserId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserWallet::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub enum User {
    #[sea_orm(iden = "users")]
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserWallet {
    #[sea_orm(iden = "user_wallets")]
    Table,
    Address,
    UserId,
    IsPrimary,
    CreatedAt,
}
