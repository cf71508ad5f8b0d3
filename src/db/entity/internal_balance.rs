use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::error::AppError;
use crate::ledger::amount::from_decimal;

/// Materialized balance counters, minor units in `NUMERIC(78,0)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "internal_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub pending_onchain: Decimal,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub locked_amount: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::internal_wallet::Entity",
        from = "Column::WalletId",
        to = "super::internal_wallet::Column::Id"
    )]
    InternalWallet,
}

impl Related<super::internal_wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InternalWallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for crate::models::InternalBalance {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            wallet_id: model.wallet_id,
            balance: from_decimal(model.balance)?,
            pending_onchain: from_decimal(model.pending_onchain)?,
            locked_amount: from_decimal(model.locked_amount)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
