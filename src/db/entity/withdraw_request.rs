use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::error::AppError;
use crate::ledger::amount::from_decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdraw_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Option<Uuid>,
    pub token_symbol: String,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub amount: Decimal,
    pub destination_address: String,
    pub status: String,
    pub reviewer_id: Option<String>,
    pub tx_hash: Option<String>,
    pub notes: Option<String>,
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

impl TryFrom<Model> for crate::models::WithdrawRequest {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            wallet_id: model.wallet_id,
            user_id: model.user_id,
            token_symbol: model.token_symbol,
            amount: from_decimal(model.amount)?,
            destination_address: model.destination_address,
            status: model.status.parse()?,
            reviewer_id: model.reviewer_id,
            tx_hash: model.tx_hash,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
