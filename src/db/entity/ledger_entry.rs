use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::error::AppError;
use crate::ledger::amount::from_decimal;

/// Append-only. Rows are inserted and never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "internal_ledger")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub entry_type: String,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub amount: Decimal,
    pub token_symbol: String,
    pub reference: Option<String>,
    pub metadata: Option<Json>,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
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

impl TryFrom<Model> for crate::models::LedgerEntry {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            wallet_id: model.wallet_id,
            entry_type: model.entry_type.parse()?,
            amount: from_decimal(model.amount)?,
            token_symbol: model.token_symbol,
            reference: model.reference,
            metadata: model.metadata,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
