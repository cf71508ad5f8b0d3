use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "internal_wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub wallet_address: Option<String>,
    pub default_withdraw_address: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::internal_balance::Entity")]
    InternalBalance,
    #[sea_orm(has_many = "super::withdraw_request::Entity")]
    WithdrawRequest,
}

impl Related<super::internal_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InternalBalance.def()
    }
}

impl Related<super::withdraw_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WithdrawRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::InternalWallet {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            wallet_address: model.wallet_address,
            default_withdraw_address: model.default_withdraw_address,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
