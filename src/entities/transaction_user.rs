use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User listed as responsible for a warehouse transaction.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub transaction_id: i32,
    pub username: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::warehouse_transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::warehouse_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
