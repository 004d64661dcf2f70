use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use super::movement::Warehouse;

/// Business document category that caused a transaction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CausationType {
    /// Purchase order receipt
    Ocm,
    /// Production order
    Op,
    /// Inter-warehouse transfer
    Ota,
    /// Manual adjustment
    Oaa,
    /// Dispensing
    Od,
    /// Bulk load
    Cm,
}

impl CausationType {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Accounting state a freshly recorded transaction of this type starts in.
    pub fn initial_accounting_state(&self) -> AccountingState {
        match self {
            CausationType::Oaa | CausationType::Ota => AccountingState::NotApplicable,
            _ => AccountingState::Pending,
        }
    }

    /// Checks the warehouse set of a transaction against the rule for this causation.
    pub fn validate_warehouses(&self, warehouses: &[Warehouse]) -> Result<(), String> {
        if warehouses.is_empty() {
            return Err(format!("{} transaction requires at least one movement", self.as_str()));
        }
        match self {
            CausationType::Ocm | CausationType::Od => {
                if let Some(other) = warehouses.iter().find(|w| **w != Warehouse::General) {
                    return Err(format!(
                        "{} transactions only move stock in GENERAL, got {}",
                        self.as_str(),
                        other.as_str()
                    ));
                }
            }
            CausationType::Ota => {
                let mut distinct = warehouses.to_vec();
                distinct.sort_by_key(|w| w.as_str());
                distinct.dedup();
                if distinct.len() != 2 {
                    return Err(format!(
                        "transfers must involve exactly two distinct warehouses, got {}",
                        distinct.len()
                    ));
                }
            }
            CausationType::Op | CausationType::Oaa | CausationType::Cm => {}
        }
        Ok(())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountingState {
    Pending,
    Posted,
    NotApplicable,
}

impl AccountingState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub causation_type: String,
    pub causation_id: i32,
    pub accounting_state: String,
    pub journal_entry_id: Option<i64>,
    pub support_document_url: Option<String>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movement::Entity")]
    Movements,
    #[sea_orm(has_many = "super::transaction_user::Entity")]
    ResponsibleUsers,
}

impl Related<super::movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl Related<super::transaction_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResponsibleUsers.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
