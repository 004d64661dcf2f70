use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Product classification. Only composite kinds own an input list.
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
pub enum ProductKind {
    Material,
    SemiFinished,
    Finished,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, ProductKind::Material)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub unit_of_measure: String,
    pub cost: Decimal,
    pub inventoriable: bool,
    pub kind: String,
    pub lot_prefix: Option<String>,
    /// Bumped on every cost write; guards the read-modify-write of cost.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Unknown stored kinds are treated as raw material, which never cascades.
    pub fn product_kind(&self) -> ProductKind {
        self.kind.parse().unwrap_or(ProductKind::Material)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movement::Entity")]
    Movements,
}

impl Related<super::movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
