use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Physical stock location inside the plant.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum Warehouse {
    #[default]
    General,
    Damaged,
    QualityHold,
    Returns,
}

impl Warehouse {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

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
pub enum MovementType {
    Purchase,
    Consumption,
    Backflush,
    Sale,
    Loss,
    WriteOff,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Maps a free-text reason to a movement type. Matching is case-insensitive and accepts the
    /// plant's legacy codes.
    pub fn from_reason(reason: &str) -> Option<Self> {
        let normalized = reason.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "COMPRA" => Some(MovementType::Purchase),
            "CONSUMO" => Some(MovementType::Consumption),
            "VENTA" => Some(MovementType::Sale),
            "PERDIDA" => Some(MovementType::Loss),
            "BAJA" => Some(MovementType::WriteOff),
            other => other.parse().ok(),
        }
    }

    /// Explicit reason when it maps, otherwise inbound for non-negative quantities and
    /// write-off for negative ones.
    pub fn resolve(reason: Option<&str>, quantity: Decimal) -> Self {
        reason
            .and_then(Self::from_reason)
            .unwrap_or(if quantity.is_sign_negative() && !quantity.is_zero() {
                MovementType::WriteOff
            } else {
                MovementType::Purchase
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub transaction_id: i32,
    pub product_id: String,
    /// Positive is inbound, negative is outbound.
    pub quantity: Decimal,
    pub warehouse: String,
    pub movement_type: String,
    pub lot_id: Option<i32>,
    pub production_area_id: Option<i32>,
    pub created_at: DateTime<Utc>,
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
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::lot::Entity",
        from = "Column::LotId",
        to = "super::lot::Column::Id"
    )]
    Lot,
}

impl Related<super::warehouse_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn explicit_reason_wins_over_sign() {
        assert_eq!(
            MovementType::resolve(Some("consumption"), dec!(5)),
            MovementType::Consumption
        );
        assert_eq!(
            MovementType::resolve(Some("COMPRA"), dec!(-5)),
            MovementType::Purchase
        );
        assert_eq!(
            MovementType::resolve(Some("write-off"), dec!(3)),
            MovementType::WriteOff
        );
    }

    #[test]
    fn unmapped_reason_falls_back_to_sign() {
        assert_eq!(
            MovementType::resolve(Some("recount"), dec!(-2)),
            MovementType::WriteOff
        );
        assert_eq!(MovementType::resolve(None, dec!(0)), MovementType::Purchase);
        assert_eq!(MovementType::resolve(None, dec!(7.5)), MovementType::Purchase);
    }

    #[test]
    fn warehouse_names_round_trip() {
        for w in [
            Warehouse::General,
            Warehouse::Damaged,
            Warehouse::QualityHold,
            Warehouse::Returns,
        ] {
            assert_eq!(w.as_str().parse::<Warehouse>().ok(), Some(w));
        }
    }

    #[test]
    fn stored_names_are_screaming_snake_case() {
        assert_eq!(MovementType::WriteOff.as_str(), "WRITE_OFF");
        assert_eq!(Warehouse::QualityHold.to_string(), "QUALITY_HOLD");
        assert_eq!(
            "SEMI_FINISHED".parse::<crate::entities::product::ProductKind>().ok(),
            Some(crate::entities::product::ProductKind::SemiFinished)
        );
        assert!("write_off".parse::<MovementType>().is_err());
        assert_eq!(
            MovementType::resolve(Some("write_off"), dec!(1)),
            MovementType::WriteOff
        );
    }
}
