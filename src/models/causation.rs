use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::{
    lot, movement,
    movement::{MovementType, Warehouse},
    warehouse_transaction::{self, CausationType},
};

/// Source documents that can own lots and cause warehouse transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceDocumentKind {
    PurchaseOrder,
    ProductionOrder,
}

impl SourceDocumentKind {
    pub fn causation(&self) -> CausationType {
        match self {
            SourceDocumentKind::PurchaseOrder => CausationType::Ocm,
            SourceDocumentKind::ProductionOrder => CausationType::Op,
        }
    }

    /// Document kind whose lots are linked by transactions of `causation`, if any.
    pub fn for_causation(causation: CausationType) -> Option<Self> {
        match causation {
            CausationType::Ocm => Some(SourceDocumentKind::PurchaseOrder),
            CausationType::Op => Some(SourceDocumentKind::ProductionOrder),
            _ => None,
        }
    }
}

impl fmt::Display for SourceDocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDocumentKind::PurchaseOrder => f.write_str("purchase order"),
            SourceDocumentKind::ProductionOrder => f.write_str("production order"),
        }
    }
}

/// Batch data for a lot created alongside a movement. Missing fields are generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLot {
    pub batch_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSelection {
    /// Reuse a lot that must already exist.
    Existing(i32),
    New(NewLot),
}

impl Default for LotSelection {
    fn default() -> Self {
        LotSelection::New(NewLot::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLine {
    pub product_id: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub warehouse: Warehouse,
    #[serde(default)]
    pub lot: LotSelection,
    pub reason: Option<String>,
    pub production_area_id: Option<i32>,
}

impl MovementLine {
    pub fn new(product_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            warehouse: Warehouse::General,
            lot: LotSelection::default(),
            reason: None,
            production_area_id: None,
        }
    }

    pub fn in_warehouse(mut self, warehouse: Warehouse) -> Self {
        self.warehouse = warehouse;
        self
    }

    pub fn with_lot(mut self, lot_id: i32) -> Self {
        self.lot = LotSelection::Existing(lot_id);
        self
    }

    pub fn with_new_lot(mut self, new_lot: NewLot) -> Self {
        self.lot = LotSelection::New(new_lot);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn in_production_area(mut self, area_id: i32) -> Self {
        self.production_area_id = Some(area_id);
        self
    }

    pub fn movement_type(&self) -> MovementType {
        MovementType::resolve(self.reason.as_deref(), self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Observer/approver recorded on the transaction.
    pub username: Option<String>,
    pub responsible_users: Vec<String>,
    pub notes: Option<String>,
    pub support_document_url: Option<String>,
    /// Backdated effective time; defaults to now.
    pub occurred_at: Option<DateTime<Utc>>,
}

impl EventMetadata {
    pub fn by(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Direct cost override applied in the same unit of work as the movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostOverride {
    pub product_id: String,
    pub new_cost: Decimal,
}

/// Typed business event that becomes exactly one warehouse transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausationEvent {
    pub causation: CausationType,
    pub causation_id: i32,
    pub lines: Vec<MovementLine>,
    pub metadata: EventMetadata,
    #[serde(default)]
    pub cost_overrides: Vec<CostOverride>,
}

impl CausationEvent {
    pub fn new(causation: CausationType, causation_id: i32, lines: Vec<MovementLine>) -> Self {
        Self {
            causation,
            causation_id,
            lines,
            metadata: EventMetadata::default(),
            cost_overrides: Vec::new(),
        }
    }

    /// Manual adjustment of on-hand stock. `causation_id` is the adjustment document number.
    pub fn adjustment(causation_id: i32, lines: Vec<MovementLine>) -> Self {
        Self::new(CausationType::Oaa, causation_id, lines)
    }

    /// Moves `quantity` of a product (and lot) from one warehouse to another.
    pub fn transfer(
        causation_id: i32,
        product_id: &str,
        lot_id: i32,
        quantity: Decimal,
        from: Warehouse,
        to: Warehouse,
    ) -> Self {
        let outbound = MovementLine::new(product_id, -quantity.abs())
            .in_warehouse(from)
            .with_lot(lot_id)
            .with_reason(MovementType::Consumption.as_str());
        let inbound = MovementLine::new(product_id, quantity.abs())
            .in_warehouse(to)
            .with_lot(lot_id)
            .with_reason(MovementType::Purchase.as_str());
        Self::new(CausationType::Ota, causation_id, vec![outbound, inbound])
    }

    /// Completion of a production order: inputs consumed, output backflushed into a new lot
    /// linked to the order, scrap written off as a loss against its production area.
    pub fn production(production_order_id: i32, run: ProductionRun) -> Self {
        let mut lines: Vec<MovementLine> = run
            .consumed
            .into_iter()
            .map(|(product_id, lot_id, qty)| {
                MovementLine::new(product_id, -qty.abs())
                    .with_lot(lot_id)
                    .with_reason(MovementType::Consumption.as_str())
            })
            .collect();
        lines.push(
            MovementLine::new(run.output_product_id.clone(), run.output_quantity.abs())
                .with_new_lot(run.output_lot)
                .with_reason(MovementType::Backflush.as_str()),
        );
        for scrap in run.scrap {
            lines.push(
                MovementLine::new(scrap.product_id, -scrap.quantity.abs())
                    .with_lot(scrap.lot_id)
                    .with_reason(MovementType::Loss.as_str())
                    .in_production_area(scrap.production_area_id),
            );
        }
        Self::new(CausationType::Op, production_order_id, lines)
    }

    /// Dispensing of stock out of GENERAL (always outbound).
    pub fn dispensing(causation_id: i32, lines: Vec<(String, i32, Decimal)>) -> Self {
        let lines = lines
            .into_iter()
            .map(|(product_id, lot_id, qty)| {
                MovementLine::new(product_id, -qty.abs())
                    .with_lot(lot_id)
                    .with_reason(MovementType::Sale.as_str())
            })
            .collect();
        Self::new(CausationType::Od, causation_id, lines)
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_cost_override(mut self, product_id: impl Into<String>, new_cost: Decimal) -> Self {
        self.cost_overrides.push(CostOverride {
            product_id: product_id.into(),
            new_cost,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapLine {
    pub product_id: String,
    pub lot_id: i32,
    pub quantity: Decimal,
    pub production_area_id: i32,
}

/// Outcome of a production run, expressed in stock terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRun {
    /// (input product, lot consumed, quantity)
    pub consumed: Vec<(String, i32, Decimal)>,
    pub output_product_id: String,
    pub output_quantity: Decimal,
    pub output_lot: NewLot,
    pub scrap: Vec<ScrapLine>,
}

/// A persisted transaction with its movements (ordered by id) and responsible users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub transaction: warehouse_transaction::Model,
    pub movements: Vec<movement::Model>,
    pub lots_created: Vec<lot::Model>,
    pub responsible_users: Vec<String>,
}

impl TransactionRecord {
    pub fn id(&self) -> i32 {
        self.transaction.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_builds_one_outbound_and_one_inbound_line() {
        let event = CausationEvent::transfer(
            7,
            "MP-1",
            3,
            dec!(12),
            Warehouse::General,
            Warehouse::QualityHold,
        );
        assert_eq!(event.causation, CausationType::Ota);
        assert_eq!(event.lines.len(), 2);
        assert_eq!(event.lines[0].quantity, dec!(-12));
        assert_eq!(event.lines[0].warehouse, Warehouse::General);
        assert_eq!(event.lines[1].quantity, dec!(12));
        assert_eq!(event.lines[1].warehouse, Warehouse::QualityHold);
        assert_eq!(event.lines[1].lot, LotSelection::Existing(3));
    }

    #[test]
    fn production_run_consumes_backflushes_and_scraps() {
        let event = CausationEvent::production(
            11,
            ProductionRun {
                consumed: vec![("MP-1".into(), 1, dec!(4))],
                output_product_id: "PT-1".into(),
                output_quantity: dec!(2),
                output_lot: NewLot::default(),
                scrap: vec![ScrapLine {
                    product_id: "MP-1".into(),
                    lot_id: 1,
                    quantity: dec!(0.5),
                    production_area_id: 9,
                }],
            },
        );
        let types: Vec<_> = event.lines.iter().map(|l| l.movement_type()).collect();
        assert_eq!(
            types,
            vec![
                MovementType::Consumption,
                MovementType::Backflush,
                MovementType::Loss
            ]
        );
        assert_eq!(event.lines[2].quantity, dec!(-0.5));
        assert_eq!(event.lines[2].production_area_id, Some(9));
    }

    #[test]
    fn document_kinds_map_to_causations() {
        assert_eq!(
            SourceDocumentKind::for_causation(CausationType::Op),
            Some(SourceDocumentKind::ProductionOrder)
        );
        assert_eq!(SourceDocumentKind::for_causation(CausationType::Cm), None);
        assert_eq!(SourceDocumentKind::PurchaseOrder.causation(), CausationType::Ocm);
    }
}
