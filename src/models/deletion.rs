use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::causation::{SourceDocumentKind, TransactionRecord};
use crate::entities::lot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub kind: SourceDocumentKind,
    pub id: i32,
    pub status: String,
    /// Supplier for purchase orders, produced product for production orders.
    pub counterpart: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItemSummary {
    pub id: i32,
    pub product_id: String,
    pub quantity: Decimal,
}

/// Everything that hangs off a source document, gathered before deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub document: DocumentSummary,
    pub line_items: Vec<LineItemSummary>,
    pub lots: Vec<lot::Model>,
    pub transactions: Vec<TransactionRecord>,
    pub journal_entries: Vec<i64>,
    pub deletable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub kind: SourceDocumentKind,
    pub id: i32,
    pub lots_detached: u64,
    pub line_items_deleted: u64,
}
