use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One declared row of a bulk load. Blank cells arrive as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRow {
    /// 1-based row number in the source, reported back on failure.
    pub row_number: usize,
    pub product_id: String,
    pub declared_quantity: Option<Decimal>,
    pub declared_new_cost: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub product_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReconciliationReport {
    /// Rows that produced a quantity delta or a cost override.
    pub success_count: usize,
    pub unchanged_count: usize,
    pub failure_count: usize,
    pub errors: Vec<RowError>,
    pub adjustment_lines: usize,
    pub cost_overrides: usize,
    pub transaction_id: Option<i32>,
}

/// Template row describing the current state of an inventoriable material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTemplateRow {
    pub product_id: String,
    pub name: String,
    pub cost: Decimal,
    pub consolidated_quantity: Decimal,
}
