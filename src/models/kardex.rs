use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kardex request. Page and size are normalized by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexQuery {
    pub product_id: String,
    pub start_date: NaiveDate,
    /// Inclusive through the end of the day.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
}

impl KardexQuery {
    pub fn new(product_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            product_id: product_id.into(),
            start_date,
            end_date,
            page: None,
            size: None,
        }
    }

    pub fn page(mut self, page: i64, size: i64) -> Self {
        self.page = Some(page);
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexRow {
    pub movement_id: i32,
    pub transaction_id: i32,
    pub occurred_at: DateTime<Utc>,
    pub movement_type: String,
    pub warehouse: String,
    pub quantity: Decimal,
    /// max(0, quantity)
    pub entrada: Decimal,
    /// max(0, -quantity)
    pub salida: Decimal,
    pub balance: Decimal,
    pub lot_id: Option<i32>,
    pub batch_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexPage {
    pub product_id: String,
    pub product_name: String,
    pub unit_of_measure: String,
    pub opening_balance: Decimal,
    pub rows: Vec<KardexRow>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

/// Whole range without pagination, for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexExport {
    pub product_id: String,
    pub product_name: String,
    pub unit_of_measure: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub rows: Vec<KardexRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: String,
    pub product_name: String,
    pub unit_of_measure: String,
    pub quantity: Decimal,
    pub cost: Decimal,
}
