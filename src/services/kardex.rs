use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::LedgerConfig;
use crate::entities::{lot, movement};
use crate::errors::ServiceError;
use crate::models::{KardexExport, KardexPage, KardexQuery, KardexRow, ProductStock};
use crate::repositories::{LedgerRepository, LotRepository, ProductRepository};

/// Running-balance ledger view of one product.
pub struct KardexService {
    db: Arc<DatabaseConnection>,
    default_page_size: u64,
    max_page_size: u64,
}

impl KardexService {
    pub fn new(db: Arc<DatabaseConnection>, config: &LedgerConfig) -> Self {
        Self {
            db,
            default_page_size: config.kardex_default_page_size,
            max_page_size: config.kardex_max_page_size,
        }
    }

    /// Negative pages become 0, non-positive sizes the default, sizes above the cap the cap.
    pub fn normalize_page(&self, page: Option<i64>, size: Option<i64>) -> (u64, u64) {
        let page = page.filter(|p| *p > 0).unwrap_or(0) as u64;
        let size = size
            .filter(|s| *s > 0)
            .map(|s| s as u64)
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size);
        (page, size)
    }

    #[instrument(skip(self), fields(product_id = %query.product_id))]
    pub async fn page(&self, query: KardexQuery) -> Result<KardexPage, ServiceError> {
        let (from, to) = day_bounds(query.start_date, query.end_date)?;
        let (page, size) = self.normalize_page(query.page, query.size);

        // One snapshot for the opening balance, the page and the cursor sum.
        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::db_error)?;

        let product = ProductRepository::require(&txn, &query.product_id).await?;
        let opening_balance =
            LedgerRepository::sum_signed_quantity(&txn, &product.id, Some(from)).await?;
        let found =
            LedgerRepository::find_page_by_product_and_range(&txn, &product.id, from, to, page, size)
                .await?;

        let delta_before_page = match found.movements.first() {
            Some(first) if page > 0 => {
                LedgerRepository::sum_signed_quantity_in_range_before_cursor(
                    &txn,
                    &product.id,
                    from,
                    to,
                    first.created_at,
                    first.id,
                )
                .await?
            }
            _ => Decimal::ZERO,
        };

        let rows = build_rows(&txn, found.movements, opening_balance + delta_before_page).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        debug!(
            page,
            size,
            rows = rows.len(),
            total = found.total_items,
            "kardex page built"
        );
        Ok(KardexPage {
            product_id: product.id,
            product_name: product.name,
            unit_of_measure: product.unit_of_measure,
            opening_balance,
            rows,
            page,
            size,
            total_elements: found.total_items,
            total_pages: found.total_pages,
        })
    }

    /// Whole range in one pass.
    #[instrument(skip(self))]
    pub async fn export(
        &self,
        product_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<KardexExport, ServiceError> {
        let (from, to) = day_bounds(start_date, end_date)?;
        let txn = self
            .db
            .begin()
            .await
            .map_err(ServiceError::db_error)?;

        let product = ProductRepository::require(&txn, product_id).await?;
        let opening_balance =
            LedgerRepository::sum_signed_quantity(&txn, &product.id, Some(from)).await?;
        let movements =
            LedgerRepository::find_all_by_product_and_range(&txn, &product.id, from, to).await?;
        let rows = build_rows(&txn, movements, opening_balance).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        let closing_balance = rows.last().map(|r| r.balance).unwrap_or(opening_balance);
        Ok(KardexExport {
            product_id: product.id,
            product_name: product.name,
            unit_of_measure: product.unit_of_measure,
            start_date,
            end_date,
            opening_balance,
            closing_balance,
            rows,
        })
    }

    /// Consolidated on-hand quantity across every warehouse.
    pub async fn stock_of(&self, product_id: &str) -> Result<ProductStock, ServiceError> {
        let product = ProductRepository::require(&*self.db, product_id).await?;
        let quantity = LedgerRepository::sum_signed_quantity(&*self.db, &product.id, None).await?;
        Ok(ProductStock {
            product_id: product.id,
            product_name: product.name,
            unit_of_measure: product.unit_of_measure,
            quantity,
            cost: product.cost,
        })
    }
}

/// `[start 00:00:00, end 23:59:59.999999999]` in UTC.
pub fn day_bounds(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    if end < start {
        return Err(ServiceError::InvalidRange { start, end });
    }
    let from = start
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ServiceError::InternalError(format!("no midnight on {}", start)))?;
    let to = end
        .and_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| ServiceError::InternalError(format!("no end of day on {}", end)))?;
    Ok((Utc.from_utc_datetime(&from), Utc.from_utc_datetime(&to)))
}

async fn build_rows<C: ConnectionTrait>(
    db: &C,
    movements: Vec<movement::Model>,
    starting_balance: Decimal,
) -> Result<Vec<KardexRow>, ServiceError> {
    let lot_ids: Vec<i32> = movements.iter().filter_map(|m| m.lot_id).collect();
    let lots = LotRepository::find_by_ids(db, lot_ids).await?;

    let mut balance = starting_balance;
    Ok(movements
        .into_iter()
        .map(|m| {
            balance += m.quantity;
            let lot: Option<&lot::Model> = m.lot_id.and_then(|id| lots.get(&id));
            KardexRow {
                movement_id: m.id,
                transaction_id: m.transaction_id,
                occurred_at: m.created_at,
                movement_type: m.movement_type,
                warehouse: m.warehouse,
                quantity: m.quantity,
                entrada: m.quantity.max(Decimal::ZERO),
                salida: (-m.quantity).max(Decimal::ZERO),
                balance,
                lot_id: m.lot_id,
                batch_number: lot.map(|l| l.batch_number.clone()),
                production_date: lot.and_then(|l| l.production_date),
                expiration_date: lot.and_then(|l| l.expiration_date),
            }
        })
        .collect())
}
