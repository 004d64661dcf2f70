use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::entities::{
    movement::MovementType, product::ProductKind, warehouse_transaction::CausationType,
};
use crate::errors::ServiceError;
use crate::events::{publish, EventSender, LedgerEvent};
use crate::models::{
    BulkReconciliationReport, BulkRow, BulkTemplateRow, CausationEvent, EventMetadata,
    MovementLine, RowError,
};
use crate::repositories::{LedgerRepository, ProductRepository, SettingsRepository};
use crate::services::cost_cascade::{CascadeReport, CostCascade};
use crate::services::product_locks::ProductLocks;
use crate::services::transaction_builder::{publish_cost_changes, TransactionBuilder};

pub const BULK_LOAD_NOTES: &str = "Carga masiva de inventario";

/// What a single row contributed once its savepoint committed.
struct RowOutcome {
    product_id: String,
    delta: Option<Decimal>,
    cascade: Option<CascadeReport>,
}

/// Turns declared absolute stock levels into one CM transaction plus cost overrides.
pub struct BulkReconciliationService {
    db: Arc<DatabaseConnection>,
    locks: Arc<ProductLocks>,
    builder: Arc<TransactionBuilder>,
    event_sender: Option<EventSender>,
    sentinels: Vec<Decimal>,
}

impl BulkReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: Arc<ProductLocks>,
        builder: Arc<TransactionBuilder>,
        config: &LedgerConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            locks,
            builder,
            event_sender,
            sentinels: config
                .bulk_quantity_sentinels
                .iter()
                .map(|s| Decimal::from(*s))
                .collect(),
        }
    }

    /// Blank and sentinel quantities leave stock untouched.
    pub fn requested_quantity(&self, declared: Option<Decimal>) -> Option<Decimal> {
        declared.filter(|q| !self.sentinels.contains(q))
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn reconcile(
        &self,
        rows: Vec<BulkRow>,
        username: &str,
    ) -> Result<BulkReconciliationReport, ServiceError> {
        let settings = SettingsRepository::current(&*self.db).await?;
        if !settings.bulk_load_enabled {
            return Err(ServiceError::Forbidden("bulk inventory loads are disabled".to_string()));
        }

        let _guard = self
            .locks
            .acquire(rows.iter().map(|r| r.product_id.trim()))
            .await;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let mut report = BulkReconciliationReport::default();
        let mut pending: HashMap<String, Decimal> = HashMap::new();
        let mut lines = Vec::new();
        let mut cascades = Vec::new();

        for row in &rows {
            let savepoint = txn.begin().await.map_err(ServiceError::db_error)?;
            let outcome = match self.reconcile_row(&savepoint, row, &pending).await {
                Ok(outcome) => {
                    savepoint.commit().await.map_err(ServiceError::db_error)?;
                    outcome
                }
                Err(e) => {
                    // Dropping the savepoint rolls back whatever the row wrote.
                    drop(savepoint);
                    warn!(row = row.row_number, product_id = %row.product_id, "Bulk row rejected: {}", e);
                    report.failure_count += 1;
                    report.errors.push(RowError {
                        row_number: row.row_number,
                        product_id: row.product_id.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if outcome.delta.is_none() && outcome.cascade.is_none() {
                report.unchanged_count += 1;
                continue;
            }
            report.success_count += 1;
            if let Some(delta) = outcome.delta {
                *pending.entry(outcome.product_id.clone()).or_default() += delta;
                lines.push(
                    MovementLine::new(outcome.product_id, delta)
                        .with_reason(MovementType::Purchase.as_str()),
                );
            }
            if let Some(cascade) = outcome.cascade {
                report.cost_overrides += 1;
                cascades.push(cascade);
            }
        }

        let mut record = None;
        if !lines.is_empty() {
            report.adjustment_lines = lines.len();
            let causation_id = LedgerRepository::next_causation_id(&txn, CausationType::Cm).await?;
            let event = CausationEvent::new(CausationType::Cm, causation_id, lines)
                .with_metadata(EventMetadata::by(username).with_notes(BULK_LOAD_NOTES));
            match self.builder.record_in(&txn, event).await {
                Ok((built, _)) => {
                    report.transaction_id = Some(built.id());
                    record = Some(built);
                }
                Err(e) => {
                    error!("Bulk load transaction aborted: {}", e);
                    return Err(e);
                }
            }
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            success = report.success_count,
            unchanged = report.unchanged_count,
            failures = report.failure_count,
            transaction_id = ?report.transaction_id,
            "Bulk reconciliation committed"
        );
        if let Some(record) = &record {
            self.builder.publish_recorded(record, &[]).await;
        }
        publish_cost_changes(self.event_sender.as_ref(), &cascades).await;
        publish(
            self.event_sender.as_ref(),
            LedgerEvent::BulkReconciled {
                transaction_id: report.transaction_id,
                success_count: report.success_count,
                failure_count: report.failure_count,
            },
        )
        .await;
        Ok(report)
    }

    async fn reconcile_row<C: ConnectionTrait>(
        &self,
        db: &C,
        row: &BulkRow,
        pending: &HashMap<String, Decimal>,
    ) -> Result<RowOutcome, ServiceError> {
        let product = ProductRepository::require(db, row.product_id.trim()).await?;
        if product.product_kind() != ProductKind::Material || !product.inventoriable {
            return Err(ServiceError::ValidationError(format!(
                "product {} is not an inventoriable raw material",
                product.id
            )));
        }

        let delta = match self.requested_quantity(row.declared_quantity) {
            Some(declared) if declared < Decimal::ZERO => {
                return Err(ServiceError::ValidationError(format!(
                    "declared quantity {} is negative",
                    declared
                )));
            }
            Some(declared) => {
                let stored = LedgerRepository::sum_signed_quantity(db, &product.id, None).await?;
                let actual = stored + pending.get(&product.id).copied().unwrap_or_default();
                Some(declared - actual).filter(|d| !d.is_zero())
            }
            None => None,
        };

        let cascade = match row.declared_new_cost {
            Some(cost) if cost > Decimal::ZERO && cost != product.cost => {
                Some(CostCascade::apply_override(db, &product, cost).await?)
            }
            _ => None,
        };

        Ok(RowOutcome {
            product_id: product.id,
            delta,
            cascade,
        })
    }

    /// Current state of every inventoriable material, for filling in a bulk file.
    pub async fn template_rows(&self) -> Result<Vec<BulkTemplateRow>, ServiceError> {
        let materials = ProductRepository::list_inventoriable_materials(&*self.db).await?;
        let mut rows = Vec::with_capacity(materials.len());
        for product in materials {
            let consolidated_quantity =
                LedgerRepository::sum_signed_quantity(&*self.db, &product.id, None).await?;
            rows.push(BulkTemplateRow {
                product_id: product.id,
                name: product.name,
                cost: product.cost,
                consolidated_quantity,
            });
        }
        Ok(rows)
    }
}
