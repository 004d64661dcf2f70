use chrono::{Months, NaiveDate, Utc};
use rand::Rng;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::config::LedgerConfig;
use crate::entities::{lot, movement::Warehouse, product, warehouse_transaction::CausationType};
use crate::errors::ServiceError;
use crate::events::{publish, EventSender, LedgerEvent};
use crate::models::{CausationEvent, LotSelection, NewLot, SourceDocumentKind, TransactionRecord};
use crate::repositories::{
    LedgerRepository, LotRepository, NewLotRecord, NewMovement, NewTransaction,
    ProductRepository, SettingsRepository,
};
use crate::services::cost_cascade::{CascadeReport, CostCascade};
use crate::services::product_locks::ProductLocks;

const MAX_BATCH_NUMBER_ATTEMPTS: usize = 16;

/// How lots are synthesized when a movement does not name one.
#[derive(Debug, Clone)]
pub struct LotPolicy {
    pub default_prefix: String,
    pub shelf_life_months: u32,
}

impl LotPolicy {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            default_prefix: config.default_lot_prefix.clone(),
            shelf_life_months: config.generated_lot_shelf_life_months,
        }
    }

    /// `<prefix>-<YYYYMMDD>-<4 digits>`
    pub fn batch_number(prefix: &str, date: NaiveDate, serial: u16) -> String {
        format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), serial % 10_000)
    }

    pub fn expiration_for(&self, production_date: NaiveDate) -> Option<NaiveDate> {
        production_date.checked_add_months(Months::new(self.shelf_life_months))
    }

    /// Creates the lot for one movement. Explicit batch data wins over generated values.
    pub async fn create_lot<C: ConnectionTrait>(
        &self,
        db: &C,
        product: &product::Model,
        requested: NewLot,
        source: Option<(SourceDocumentKind, i32)>,
        today: NaiveDate,
    ) -> Result<lot::Model, ServiceError> {
        let batch_number = match requested.batch_number {
            Some(batch) => {
                if LotRepository::batch_number_exists(db, &batch).await? {
                    return Err(ServiceError::ValidationError(format!(
                        "batch number {} already exists",
                        batch
                    )));
                }
                batch
            }
            None => {
                let prefix = product
                    .lot_prefix
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or(&self.default_prefix);
                self.unused_batch_number(db, prefix, today).await?
            }
        };

        let production_date = requested.production_date.unwrap_or(today);
        let expiration_date = requested
            .expiration_date
            .or_else(|| self.expiration_for(production_date));

        LotRepository::create(
            db,
            NewLotRecord {
                batch_number,
                production_date: Some(production_date),
                expiration_date,
                source,
                created_at: Utc::now(),
            },
        )
        .await
    }

    async fn unused_batch_number<C: ConnectionTrait>(
        &self,
        db: &C,
        prefix: &str,
        today: NaiveDate,
    ) -> Result<String, ServiceError> {
        for _ in 0..MAX_BATCH_NUMBER_ATTEMPTS {
            let serial = rand::thread_rng().gen_range(0..10_000u16);
            let candidate = Self::batch_number(prefix, today, serial);
            if !LotRepository::batch_number_exists(db, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(ServiceError::InternalError(format!(
            "no free batch number for prefix {} on {}",
            prefix, today
        )))
    }
}

/// Turns causation events into persisted warehouse transactions.
pub struct TransactionBuilder {
    db: Arc<DatabaseConnection>,
    locks: Arc<ProductLocks>,
    lot_policy: LotPolicy,
    event_sender: Option<EventSender>,
}

impl TransactionBuilder {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: Arc<ProductLocks>,
        config: &LedgerConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            locks,
            lot_policy: LotPolicy::from_config(config),
            event_sender,
        }
    }

    pub fn lot_policy(&self) -> &LotPolicy {
        &self.lot_policy
    }

    /// Records one event as one atomic transaction: every movement, lot and cost override
    /// becomes visible together or not at all.
    #[instrument(skip(self, event), fields(causation = event.causation.as_str(), causation_id = event.causation_id))]
    pub async fn record(&self, event: CausationEvent) -> Result<TransactionRecord, ServiceError> {
        // Purchases must go through the weighted-average costing of the receipt flow.
        if event.causation == CausationType::Ocm {
            return Err(ServiceError::InvariantViolation(
                "purchase receipts must be recorded through PurchaseReceiptService::receive"
                    .to_string(),
            ));
        }
        if event.causation == CausationType::Oaa {
            let settings = SettingsRepository::current(&*self.db).await?;
            if !settings.adjustments_enabled {
                return Err(ServiceError::Forbidden(
                    "manual inventory adjustments are disabled".to_string(),
                ));
            }
        }

        let touched: BTreeSet<String> = event
            .lines
            .iter()
            .map(|l| l.product_id.clone())
            .chain(event.cost_overrides.iter().map(|o| o.product_id.clone()))
            .collect();
        let _guard = self.locks.acquire(&touched).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let (record, cascades) = match self.record_in(&txn, event).await {
            Ok(built) => built,
            Err(e) => {
                error!("Warehouse transaction aborted: {}", e);
                return Err(e);
            }
        };
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            transaction_id = record.id(),
            movements = record.movements.len(),
            "Warehouse transaction recorded"
        );
        self.publish_recorded(&record, &cascades).await;
        Ok(record)
    }

    /// Builds the transaction inside the caller's unit of work. The caller holds the product
    /// locks and commits.
    pub async fn record_in<C: ConnectionTrait>(
        &self,
        db: &C,
        event: CausationEvent,
    ) -> Result<(TransactionRecord, Vec<CascadeReport>), ServiceError> {
        let warehouses: Vec<Warehouse> = event.lines.iter().map(|l| l.warehouse).collect();
        event
            .causation
            .validate_warehouses(&warehouses)
            .map_err(ServiceError::InvariantViolation)?;

        let occurred_at = event.metadata.occurred_at.unwrap_or_else(Utc::now);
        let today = occurred_at.date_naive();
        let source =
            SourceDocumentKind::for_causation(event.causation).map(|kind| (kind, event.causation_id));

        let mut movements = Vec::with_capacity(event.lines.len());
        let mut lots_created = Vec::new();
        for line in event.lines {
            let product = ProductRepository::require(db, &line.product_id).await?;
            let movement_type = line.movement_type();

            let lot_id = match line.lot {
                LotSelection::Existing(lot_id) => {
                    LotRepository::find_by_id(db, lot_id)
                        .await?
                        .ok_or(ServiceError::LotNotFound(lot_id))?
                        .id
                }
                LotSelection::New(requested) => {
                    let lot = self
                        .lot_policy
                        .create_lot(db, &product, requested, source, today)
                        .await?;
                    let id = lot.id;
                    lots_created.push(lot);
                    id
                }
            };

            movements.push(NewMovement {
                product_id: product.id,
                quantity: line.quantity,
                warehouse: line.warehouse,
                movement_type,
                lot_id: Some(lot_id),
                production_area_id: line.production_area_id,
            });
        }

        let metadata = event.metadata;
        let (transaction, movements) = LedgerRepository::save(
            db,
            NewTransaction {
                causation: event.causation,
                causation_id: event.causation_id,
                accounting_state: event.causation.initial_accounting_state(),
                support_document_url: metadata.support_document_url,
                notes: metadata.notes,
                approved_by: metadata.username,
                responsible_users: metadata.responsible_users.clone(),
                created_at: occurred_at,
                movements,
            },
        )
        .await?;

        let mut cascades = Vec::with_capacity(event.cost_overrides.len());
        for cost_override in event.cost_overrides {
            let product = ProductRepository::require(db, &cost_override.product_id).await?;
            cascades.push(CostCascade::apply_override(db, &product, cost_override.new_cost).await?);
        }

        Ok((
            TransactionRecord {
                transaction,
                movements,
                lots_created,
                responsible_users: metadata.responsible_users,
            },
            cascades,
        ))
    }

    pub(crate) async fn publish_recorded(
        &self,
        record: &TransactionRecord,
        cascades: &[CascadeReport],
    ) {
        publish(
            self.event_sender.as_ref(),
            LedgerEvent::TransactionRecorded {
                transaction_id: record.id(),
                causation_type: record.transaction.causation_type.clone(),
                causation_id: record.transaction.causation_id,
                movements: record.movements.len(),
            },
        )
        .await;
        publish_cost_changes(self.event_sender.as_ref(), cascades).await;
    }
}

pub(crate) async fn publish_cost_changes(sender: Option<&EventSender>, cascades: &[CascadeReport]) {
    for change in cascades.iter().flat_map(|c| c.all_changes()) {
        publish(
            sender,
            LedgerEvent::CostUpdated {
                product_id: change.product_id.clone(),
                old_cost: change.old_cost,
                new_cost: change.new_cost,
            },
        )
        .await;
    }
}
