use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::entities::{movement::MovementType, purchase_order, warehouse_transaction::CausationType};
use crate::errors::ServiceError;
use crate::events::{publish, EventSender, LedgerEvent};
use crate::models::{
    CausationEvent, EventMetadata, MovementLine, NewLot, TransactionRecord,
};
use crate::repositories::{DocumentRepository, LedgerRepository, ProductRepository};
use crate::services::cost_cascade::{CascadeReport, CostCascade};
use crate::services::journal::JournalEntryService;
use crate::services::product_locks::ProductLocks;
use crate::services::transaction_builder::{publish_cost_changes, TransactionBuilder};

/// One received line of a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub batch_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

impl ReceiptLine {
    pub fn new(product_id: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
            batch_number: None,
            production_date: None,
            expiration_date: None,
        }
    }

    pub fn with_batch(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceiptOutcome {
    pub record: TransactionRecord,
    pub cascades: Vec<CascadeReport>,
    pub amount: Decimal,
    /// Set when journal registration failed; the transaction then stays PENDING.
    pub journal_error: Option<String>,
}

/// Receives purchase orders into GENERAL and re-costs the received products.
pub struct PurchaseReceiptService {
    db: Arc<DatabaseConnection>,
    locks: Arc<ProductLocks>,
    builder: Arc<TransactionBuilder>,
    journal: Option<Arc<dyn JournalEntryService>>,
    event_sender: Option<EventSender>,
    max_conflict_retries: u32,
}

impl PurchaseReceiptService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: Arc<ProductLocks>,
        builder: Arc<TransactionBuilder>,
        journal: Option<Arc<dyn JournalEntryService>>,
        event_sender: Option<EventSender>,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            db,
            locks,
            builder,
            journal,
            event_sender,
            max_conflict_retries,
        }
    }

    #[instrument(skip(self, lines, metadata), fields(lines = lines.len()))]
    pub async fn receive(
        &self,
        purchase_order_id: i32,
        lines: Vec<ReceiptLine>,
        metadata: EventMetadata,
    ) -> Result<PurchaseReceiptOutcome, ServiceError> {
        validate_lines(&lines)?;
        let order = DocumentRepository::require_purchase_order(&*self.db, purchase_order_id).await?;
        let amount: Decimal = lines.iter().map(|l| l.quantity * l.unit_price).sum();

        let mut attempt = 0;
        let (record, cascades) = loop {
            let _guard = self.locks.acquire(lines.iter().map(|l| &l.product_id)).await;
            let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

            match self.apply(&txn, &order, &lines, &metadata).await {
                Ok(applied) => {
                    txn.commit().await.map_err(ServiceError::db_error)?;
                    break applied;
                }
                Err(e) if e.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, "Purchase receipt lost a cost update race, retrying: {}", e);
                }
                Err(e) => {
                    error!("Purchase receipt for order {} aborted: {}", purchase_order_id, e);
                    return Err(e);
                }
            }
        };

        info!(
            transaction_id = record.id(),
            purchase_order_id,
            %amount,
            "Purchase receipt recorded"
        );
        self.builder.publish_recorded(&record, &[]).await;
        publish_cost_changes(self.event_sender.as_ref(), &cascades).await;

        let (record, journal_error) = self.post_to_journal(record, &order, amount).await;
        Ok(PurchaseReceiptOutcome {
            record,
            cascades,
            amount,
            journal_error,
        })
    }

    /// Re-costs every line against the stock on hand before this receipt, then records the
    /// movements. Lines of the same product see the quantity of earlier lines.
    async fn apply<C: ConnectionTrait>(
        &self,
        db: &C,
        order: &purchase_order::Model,
        lines: &[ReceiptLine],
        metadata: &EventMetadata,
    ) -> Result<(TransactionRecord, Vec<CascadeReport>), ServiceError> {
        let mut received: HashMap<&str, Decimal> = HashMap::new();
        let mut cascades = Vec::with_capacity(lines.len());

        for line in lines {
            let product = ProductRepository::require(db, &line.product_id).await?;
            let stored = LedgerRepository::sum_signed_quantity(db, &product.id, None).await?;
            let already = received.get(line.product_id.as_str()).copied().unwrap_or_default();
            let on_hand = stored + already;

            cascades.push(
                CostCascade::apply_purchase(db, &product, on_hand, line.unit_price, line.quantity)
                    .await?,
            );
            *received.entry(line.product_id.as_str()).or_default() += line.quantity;
        }

        let movement_lines = lines
            .iter()
            .map(|line| {
                MovementLine::new(line.product_id.clone(), line.quantity)
                    .with_reason(MovementType::Purchase.as_str())
                    .with_new_lot(NewLot {
                        batch_number: line.batch_number.clone(),
                        production_date: line.production_date,
                        expiration_date: line.expiration_date,
                    })
            })
            .collect();
        let event = CausationEvent::new(CausationType::Ocm, order.id, movement_lines)
            .with_metadata(metadata.clone());

        let (record, _) = self.builder.record_in(db, event).await?;
        Ok((record, cascades))
    }

    /// Journal failures never undo the committed receipt.
    async fn post_to_journal(
        &self,
        mut record: TransactionRecord,
        order: &purchase_order::Model,
        amount: Decimal,
    ) -> (TransactionRecord, Option<String>) {
        let Some(journal) = &self.journal else {
            return (record, None);
        };

        let reference = match journal
            .register_entry_for_purchase_receipt(&record, order, amount)
            .await
        {
            Ok(reference) => reference,
            Err(e) => {
                let failure = ServiceError::ExternalServiceError(e.to_string());
                warn!(
                    transaction_id = record.id(),
                    "Journal entry registration failed; transaction stays PENDING: {}", failure
                );
                return (record, Some(failure.to_string()));
            }
        };

        match LedgerRepository::mark_posted(&*self.db, record.id(), reference).await {
            Ok(posted) => {
                record.transaction = posted;
                publish(
                    self.event_sender.as_ref(),
                    LedgerEvent::TransactionPosted {
                        transaction_id: record.id(),
                        journal_entry_id: reference,
                    },
                )
                .await;
                (record, None)
            }
            Err(e) => {
                error!(
                    transaction_id = record.id(),
                    journal_entry_id = reference,
                    "Journal entry registered but the transaction could not be marked POSTED: {}",
                    e
                );
                (record, Some(e.to_string()))
            }
        }
    }
}

fn validate_lines(lines: &[ReceiptLine]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::InvariantViolation(
            "a purchase receipt needs at least one line".to_string(),
        ));
    }
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "received quantity of {} must be positive",
                line.product_id
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "unit price of {} must not be negative",
                line.product_id
            )));
        }
    }
    Ok(())
}
