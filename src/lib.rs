//! Planta Ledger
//!
//! Warehouse ledger core for a manufacturing plant: atomic multi-line inventory transactions,
//! weighted-average costing cascaded through the bill of materials, a paginated running-balance
//! Kardex, bulk reconciliation of declared stock and guarded deletion of source documents.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tabular;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::events::EventSender;
use crate::services::{
    BulkReconciliationService, ForcedDeletionService, JournalEntryService, KardexService,
    ProductLocks, PurchaseReceiptService, TransactionBuilder,
};

pub use crate::errors::{ErrorKind, ServiceError};

/// Every ledger service wired over one pool and one set of product locks.
#[derive(Clone)]
pub struct LedgerServices {
    pub db: Arc<DatabaseConnection>,
    pub locks: Arc<ProductLocks>,
    pub transactions: Arc<TransactionBuilder>,
    pub purchase_receipts: Arc<PurchaseReceiptService>,
    pub kardex: Arc<KardexService>,
    pub bulk: Arc<BulkReconciliationService>,
    pub deletion: Arc<ForcedDeletionService>,
}

impl LedgerServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &LedgerConfig,
        journal: Option<Arc<dyn JournalEntryService>>,
        event_sender: Option<EventSender>,
    ) -> Self {
        let locks = Arc::new(ProductLocks::new());
        let transactions = Arc::new(TransactionBuilder::new(
            db.clone(),
            locks.clone(),
            config,
            event_sender.clone(),
        ));

        Self {
            purchase_receipts: Arc::new(PurchaseReceiptService::new(
                db.clone(),
                locks.clone(),
                transactions.clone(),
                journal,
                event_sender.clone(),
                config.max_conflict_retries,
            )),
            kardex: Arc::new(KardexService::new(db.clone(), config)),
            bulk: Arc::new(BulkReconciliationService::new(
                db.clone(),
                locks.clone(),
                transactions.clone(),
                config,
                event_sender.clone(),
            )),
            deletion: Arc::new(ForcedDeletionService::new(db.clone(), event_sender)),
            transactions,
            locks,
            db,
        }
    }
}
