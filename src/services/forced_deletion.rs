use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{publish, EventSender, LedgerEvent};
use crate::models::{DeletionOutcome, DependencyReport, SourceDocumentKind};
use crate::repositories::{
    DocumentRepository, LedgerRepository, LotRepository, SettingsRepository,
};

/// Two-phase removal of purchase and production orders.
pub struct ForcedDeletionService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl ForcedDeletionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Read-only impact report.
    #[instrument(skip(self))]
    pub async fn study(
        &self,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<DependencyReport, ServiceError> {
        Self::study_in(&*self.db, kind, id).await
    }

    async fn study_in<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<DependencyReport, ServiceError> {
        let (document, line_items) = DocumentRepository::summary(db, kind, id)
            .await?
            .ok_or(ServiceError::DocumentNotFound { kind, id })?;
        let lots = LotRepository::find_by_source_document(db, kind, id).await?;
        let transactions = LedgerRepository::find_by_causation(db, kind.causation(), id).await?;
        let journal_entries: BTreeSet<i64> = transactions
            .iter()
            .filter_map(|t| t.transaction.journal_entry_id)
            .collect();

        Ok(DependencyReport {
            deletable: transactions.is_empty(),
            document,
            line_items,
            lots,
            transactions,
            journal_entries: journal_entries.into_iter().collect(),
        })
    }

    /// Deletes the document when no warehouse transaction was caused by it. The check and
    /// every write share one unit of work.
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<DeletionOutcome, ServiceError> {
        let settings = SettingsRepository::current(&*self.db).await?;
        if !settings.forced_deletion_enabled {
            return Err(ServiceError::Forbidden(
                "forced deletion of source documents is disabled".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        if DocumentRepository::summary(&txn, kind, id).await?.is_none() {
            return Err(ServiceError::DocumentNotFound { kind, id });
        }
        let count = LedgerRepository::count_by_causation(&txn, kind.causation(), id).await?;
        if count > 0 {
            warn!(transactions = count, "Refusing to delete {} {}", kind, id);
            return Err(ServiceError::HasLedgerDependencies {
                kind,
                id,
                count: count as usize,
            });
        }

        let outcome = match Self::delete_in(&txn, kind, id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Deletion of {} {} aborted: {}", kind, id, e);
                return Err(e);
            }
        };
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            lots_detached = outcome.lots_detached,
            line_items_deleted = outcome.line_items_deleted,
            "Deleted {} {}",
            kind,
            id
        );
        publish(
            self.event_sender.as_ref(),
            LedgerEvent::SourceDocumentDeleted {
                kind,
                id,
                lots_detached: outcome.lots_detached,
            },
        )
        .await;
        Ok(outcome)
    }

    async fn delete_in<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<DeletionOutcome, ServiceError> {
        let lots_detached = LotRepository::detach_from_source_document(db, kind, id).await?;
        let line_items_deleted = DocumentRepository::delete_line_items(db, kind, id).await?;
        DocumentRepository::delete_document(db, kind, id).await?;
        Ok(DeletionOutcome {
            kind,
            id,
            lots_detached,
            line_items_deleted,
        })
    }
}
