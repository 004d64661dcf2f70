use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::SourceDocumentKind;

/// Notifications emitted after ledger writes commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionRecorded {
        transaction_id: i32,
        causation_type: String,
        causation_id: i32,
        movements: usize,
    },
    CostUpdated {
        product_id: String,
        old_cost: Decimal,
        new_cost: Decimal,
    },
    TransactionPosted {
        transaction_id: i32,
        journal_entry_id: i64,
    },
    BulkReconciled {
        transaction_id: Option<i32>,
        success_count: usize,
        failure_count: usize,
    },
    SourceDocumentDeleted {
        kind: SourceDocumentKind,
        id: i32,
        lots_detached: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<LedgerEvent>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<LedgerEvent>) -> Self {
        Self { sender }
    }

    /// Bounded channel plus its sender.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: LedgerEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Sends when a sender is configured. Ledger writes are already committed, so a closed
/// channel is only logged.
pub async fn publish(sender: Option<&EventSender>, event: LedgerEvent) {
    if let Some(sender) = sender {
        if let Err(e) = sender.send(event).await {
            warn!("{}", e);
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<LedgerEvent>) {
    info!("Starting ledger event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            LedgerEvent::TransactionRecorded {
                transaction_id,
                causation_type,
                causation_id,
                movements,
            } => info!(
                transaction_id,
                causation_type = %causation_type,
                causation_id,
                movements,
                "warehouse transaction recorded"
            ),
            LedgerEvent::CostUpdated {
                product_id,
                old_cost,
                new_cost,
            } => info!(
                product_id = %product_id,
                old_cost = %old_cost,
                new_cost = %new_cost,
                "product cost updated"
            ),
            other => info!(event = ?other, "ledger event"),
        }
    }

    info!("Ledger event channel closed");
}
