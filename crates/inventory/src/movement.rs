use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryRecordId, MovementId};

/// Reason recorded for reservation movements.
pub const RESERVATION: &str = "RESERVATION";

/// Reason recorded for release movements.
pub const RELEASE: &str = "RELEASE";

/// Append-only audit row, one per movement-tracked mutation.
///
/// `delta` is signed. Reservations are recorded as negative movements against
/// *available* stock (on-hand quantity is untouched), releases as positive ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: MovementId,
    pub record_id: InventoryRecordId,
    pub delta: i64,
    pub reason: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        record_id: InventoryRecordId,
        delta: i64,
        reason: impl Into<String>,
        reference: Option<String>,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            record_id,
            delta,
            reason: reason.into(),
            reference,
            notes,
            occurred_at,
        }
    }

    pub fn is_reservation(&self) -> bool {
        self.reason == RESERVATION
    }

    pub fn is_release(&self) -> bool {
        self.reason == RELEASE
    }
}
