//! Inventory coordinator: the only entry point that mutates inventory.
//!
//! ## Mutation Flow
//!
//! Every mutating operation runs the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Open a ledger transaction
//!   ↓
//! 2. load_for_update (exclusive record lock; blocks concurrent mutators)
//!   ↓
//! 3. Stamp the write time and decide the next state (pure domain logic, may reject)
//!   ↓
//! 4. save (version + 1) and append the stock movement
//!   ↓
//! 5. Commit (releases the lock)
//!   ↓
//! 6. Publish events (fire-and-forget)
//! ```
//!
//! A rejection at any step before commit rolls the transaction back: no partial
//! state, no movement and no event is observable. Publication failures after
//! commit are logged and swallowed.
//!
//! ## Concurrency
//!
//! Mutations on one record are linearized by the ledger lock; mutations on
//! different records never wait for each other. A transaction never holds more
//! than one record lock, so there is no lock ordering to get wrong.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockledger_core::{
    AggregateRoot, DomainError, ExpectedVersion, InventoryRecordId, VariantId,
};
use stockledger_events::{Event, EventBus, EventEnvelope};
use stockledger_inventory::{
    AdjustQuantity, InventoryCommand, InventoryEvent, InventoryRecord, Metadata,
    NewInventoryRecord, ReleaseStock, ReserveStock, SettingsPatch, StockMovement, UpdateSettings,
};

use crate::ledger::{InventoryLedger, LedgerError, LedgerTransaction};

/// Typed failure of a coordinator operation.
///
/// `NotFound`, `Conflict`, `InsufficientStock` and `InvalidRelease` are business
/// outcomes. `Transaction` covers lock timeouts, version conflicts and storage
/// failures; callers may retry those.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("inventory record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("invalid release: requested {requested}, reserved {reserved}")]
    InvalidRelease { requested: i64, reserved: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl CoordinatorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::Transaction(_))
    }
}

impl From<DomainError> for CoordinatorError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => CoordinatorError::Validation(msg),
            DomainError::NotFound => CoordinatorError::NotFound,
            DomainError::Conflict(msg) => CoordinatorError::Conflict(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => CoordinatorError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InvalidRelease {
                requested,
                reserved,
            } => CoordinatorError::InvalidRelease {
                requested,
                reserved,
            },
        }
    }
}

impl From<LedgerError> for CoordinatorError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound => CoordinatorError::NotFound,
            LedgerError::Conflict(msg) => CoordinatorError::Conflict(msg),
            other => CoordinatorError::Transaction(other.to_string()),
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Request to create a record for a (variant, location) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRecord {
    pub variant_id: VariantId,
    pub location: Option<String>,
    pub initial_quantity: i64,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub metadata: Option<Metadata>,
}

impl CreateRecord {
    pub fn new(variant_id: VariantId, location: Option<String>, initial_quantity: i64) -> Self {
        Self {
            variant_id,
            location,
            initial_quantity,
            reorder_point: None,
            reorder_quantity: None,
            metadata: None,
        }
    }

    pub fn reorder_point(mut self, reorder_point: i64) -> Self {
        self.reorder_point = Some(reorder_point);
        self
    }

    pub fn reorder_quantity(mut self, reorder_quantity: i64) -> Self {
        self.reorder_quantity = Some(reorder_quantity);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Coordinates ledger transactions, domain decisions and event publication.
///
/// ## Generic Parameters
///
/// - `L`: ledger implementation (`InMemoryLedger`, `PostgresLedger`)
/// - `B`: event bus carrying `EventEnvelope<InventoryEvent>`
///
/// Envelopes carry the record version produced by the emitting commit as
/// `sequence_number`.
#[derive(Debug)]
pub struct InventoryCoordinator<L, B> {
    ledger: L,
    bus: B,
}

impl<L, B> InventoryCoordinator<L, B>
where
    L: InventoryLedger,
    B: EventBus<EventEnvelope<InventoryEvent>>,
{
    pub fn new(ledger: L, bus: B) -> Self {
        Self { ledger, bus }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Create a record with `reserved = 0` and `version = 1`.
    #[instrument(
        skip(self, request),
        fields(variant_id = %request.variant_id, location = ?request.location),
        err
    )]
    pub async fn create(&self, request: CreateRecord) -> CoordinatorResult<InventoryRecord> {
        let (record, event) = InventoryRecord::create(NewInventoryRecord {
            record_id: InventoryRecordId::new(),
            variant_id: request.variant_id,
            location: request.location,
            initial_quantity: request.initial_quantity,
            reorder_point: request.reorder_point,
            reorder_quantity: request.reorder_quantity,
            metadata: request.metadata,
            occurred_at: Utc::now(),
        })?;

        let record = self.ledger.insert(record).await?;
        info!(record_id = %record.record_id(), quantity = record.quantity(), "inventory record created");

        self.publish(&record, vec![event]);
        Ok(record)
    }

    /// Apply a signed, movement-tracked quantity change.
    #[instrument(skip(self, reason, reference, notes), fields(record_id = %id), err)]
    pub async fn adjust(
        &self,
        id: InventoryRecordId,
        delta: i64,
        reason: impl Into<String> + Send,
        reference: Option<String>,
        notes: Option<String>,
    ) -> CoordinatorResult<InventoryRecord> {
        self.apply(InventoryCommand::Adjust(AdjustQuantity {
            record_id: id,
            delta,
            reason: reason.into(),
            reference,
            notes,
            occurred_at: Utc::now(),
        }))
        .await
    }

    /// Earmark `amount` available units.
    #[instrument(skip(self), fields(record_id = %id), err)]
    pub async fn reserve(
        &self,
        id: InventoryRecordId,
        amount: i64,
        reference: Option<String>,
    ) -> CoordinatorResult<InventoryRecord> {
        self.apply(InventoryCommand::Reserve(ReserveStock {
            record_id: id,
            amount,
            reference,
            occurred_at: Utc::now(),
        }))
        .await
    }

    /// Give back `amount` previously reserved units.
    #[instrument(skip(self), fields(record_id = %id), err)]
    pub async fn release(
        &self,
        id: InventoryRecordId,
        amount: i64,
        reference: Option<String>,
    ) -> CoordinatorResult<InventoryRecord> {
        self.apply(InventoryCommand::Release(ReleaseStock {
            record_id: id,
            amount,
            reference,
            occurred_at: Utc::now(),
        }))
        .await
    }

    /// Administrative field overrides. A quantity override records no movement.
    #[instrument(skip(self, patch), fields(record_id = %id), err)]
    pub async fn update_settings(
        &self,
        id: InventoryRecordId,
        patch: SettingsPatch,
    ) -> CoordinatorResult<InventoryRecord> {
        self.apply(InventoryCommand::UpdateSettings(UpdateSettings {
            record_id: id,
            patch,
            occurred_at: Utc::now(),
        }))
        .await
    }

    /// Unlocked read. Informational only; never use it to decide a reservation.
    pub async fn get_low_stock_items(&self) -> CoordinatorResult<Vec<InventoryRecord>> {
        Ok(self.ledger.query_low_stock().await?)
    }

    pub async fn find_by_variant(
        &self,
        variant_id: VariantId,
    ) -> CoordinatorResult<Vec<InventoryRecord>> {
        Ok(self.ledger.query_by_variant(variant_id).await?)
    }

    pub async fn find_by_location(&self, location: &str) -> CoordinatorResult<Vec<InventoryRecord>> {
        Ok(self.ledger.query_by_location(location).await?)
    }

    pub async fn get(&self, id: InventoryRecordId) -> CoordinatorResult<InventoryRecord> {
        Ok(self.ledger.get(id).await?)
    }

    /// Audit trail of a record, oldest first.
    pub async fn movements(&self, id: InventoryRecordId) -> CoordinatorResult<Vec<StockMovement>> {
        Ok(self.ledger.movements(id).await?)
    }

    async fn apply(&self, command: InventoryCommand) -> CoordinatorResult<InventoryRecord> {
        let mut tx = self.ledger.begin().await?;

        let (record, events) = match Self::decide_and_stage(&mut tx, &command).await {
            Ok(staged) => staged,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        record_id = %command.record_id(),
                        error = %rollback_err,
                        "rollback failed; transaction is discarded on drop"
                    );
                }
                return Err(err);
            }
        };

        tx.commit().await?;
        info!(
            record_id = %record.record_id(),
            operation = command.name(),
            version = record.version(),
            quantity = record.quantity(),
            reserved = record.reserved(),
            "inventory record updated"
        );

        self.publish(&record, events);
        Ok(record)
    }

    async fn decide_and_stage(
        tx: &mut L::Tx,
        command: &InventoryCommand,
    ) -> CoordinatorResult<(InventoryRecord, Vec<InventoryEvent>)> {
        let current = tx.load_for_update(command.record_id()).await?;
        // Write time is taken under the lock and never precedes the previous write.
        let command = command.clone().stamped(Utc::now().max(current.updated_at()));
        let change = current.handle(&command)?;

        if let InventoryCommand::UpdateSettings(cmd) = &command {
            if let Some(quantity) = cmd.patch.quantity.filter(|q| *q != current.quantity()) {
                info!(
                    record_id = %current.record_id(),
                    old_quantity = current.quantity(),
                    new_quantity = quantity,
                    "quantity overridden without a stock movement"
                );
            }
        }

        let saved = tx
            .save(change.record, ExpectedVersion::Exact(current.version()))
            .await?;
        if let Some(movement) = &change.movement {
            tx.append_movement(movement).await?;
        }

        Ok((saved, change.events))
    }

    fn publish(&self, record: &InventoryRecord, events: Vec<InventoryEvent>) {
        for event in events {
            let event_type = event.event_type();
            let envelope = EventEnvelope::wrap(record.record_id(), record.version(), event);
            if let Err(err) = self.bus.publish(envelope) {
                warn!(
                    record_id = %record.record_id(),
                    event_type,
                    error = ?err,
                    "event publication failed; state change stays committed"
                );
            }
        }
    }
}
