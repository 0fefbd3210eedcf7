use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{ExpectedVersion, InventoryRecordId, VariantId};
use stockledger_inventory::{InventoryRecord, StockMovement};

/// Ledger operation error.
///
/// These are **infrastructure errors** (storage, locking, concurrency) as opposed
/// to domain errors (validation, stock rules).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("inventory record not found")]
    NotFound,

    /// A record already exists for the same (variant, location) pair or id.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The stored version moved under a locked transaction.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// Waiting for a record lock took longer than the configured limit.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Durable storage for inventory records and their movement trail.
///
/// ## Locking
///
/// `begin()` opens a transaction. Inside it, `load_for_update()` takes an exclusive
/// lock on one record that blocks every other `load_for_update()` on the same id
/// until the transaction commits, rolls back or is dropped. Unlocked reads never
/// block and may observe values that are about to change.
///
/// ## Ordering
///
/// - `query_by_variant()` orders by location, records without a location last
/// - `query_by_location()` and `query_low_stock()` order by creation time
/// - `movements()` returns the audit trail oldest first
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    type Tx: LedgerTransaction;

    async fn begin(&self) -> Result<Self::Tx, LedgerError>;

    /// Store a freshly created record. Fails with `Conflict` on a duplicate
    /// (variant, location) pair.
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, LedgerError>;

    async fn get(&self, id: InventoryRecordId) -> Result<InventoryRecord, LedgerError>;

    async fn query_by_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryRecord>, LedgerError>;

    async fn query_by_location(&self, location: &str)
    -> Result<Vec<InventoryRecord>, LedgerError>;

    /// Records where `reorder_point > 0 && quantity <= reorder_point`.
    async fn query_low_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError>;

    async fn movements(&self, id: InventoryRecordId) -> Result<Vec<StockMovement>, LedgerError>;
}

/// A unit of work holding at most one record lock.
///
/// Dropping a transaction without calling `commit()` discards every staged write
/// and releases the lock, exactly like `rollback()`.
#[async_trait]
pub trait LedgerTransaction: Send + Sized {
    /// Read a record and lock it for the rest of the transaction.
    ///
    /// Loading the already-locked id again returns the staged state. Loading a
    /// second, different id is rejected.
    async fn load_for_update(&mut self, id: InventoryRecordId)
    -> Result<InventoryRecord, LedgerError>;

    /// Persist the full state of the locked record.
    ///
    /// `expected` is checked against the stored version; the returned record
    /// carries the new version (stored version + 1).
    async fn save(
        &mut self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, LedgerError>;

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), LedgerError>;

    async fn commit(self) -> Result<(), LedgerError>;

    async fn rollback(self) -> Result<(), LedgerError>;
}

pub(crate) fn check_expected(expected: ExpectedVersion, actual: u64) -> Result<(), LedgerError> {
    match expected {
        ExpectedVersion::Exact(v) if !expected.matches(actual) => Err(LedgerError::VersionConflict {
            expected: v,
            actual,
        }),
        _ => Ok(()),
    }
}
