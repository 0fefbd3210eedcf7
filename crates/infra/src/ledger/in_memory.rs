use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as RecordLock, OwnedMutexGuard};

use stockledger_core::{AggregateRoot, ExpectedVersion, InventoryRecordId, VariantId};
use stockledger_inventory::{InventoryRecord, StockMovement};

use super::r#trait::{InventoryLedger, LedgerError, LedgerTransaction, check_expected};

#[derive(Debug, Default)]
struct State {
    records: HashMap<InventoryRecordId, InventoryRecord>,
    pairs: HashMap<(VariantId, String), InventoryRecordId>,
    movements: HashMap<InventoryRecordId, Vec<StockMovement>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<State>,
    locks: Mutex<HashMap<InventoryRecordId, Arc<RecordLock<()>>>>,
    lock_timeout: Option<Duration>,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, State>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, LedgerError> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn record_lock(&self, id: InventoryRecordId) -> Result<Arc<RecordLock<()>>, LedgerError> {
        if !self.read()?.records.contains_key(&id) {
            return Err(LedgerError::NotFound);
        }
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::Storage("lock table poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }
}

/// In-memory inventory ledger.
///
/// Intended for tests/dev. Row locks are per-record async mutexes held for the
/// life of a transaction; staged writes become visible atomically on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    shared: Arc<Shared>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how long `load_for_update` waits for a busy record.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                lock_timeout: Some(timeout),
                ..Shared::default()
            }),
        }
    }
}

#[derive(Debug)]
struct Held {
    id: InventoryRecordId,
    _guard: OwnedMutexGuard<()>,
    loaded: InventoryRecord,
    staged: Option<InventoryRecord>,
}

impl Held {
    fn current(&self) -> &InventoryRecord {
        self.staged.as_ref().unwrap_or(&self.loaded)
    }
}

#[derive(Debug)]
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    held: Option<Held>,
    movements: Vec<StockMovement>,
}

impl InMemoryTransaction {
    fn held_for(&mut self, id: InventoryRecordId) -> Result<&mut Held, LedgerError> {
        self.held
            .as_mut()
            .filter(|held| held.id == id)
            .ok_or_else(|| {
                LedgerError::Storage(format!("record {id} is not locked by this transaction"))
            })
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, LedgerError> {
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            held: None,
            movements: Vec::new(),
        })
    }

    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, LedgerError> {
        let id = record.record_id();
        let mut state = self.shared.write()?;

        if state.records.contains_key(&id) {
            return Err(LedgerError::Conflict(format!("record {id} already exists")));
        }
        if let Some(location) = record.location() {
            let key = (record.variant_id(), location.to_string());
            if state.pairs.contains_key(&key) {
                return Err(LedgerError::Conflict(format!(
                    "variant {} already has a record at location '{location}'",
                    record.variant_id()
                )));
            }
            state.pairs.insert(key, id);
        }

        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: InventoryRecordId) -> Result<InventoryRecord, LedgerError> {
        self.shared
            .read()?
            .records
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound)
    }

    async fn query_by_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let state = self.shared.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.variant_id() == variant_id)
            .cloned()
            .collect();

        // Locations ascending, unlocated records last.
        records.sort_by(|a, b| match (a.location(), b.location()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.record_id().cmp(&b.record_id()),
        });
        Ok(records)
    }

    async fn query_by_location(
        &self,
        location: &str,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let state = self.shared.read()?;
        Ok(by_creation(
            state
                .records
                .values()
                .filter(|r| r.location() == Some(location))
                .cloned()
                .collect(),
        ))
    }

    async fn query_low_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        let state = self.shared.read()?;
        Ok(by_creation(
            state
                .records
                .values()
                .filter(|r| r.is_low_stock())
                .cloned()
                .collect(),
        ))
    }

    async fn movements(&self, id: InventoryRecordId) -> Result<Vec<StockMovement>, LedgerError> {
        let state = self.shared.read()?;
        if !state.records.contains_key(&id) {
            return Err(LedgerError::NotFound);
        }
        Ok(state.movements.get(&id).cloned().unwrap_or_default())
    }
}

fn by_creation(mut records: Vec<InventoryRecord>) -> Vec<InventoryRecord> {
    records.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.record_id().cmp(&b.record_id()))
    });
    records
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn load_for_update(
        &mut self,
        id: InventoryRecordId,
    ) -> Result<InventoryRecord, LedgerError> {
        if let Some(held) = &self.held {
            if held.id != id {
                return Err(LedgerError::Storage(format!(
                    "transaction already holds the lock on record {}",
                    held.id
                )));
            }
            return Ok(held.current().clone());
        }

        let lock = self.shared.record_lock(id)?;
        let guard = match self.shared.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    LedgerError::LockTimeout(format!("record {id} still locked after {limit:?}"))
                })?,
            None => lock.lock_owned().await,
        };

        let record = self
            .shared
            .read()?
            .records
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound)?;

        self.held = Some(Held {
            id,
            _guard: guard,
            loaded: record.clone(),
            staged: None,
        });
        Ok(record)
    }

    async fn save(
        &mut self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, LedgerError> {
        let held = self.held_for(record.record_id())?;
        let current = held.current().version();
        check_expected(expected, current)?;

        let persisted = record.with_version(current + 1);
        held.staged = Some(persisted.clone());
        Ok(persisted)
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), LedgerError> {
        self.held_for(movement.record_id)?;
        self.movements.push(movement.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        let Self {
            shared,
            held,
            movements,
        } = self;

        if let Some(held) = held {
            let mut state = shared.write()?;
            if let Some(record) = held.staged {
                state.records.insert(record.record_id(), record);
            }
            state
                .movements
                .entry(held.id)
                .or_default()
                .extend(movements);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}
