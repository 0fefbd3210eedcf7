//! Infrastructure layer: ledger backends, coordination, config and wiring.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod event_bus;
pub mod ledger;

pub use config::{ConfigError, LedgerConfig};
pub use coordinator::{CoordinatorError, CoordinatorResult, CreateRecord, InventoryCoordinator};
pub use ledger::{
    InMemoryLedger, InventoryLedger, LedgerError, LedgerTransaction, PostgresLedger,
};
