//! Inventory ledger boundary.
//!
//! Storage of inventory records plus the row-locking primitive every mutation
//! goes through. Backends: in-memory (tests/dev) and Postgres.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryLedger, InMemoryTransaction};
pub use postgres::{PostgresLedger, PostgresTransaction};
pub use r#trait::{InventoryLedger, LedgerError, LedgerTransaction};
