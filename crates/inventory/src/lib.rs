//! Inventory domain module.
//!
//! This crate contains the business rules for stock records, implemented purely
//! as deterministic domain logic (no IO, no locking, no storage). Callers load a
//! record, ask it to `handle` a command and persist the returned `StockChange`.

pub mod command;
pub mod event;
pub mod movement;
pub mod record;

pub use command::{
    AdjustQuantity, InventoryCommand, NewInventoryRecord, ReleaseStock, ReserveStock,
    SettingsPatch, UpdateSettings,
};
pub use event::{
    Direction, InventoryAdjusted, InventoryCreated, InventoryEvent, InventoryReleased,
    InventoryReserved, LowStock,
};
pub use movement::{RELEASE, RESERVATION, StockMovement};
pub use record::{InventoryRecord, Metadata, RecordParts, StockChange};
