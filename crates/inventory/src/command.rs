//! Commands accepted by an inventory record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryRecordId, VariantId};

use crate::record::Metadata;

/// Command: create a record for a (variant, location) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInventoryRecord {
    pub record_id: InventoryRecordId,
    pub variant_id: VariantId,
    pub location: Option<String>,
    pub initial_quantity: i64,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub metadata: Option<Metadata>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: signed, movement-tracked change of on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustQuantity {
    pub record_id: InventoryRecordId,
    pub delta: i64,
    pub reason: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: earmark available units for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub record_id: InventoryRecordId,
    pub amount: i64,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: give back previously reserved units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub record_id: InventoryRecordId,
    pub amount: i64,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: administrative field overrides. `None` leaves a field untouched.
///
/// A `quantity` override is not movement-tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub quantity: Option<i64>,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub record_id: InventoryRecordId,
    pub patch: SettingsPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryCommand {
    Adjust(AdjustQuantity),
    Reserve(ReserveStock),
    Release(ReleaseStock),
    UpdateSettings(UpdateSettings),
}

impl InventoryCommand {
    pub fn record_id(&self) -> InventoryRecordId {
        match self {
            InventoryCommand::Adjust(c) => c.record_id,
            InventoryCommand::Reserve(c) => c.record_id,
            InventoryCommand::Release(c) => c.record_id,
            InventoryCommand::UpdateSettings(c) => c.record_id,
        }
    }

    /// Replace the write time carried by the command.
    pub fn stamped(mut self, occurred_at: DateTime<Utc>) -> Self {
        match &mut self {
            InventoryCommand::Adjust(c) => c.occurred_at = occurred_at,
            InventoryCommand::Reserve(c) => c.occurred_at = occurred_at,
            InventoryCommand::Release(c) => c.occurred_at = occurred_at,
            InventoryCommand::UpdateSettings(c) => c.occurred_at = occurred_at,
        }
        self
    }

    /// Short operation name used in logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            InventoryCommand::Adjust(_) => "adjust",
            InventoryCommand::Reserve(_) => "reserve",
            InventoryCommand::Release(_) => "release",
            InventoryCommand::UpdateSettings(_) => "update_settings",
        }
    }
}
