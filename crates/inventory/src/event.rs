//! Inventory events and their flat payload shapes.
//!
//! Payloads serialize with camelCase keys and no enum tag; the event name travels
//! in the envelope (`EventEnvelope::event_type`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryRecordId, VariantId};
use stockledger_events::Event;

/// Which way an adjustment moved on-hand quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn of(delta: i64) -> Self {
        if delta < 0 {
            Direction::Decrease
        } else {
            Direction::Increase
        }
    }
}

/// Event: `inventory.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCreated {
    pub record_id: InventoryRecordId,
    pub variant_id: VariantId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: `inventory.adjusted`. `quantity` is the absolute size of the delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjusted {
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
}

/// Event: `inventory.reserved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReserved {
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: `inventory.released`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReleased {
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: `inventory.low_stock`. `quantity` is the on-hand quantity after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStock {
    pub record_id: InventoryRecordId,
    pub variant_id: VariantId,
    pub quantity: i64,
    pub reorder_point: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InventoryEvent {
    Created(InventoryCreated),
    Adjusted(InventoryAdjusted),
    Reserved(InventoryReserved),
    Released(InventoryReleased),
    LowStock(LowStock),
}

impl InventoryEvent {
    /// Rebuild an event from its published name and flat payload.
    pub fn decode(event_type: &str, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        match event_type {
            "inventory.created" => serde_json::from_value(payload).map(InventoryEvent::Created),
            "inventory.adjusted" => serde_json::from_value(payload).map(InventoryEvent::Adjusted),
            "inventory.reserved" => serde_json::from_value(payload).map(InventoryEvent::Reserved),
            "inventory.released" => serde_json::from_value(payload).map(InventoryEvent::Released),
            "inventory.low_stock" => serde_json::from_value(payload).map(InventoryEvent::LowStock),
            other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "unknown inventory event type '{other}'"
            ))),
        }
    }

    pub fn record_id(&self) -> InventoryRecordId {
        match self {
            InventoryEvent::Created(e) => e.record_id,
            InventoryEvent::Adjusted(e) => e.record_id,
            InventoryEvent::Reserved(e) => e.record_id,
            InventoryEvent::Released(e) => e.record_id,
            InventoryEvent::LowStock(e) => e.record_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::Created(_) => "inventory.created",
            InventoryEvent::Adjusted(_) => "inventory.adjusted",
            InventoryEvent::Reserved(_) => "inventory.reserved",
            InventoryEvent::Released(_) => "inventory.released",
            InventoryEvent::LowStock(_) => "inventory.low_stock",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::Created(e) => e.occurred_at,
            InventoryEvent::Adjusted(e) => e.occurred_at,
            InventoryEvent::Reserved(e) => e.occurred_at,
            InventoryEvent::Released(e) => e.occurred_at,
            InventoryEvent::LowStock(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adjusted_payload_is_flat_camel_case() {
        let record_id = InventoryRecordId::new();
        let event = InventoryEvent::Adjusted(InventoryAdjusted {
            record_id,
            quantity: 95,
            direction: Direction::of(-95),
            occurred_at: Utc::now(),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["recordId"], json!(record_id.to_string()));
        assert_eq!(value["quantity"], json!(95));
        assert_eq!(value["direction"], json!("decrease"));
        assert!(value.get("Adjusted").is_none());
    }

    #[test]
    fn low_stock_payload_carries_reorder_point() {
        let event = InventoryEvent::LowStock(LowStock {
            record_id: InventoryRecordId::new(),
            variant_id: VariantId::new(),
            quantity: 5,
            reorder_point: 10,
            occurred_at: Utc::now(),
        });

        assert_eq!(event.event_type(), "inventory.low_stock");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["reorderPoint"], json!(10));
        assert_eq!(value["quantity"], json!(5));
    }

    #[test]
    fn decode_uses_the_published_name() {
        let event = InventoryEvent::Released(InventoryReleased {
            record_id: InventoryRecordId::new(),
            quantity: 3,
            occurred_at: Utc::now(),
        });
        let payload = serde_json::to_value(&event).unwrap();

        // Reserved and released payloads share a shape; only the name tells them apart.
        let decoded = InventoryEvent::decode(event.event_type(), payload.clone()).unwrap();
        assert_eq!(decoded, event);
        assert!(matches!(
            InventoryEvent::decode("inventory.reserved", payload.clone()).unwrap(),
            InventoryEvent::Reserved(_)
        ));
        assert!(InventoryEvent::decode("inventory.deleted", payload).is_err());
    }

    #[test]
    fn zero_delta_counts_as_increase() {
        assert_eq!(Direction::of(0), Direction::Increase);
        assert_eq!(Direction::of(3), Direction::Increase);
        assert_eq!(Direction::of(-1), Direction::Decrease);
    }
}
