use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::InventoryRecordId;

use crate::Event;

/// Envelope for a published event, carrying the record it describes.
///
/// Notes:
/// - `sequence_number` is the record version produced by the commit that emitted
///   the event. Several events from one commit share it.
/// - `payload` is the flat event body consumers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    event_type: String,

    record_id: InventoryRecordId,

    /// Record version after the emitting commit.
    sequence_number: u64,

    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        event_type: impl Into<String>,
        record_id: InventoryRecordId,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            record_id,
            sequence_number,
            occurred_at,
            payload,
        }
    }

    /// Wrap a typed event, taking its type name and timestamp from the `Event` impl.
    pub fn wrap(record_id: InventoryRecordId, sequence_number: u64, payload: E) -> Self
    where
        E: Event,
    {
        Self::new(
            Uuid::now_v7(),
            payload.event_type(),
            record_id,
            sequence_number,
            payload.occurred_at(),
            payload,
        )
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn record_id(&self) -> InventoryRecordId {
        self.record_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Convert the payload, keeping the envelope metadata.
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type,
            record_id: self.record_id,
            sequence_number: self.sequence_number,
            occurred_at: self.occurred_at,
            payload: f(self.payload),
        }
    }
}
