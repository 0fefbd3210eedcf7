//! Redis pub/sub-backed event bus (optional).
//!
//! Note: Redis pub/sub is not durable (messages are dropped while no subscriber
//! is connected). That matches the fire-and-forget publication contract; the
//! stock movement trail stays the source of truth.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_events::{EventBus, EventEnvelope, Subscription};
use stockledger_inventory::InventoryEvent;

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("envelope serialization failed: {0}")]
    Serialize(String),
}

/// Redis pub/sub bus for inventory event envelopes, encoded as JSON.
#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubEventBus {
    pub fn new(
        redis_url: impl AsRef<str>,
        channel: impl Into<String>,
    ) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Parse a published message back into a typed envelope.
pub fn decode_message(raw: &str) -> Result<EventEnvelope<InventoryEvent>, serde_json::Error> {
    let envelope: EventEnvelope<JsonValue> = serde_json::from_str(raw)?;
    let event = InventoryEvent::decode(envelope.event_type(), envelope.payload().clone())?;
    Ok(envelope.map_payload(|_| event))
}

impl EventBus<EventEnvelope<InventoryEvent>> for RedisPubSubEventBus {
    type Error = RedisBusError;

    fn publish(&self, message: EventEnvelope<InventoryEvent>) -> Result<(), Self::Error> {
        let payload =
            serde_json::to_string(&message).map_err(|e| RedisBusError::Serialize(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        let _: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        Ok(())
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<InventoryEvent>> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Background thread that receives pub/sub messages and forwards them.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    tracing::warn!(error = %err, "redis subscription could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(err) = pubsub.subscribe(&channel) {
                tracing::warn!(error = %err, channel = %channel, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(error = %err, "redis subscription closed");
                        return;
                    }
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let envelope = match decode_message(&payload) {
                    Ok(e) => e,
                    Err(err) => {
                        tracing::debug!(error = %err, "skipping undecodable message");
                        continue;
                    }
                };

                if tx.send(envelope).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::InventoryRecordId;
    use stockledger_inventory::InventoryReserved;

    #[test]
    fn published_json_decodes_to_the_same_envelope() {
        let record_id = InventoryRecordId::new();
        let envelope = EventEnvelope::wrap(
            record_id,
            4,
            InventoryEvent::Reserved(InventoryReserved {
                record_id,
                quantity: 12,
                occurred_at: Utc::now(),
            }),
        );

        let raw = serde_json::to_string(&envelope).unwrap();
        assert_eq!(decode_message(&raw).unwrap(), envelope);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_message("{\"not\":\"an envelope\"}").is_err());
    }
}
