use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_core::{AggregateRoot, DomainError, DomainResult, InventoryRecordId, VariantId};

use crate::command::{
    AdjustQuantity, InventoryCommand, NewInventoryRecord, ReleaseStock, ReserveStock,
    UpdateSettings,
};
use crate::event::{
    Direction, InventoryAdjusted, InventoryCreated, InventoryEvent, InventoryReleased,
    InventoryReserved, LowStock,
};
use crate::movement::{RELEASE, RESERVATION, StockMovement};

/// Opaque key/value bag carried on a record and never interpreted.
pub type Metadata = serde_json::Map<String, JsonValue>;

/// Stock held for one variant at one location.
///
/// Invariants (checked on every construction and transition):
/// - `quantity >= 0`
/// - `0 <= reserved <= quantity`
/// - `version >= 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RecordParts")]
pub struct InventoryRecord {
    id: InventoryRecordId,
    variant_id: VariantId,
    location: Option<String>,
    quantity: i64,
    reserved: i64,
    reorder_point: i64,
    reorder_quantity: i64,
    version: u64,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw field set used by storage adapters to rebuild a record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordParts {
    pub id: InventoryRecordId,
    pub variant_id: VariantId,
    pub location: Option<String>,
    pub quantity: i64,
    pub reserved: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub version: u64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a successful transition: the proposed state plus its side records.
///
/// `record.version()` is still the version that was loaded; the ledger bumps it on save.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub record: InventoryRecord,
    pub movement: Option<StockMovement>,
    pub events: Vec<InventoryEvent>,
}

impl InventoryRecord {
    /// Validate a creation request and build the initial record (version 1, nothing reserved).
    pub fn create(cmd: NewInventoryRecord) -> DomainResult<(Self, InventoryEvent)> {
        if cmd.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        let reorder_point = non_negative("reorder point", cmd.reorder_point.unwrap_or(0))?;
        let reorder_quantity =
            non_negative("reorder quantity", cmd.reorder_quantity.unwrap_or(0))?;
        let location = normalize_location(cmd.location)?;

        let record = Self {
            id: cmd.record_id,
            variant_id: cmd.variant_id,
            location,
            quantity: cmd.initial_quantity,
            reserved: 0,
            reorder_point,
            reorder_quantity,
            version: 1,
            metadata: cmd.metadata.unwrap_or_default(),
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        };

        let event = InventoryEvent::Created(InventoryCreated {
            record_id: record.id,
            variant_id: record.variant_id,
            quantity: record.quantity,
            occurred_at: cmd.occurred_at,
        });

        Ok((record, event))
    }

    /// Rebuild a record from storage, rejecting rows that break the invariants.
    pub fn from_parts(parts: RecordParts) -> DomainResult<Self> {
        let record = Self {
            id: parts.id,
            variant_id: parts.variant_id,
            location: parts.location,
            quantity: parts.quantity,
            reserved: parts.reserved,
            reorder_point: parts.reorder_point,
            reorder_quantity: parts.reorder_quantity,
            version: parts.version,
            metadata: parts.metadata,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        };
        record.check_invariants()?;
        if record.version == 0 {
            return Err(DomainError::invariant("version must start at 1"));
        }
        Ok(record)
    }

    pub fn into_parts(self) -> RecordParts {
        RecordParts {
            id: self.id,
            variant_id: self.variant_id,
            location: self.location,
            quantity: self.quantity,
            reserved: self.reserved,
            reorder_point: self.reorder_point,
            reorder_quantity: self.reorder_quantity,
            version: self.version,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Stamp the version assigned by storage when a proposed state is persisted.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn record_id(&self) -> InventoryRecordId {
        self.id
    }

    pub fn variant_id(&self) -> VariantId {
        self.variant_id
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Units that can still be reserved. Never negative.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    pub fn reorder_point(&self) -> i64 {
        self.reorder_point
    }

    pub fn reorder_quantity(&self) -> i64 {
        self.reorder_quantity
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// A record is low on stock when a positive reorder point has been reached.
    pub fn is_low_stock(&self) -> bool {
        self.reorder_point > 0 && self.quantity <= self.reorder_point
    }

    /// Decide the next state for a command. Pure: `self` is never mutated.
    pub fn handle(&self, command: &InventoryCommand) -> DomainResult<StockChange> {
        self.ensure_record_id(command.record_id())?;

        let change = match command {
            InventoryCommand::Adjust(cmd) => self.handle_adjust(cmd)?,
            InventoryCommand::Reserve(cmd) => self.handle_reserve(cmd)?,
            InventoryCommand::Release(cmd) => self.handle_release(cmd)?,
            InventoryCommand::UpdateSettings(cmd) => self.handle_update_settings(cmd)?,
        };

        change.record.check_invariants()?;
        Ok(change)
    }

    fn check_invariants(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invariant("quantity cannot be negative"));
        }
        if self.reserved < 0 {
            return Err(DomainError::invariant("reserved cannot be negative"));
        }
        if self.reserved > self.quantity {
            return Err(DomainError::invariant("reserved cannot exceed quantity"));
        }
        Ok(())
    }

    fn ensure_record_id(&self, record_id: InventoryRecordId) -> DomainResult<()> {
        if self.id != record_id {
            return Err(DomainError::invariant("record_id mismatch"));
        }
        Ok(())
    }

    fn low_stock_event(&self, occurred_at: DateTime<Utc>) -> Option<InventoryEvent> {
        self.is_low_stock().then(|| {
            InventoryEvent::LowStock(LowStock {
                record_id: self.id,
                variant_id: self.variant_id,
                quantity: self.quantity,
                reorder_point: self.reorder_point,
                occurred_at,
            })
        })
    }

    fn handle_adjust(&self, cmd: &AdjustQuantity) -> DomainResult<StockChange> {
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("reason cannot be empty"));
        }

        let new_quantity = self
            .quantity
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;

        // Reserved units must stay covered, so the floor is `reserved`, not zero.
        if new_quantity < self.reserved {
            return Err(DomainError::insufficient_stock(
                cmd.delta.saturating_neg(),
                self.available(),
            ));
        }

        let mut next = self.clone();
        next.quantity = new_quantity;
        next.updated_at = cmd.occurred_at;

        let movement = StockMovement::new(
            self.id,
            cmd.delta,
            cmd.reason.clone(),
            cmd.reference.clone(),
            cmd.notes.clone(),
            cmd.occurred_at,
        );

        let mut events = vec![InventoryEvent::Adjusted(InventoryAdjusted {
            record_id: self.id,
            quantity: cmd.delta.saturating_abs(),
            direction: Direction::of(cmd.delta),
            occurred_at: cmd.occurred_at,
        })];
        events.extend(next.low_stock_event(cmd.occurred_at));

        Ok(StockChange {
            record: next,
            movement: Some(movement),
            events,
        })
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> DomainResult<StockChange> {
        if cmd.amount <= 0 {
            return Err(DomainError::validation("reservation amount must be positive"));
        }
        let available = self.available();
        if cmd.amount > available {
            return Err(DomainError::insufficient_stock(cmd.amount, available));
        }

        let mut next = self.clone();
        next.reserved += cmd.amount;
        next.updated_at = cmd.occurred_at;

        let movement = StockMovement::new(
            self.id,
            -cmd.amount,
            RESERVATION,
            cmd.reference.clone(),
            None,
            cmd.occurred_at,
        );

        Ok(StockChange {
            record: next,
            movement: Some(movement),
            events: vec![InventoryEvent::Reserved(InventoryReserved {
                record_id: self.id,
                quantity: cmd.amount,
                occurred_at: cmd.occurred_at,
            })],
        })
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> DomainResult<StockChange> {
        if cmd.amount <= 0 {
            return Err(DomainError::validation("release amount must be positive"));
        }
        if cmd.amount > self.reserved {
            return Err(DomainError::invalid_release(cmd.amount, self.reserved));
        }

        let mut next = self.clone();
        next.reserved -= cmd.amount;
        next.updated_at = cmd.occurred_at;

        let movement = StockMovement::new(
            self.id,
            cmd.amount,
            RELEASE,
            cmd.reference.clone(),
            None,
            cmd.occurred_at,
        );

        Ok(StockChange {
            record: next,
            movement: Some(movement),
            events: vec![InventoryEvent::Released(InventoryReleased {
                record_id: self.id,
                quantity: cmd.amount,
                occurred_at: cmd.occurred_at,
            })],
        })
    }

    fn handle_update_settings(&self, cmd: &UpdateSettings) -> DomainResult<StockChange> {
        let patch = &cmd.patch;
        let mut next = self.clone();

        if let Some(quantity) = patch.quantity {
            let quantity = non_negative("quantity", quantity)?;
            if quantity < self.reserved {
                return Err(DomainError::invariant(format!(
                    "quantity {quantity} would drop below reserved {}",
                    self.reserved
                )));
            }
            next.quantity = quantity;
        }
        if let Some(reorder_point) = patch.reorder_point {
            next.reorder_point = non_negative("reorder point", reorder_point)?;
        }
        if let Some(reorder_quantity) = patch.reorder_quantity {
            next.reorder_quantity = non_negative("reorder quantity", reorder_quantity)?;
        }
        if let Some(metadata) = &patch.metadata {
            next.metadata = metadata.clone();
        }
        next.updated_at = cmd.occurred_at;

        let events = next.low_stock_event(cmd.occurred_at).into_iter().collect();

        Ok(StockChange {
            record: next,
            movement: None,
            events,
        })
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = InventoryRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TryFrom<RecordParts> for InventoryRecord {
    type Error = DomainError;

    fn try_from(parts: RecordParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts)
    }
}

fn non_negative(field: &str, value: i64) -> DomainResult<i64> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(value)
}

fn normalize_location(location: Option<String>) -> DomainResult<Option<String>> {
    match location {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(DomainError::validation("location cannot be blank"));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SettingsPatch;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_record(quantity: i64, reorder_point: i64) -> InventoryRecord {
        let (record, _) = InventoryRecord::create(NewInventoryRecord {
            record_id: InventoryRecordId::new(),
            variant_id: VariantId::new(),
            location: Some("WH-A".to_string()),
            initial_quantity: quantity,
            reorder_point: Some(reorder_point),
            reorder_quantity: None,
            metadata: None,
            occurred_at: now(),
        })
        .unwrap();
        record
    }

    fn adjust(record: &InventoryRecord, delta: i64) -> InventoryCommand {
        InventoryCommand::Adjust(AdjustQuantity {
            record_id: record.record_id(),
            delta,
            reason: "manual correction".to_string(),
            reference: None,
            notes: None,
            occurred_at: now(),
        })
    }

    fn reserve(record: &InventoryRecord, amount: i64) -> InventoryCommand {
        InventoryCommand::Reserve(ReserveStock {
            record_id: record.record_id(),
            amount,
            reference: Some("order-1".to_string()),
            occurred_at: now(),
        })
    }

    fn release(record: &InventoryRecord, amount: i64) -> InventoryCommand {
        InventoryCommand::Release(ReleaseStock {
            record_id: record.record_id(),
            amount,
            reference: None,
            occurred_at: now(),
        })
    }

    fn settings(record: &InventoryRecord, patch: SettingsPatch) -> InventoryCommand {
        InventoryCommand::UpdateSettings(UpdateSettings {
            record_id: record.record_id(),
            patch,
            occurred_at: now(),
        })
    }

    /// Apply a change the way the ledger would: persisted state gets version + 1.
    fn commit(change: StockChange) -> InventoryRecord {
        let version = change.record.version() + 1;
        change.record.with_version(version)
    }

    #[test]
    fn create_starts_unreserved_at_version_one() {
        let (record, event) = InventoryRecord::create(NewInventoryRecord {
            record_id: InventoryRecordId::new(),
            variant_id: VariantId::new(),
            location: Some("  WH-A ".to_string()),
            initial_quantity: 100,
            reorder_point: Some(10),
            reorder_quantity: Some(50),
            metadata: None,
            occurred_at: now(),
        })
        .unwrap();

        assert_eq!(record.quantity(), 100);
        assert_eq!(record.reserved(), 0);
        assert_eq!(record.version(), 1);
        assert_eq!(record.location(), Some("WH-A"));
        match event {
            InventoryEvent::Created(e) => assert_eq!(e.quantity, 100),
            other => panic!("expected created event, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_negative_quantity_and_blank_location() {
        let base = NewInventoryRecord {
            record_id: InventoryRecordId::new(),
            variant_id: VariantId::new(),
            location: None,
            initial_quantity: -1,
            reorder_point: None,
            reorder_quantity: None,
            metadata: None,
            occurred_at: now(),
        };
        assert!(matches!(
            InventoryRecord::create(base.clone()),
            Err(DomainError::Validation(_))
        ));

        let blank = NewInventoryRecord {
            location: Some("   ".to_string()),
            initial_quantity: 1,
            ..base
        };
        assert!(matches!(
            InventoryRecord::create(blank),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_the_loaded_record() {
        let record = new_record(10, 0);
        let before = record.clone();
        let change = record.handle(&reserve(&record, 4)).unwrap();

        assert_eq!(record, before);
        assert_eq!(change.record.reserved(), 4);
        assert_eq!(change.record.version(), record.version());
    }

    #[test]
    fn adjust_below_reorder_point_emits_low_stock() {
        let record = new_record(100, 10);
        let change = record.handle(&adjust(&record, -95)).unwrap();

        assert_eq!(change.record.quantity(), 5);
        assert_eq!(change.events.len(), 2);
        match &change.events[0] {
            InventoryEvent::Adjusted(e) => {
                assert_eq!(e.quantity, 95);
                assert_eq!(e.direction, Direction::Decrease);
            }
            other => panic!("expected adjusted, got {other:?}"),
        }
        match &change.events[1] {
            InventoryEvent::LowStock(e) => {
                assert_eq!(e.quantity, 5);
                assert_eq!(e.reorder_point, 10);
            }
            other => panic!("expected low stock, got {other:?}"),
        }
        let movement = change.movement.unwrap();
        assert_eq!(movement.delta, -95);
        assert_eq!(movement.reason, "manual correction");
    }

    #[test]
    fn adjust_to_exactly_zero_is_allowed() {
        let record = new_record(7, 0);
        let change = record.handle(&adjust(&record, -7)).unwrap();
        assert_eq!(change.record.quantity(), 0);

        let err = record.handle(&adjust(&record, -8)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(8, 7));
    }

    #[test]
    fn adjust_cannot_uncover_reserved_units() {
        let record = commit({
            let r = new_record(10, 0);
            r.handle(&reserve(&r, 6)).unwrap()
        });

        assert_eq!(record.reserved(), 6);
        let err = record.handle(&adjust(&record, -5)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(5, 4));
        assert!(record.handle(&adjust(&record, -4)).is_ok());
    }

    #[test]
    fn zero_delta_is_rejected() {
        let record = new_record(5, 0);
        assert!(matches!(
            record.handle(&adjust(&record, 0)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reserve_boundaries() {
        let record = commit({
            let r = new_record(100, 0);
            r.handle(&reserve(&r, 80)).unwrap()
        });
        assert_eq!(record.available(), 20);

        assert_eq!(
            record.handle(&reserve(&record, 21)).unwrap_err(),
            DomainError::insufficient_stock(21, 20)
        );

        let change = record.handle(&reserve(&record, 20)).unwrap();
        assert_eq!(change.record.reserved(), 100);
        assert_eq!(change.record.available(), 0);
        let movement = change.movement.unwrap();
        assert_eq!(movement.delta, -20);
        assert!(movement.is_reservation());
        assert_eq!(movement.reference.as_deref(), Some("order-1"));
    }

    #[test]
    fn reserve_and_release_require_positive_amounts() {
        let record = new_record(10, 0);
        for amount in [0, -3] {
            assert!(matches!(
                record.handle(&reserve(&record, amount)),
                Err(DomainError::Validation(_))
            ));
            assert!(matches!(
                record.handle(&release(&record, amount)),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn release_boundaries() {
        let record = commit({
            let r = new_record(50, 0);
            r.handle(&reserve(&r, 10)).unwrap()
        });

        assert_eq!(
            record.handle(&release(&record, 15)).unwrap_err(),
            DomainError::invalid_release(15, 10)
        );

        let change = record.handle(&release(&record, 10)).unwrap();
        assert_eq!(change.record.reserved(), 0);
        assert_eq!(change.record.quantity(), 50);
        let movement = change.movement.unwrap();
        assert_eq!(movement.delta, 10);
        assert!(movement.is_release());
    }

    #[test]
    fn update_settings_overrides_without_movement() {
        let record = new_record(100, 0);
        let change = record
            .handle(&settings(
                &record,
                SettingsPatch {
                    quantity: Some(8),
                    reorder_point: Some(10),
                    ..SettingsPatch::default()
                },
            ))
            .unwrap();

        assert!(change.movement.is_none());
        assert_eq!(change.record.quantity(), 8);
        assert_eq!(change.record.reorder_point(), 10);
        assert_eq!(change.events.len(), 1);
        assert!(matches!(change.events[0], InventoryEvent::LowStock(_)));
    }

    #[test]
    fn update_settings_cannot_drop_below_reserved() {
        let record = commit({
            let r = new_record(20, 0);
            r.handle(&reserve(&r, 15)).unwrap()
        });

        let err = record
            .handle(&settings(
                &record,
                SettingsPatch {
                    quantity: Some(10),
                    ..SettingsPatch::default()
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn update_settings_replaces_metadata() {
        let record = new_record(1, 0);
        let mut metadata = Metadata::new();
        metadata.insert("bin".to_string(), JsonValue::from("A-12"));

        let change = record
            .handle(&settings(
                &record,
                SettingsPatch {
                    metadata: Some(metadata.clone()),
                    ..SettingsPatch::default()
                },
            ))
            .unwrap();

        assert_eq!(change.record.metadata(), &metadata);
        assert!(change.events.is_empty());
    }

    #[test]
    fn zero_reorder_point_is_never_low() {
        let record = new_record(0, 0);
        assert!(!record.is_low_stock());
        assert!(new_record(10, 10).is_low_stock());
        assert!(!new_record(11, 10).is_low_stock());
    }

    #[test]
    fn commands_for_another_record_are_rejected() {
        let record = new_record(10, 0);
        let other = new_record(10, 0);
        assert!(matches!(
            record.handle(&reserve(&other, 1)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn from_parts_rejects_over_reserved_rows() {
        let mut parts = new_record(5, 0).into_parts();
        parts.reserved = 6;
        assert!(matches!(
            InventoryRecord::from_parts(parts),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn deserialization_checks_invariants() {
        let record = new_record(5, 2);
        let json = serde_json::to_value(&record).unwrap();
        let back: InventoryRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut broken = json;
        broken["reserved"] = serde_json::json!(6);
        let err = serde_json::from_value::<InventoryRecord>(broken).unwrap_err();
        assert!(err.to_string().contains("invariant"), "{err}");

        let mut unversioned = serde_json::to_value(&record).unwrap();
        unversioned["version"] = serde_json::json!(0);
        assert!(serde_json::from_value::<InventoryRecord>(unversioned).is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Adjust(i64),
        Reserve(i64),
        Release(i64),
        SetQuantity(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-60i64..60).prop_map(Op::Adjust),
            (-5i64..60).prop_map(Op::Reserve),
            (-5i64..60).prop_map(Op::Release),
            (-5i64..120).prop_map(Op::SetQuantity),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of operations is attempted, every committed
        /// state satisfies the invariants, versions grow by one per success, and a
        /// rejected operation leaves the record untouched.
        #[test]
        fn invariants_hold_for_any_operation_sequence(
            initial in 0i64..100,
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut record = new_record(initial, 5);

            for op in ops {
                let cmd = match op {
                    Op::Adjust(delta) => adjust(&record, delta),
                    Op::Reserve(amount) => reserve(&record, amount),
                    Op::Release(amount) => release(&record, amount),
                    Op::SetQuantity(quantity) => settings(&record, SettingsPatch {
                        quantity: Some(quantity),
                        ..SettingsPatch::default()
                    }),
                };

                let before = record.clone();
                match record.handle(&cmd) {
                    Ok(change) => {
                        let next = commit(change);
                        prop_assert_eq!(next.version(), before.version() + 1);
                        record = next;
                    }
                    Err(_) => prop_assert_eq!(&record, &before),
                }

                prop_assert!(record.quantity() >= 0);
                prop_assert!(record.reserved() >= 0);
                prop_assert!(record.reserved() <= record.quantity());
                prop_assert!(record.available() >= 0);
            }
        }

        /// Property: reserve(n) then release(n) restores the reservation, and
        /// adjust(+n) then adjust(-n) restores the quantity.
        #[test]
        fn paired_operations_are_net_zero(initial in 0i64..500, n in 1i64..500) {
            let record = new_record(initial + n, 0);

            let reserved = commit(record.handle(&reserve(&record, n)).unwrap());
            let released = commit(reserved.handle(&release(&reserved, n)).unwrap());
            prop_assert_eq!(released.reserved(), record.reserved());
            prop_assert_eq!(released.quantity(), record.quantity());

            let up = commit(record.handle(&adjust(&record, n)).unwrap());
            let down = commit(up.handle(&adjust(&up, -n)).unwrap());
            prop_assert_eq!(down.quantity(), record.quantity());
            prop_assert_eq!(down.version(), record.version() + 2);
        }
    }
}
