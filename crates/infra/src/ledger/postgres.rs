//! Postgres-backed inventory ledger.
//!
//! Row locks are real `SELECT ... FOR UPDATE` locks held by an open sqlx
//! transaction, so they are shared with every other process using the database.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate (variant_id, location) or id |
//! | Database (lock not available) | `55P03` | `LockTimeout` | `lock_timeout` expired while waiting for a row lock |
//! | Database (serialization / deadlock) | `40001` / `40P01` | `Storage` | Retryable by the caller |
//! | Database (check violation) | `23514` | `Storage` | A row would break a table invariant |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Storage` | Connection failures |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{ExpectedVersion, InventoryRecordId, MovementId, VariantId};
use stockledger_inventory::{InventoryRecord, Metadata, RecordParts, StockMovement};

use super::r#trait::{InventoryLedger, LedgerError, LedgerTransaction, check_expected};

const RECORD_COLUMNS: &str = "id, variant_id, location, quantity, reserved, reorder_point, \
     reorder_quantity, version, metadata, created_at, updated_at";

/// Postgres-backed inventory ledger.
///
/// `PgPool` is internally reference counted; cloning the ledger shares the pool.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Apply `lock_timeout` to every transaction this ledger opens.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_records(
        &self,
        operation: &str,
        sql: &str,
        bind: Option<Uuid>,
        bind_text: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        if let Some(value) = bind_text {
            query = query.bind(value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter().map(record_from_row).collect()
    }
}

/// An open Postgres transaction holding at most one row lock.
///
/// Dropping it without `commit()` rolls back (sqlx issues the ROLLBACK when the
/// connection returns to the pool).
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    locked: Option<InventoryRecordId>,
}

impl PostgresTransaction {
    fn ensure_locked(&self, id: InventoryRecordId) -> Result<(), LedgerError> {
        match self.locked {
            Some(locked) if locked == id => Ok(()),
            _ => Err(LedgerError::Storage(format!(
                "record {id} is not locked by this transaction"
            ))),
        }
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    type Tx = PostgresTransaction;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Tx, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        }

        Ok(PostgresTransaction { tx, locked: None })
    }

    #[instrument(
        skip(self, record),
        fields(record_id = %record.record_id(), variant_id = %record.variant_id()),
        err
    )]
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, LedgerError> {
        let parts = record.clone().into_parts();

        sqlx::query(
            r#"
            INSERT INTO inventory_records (
                id,
                variant_id,
                location,
                quantity,
                reserved,
                reorder_point,
                reorder_quantity,
                version,
                metadata,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(parts.id.as_uuid())
        .bind(parts.variant_id.as_uuid())
        .bind(&parts.location)
        .bind(parts.quantity)
        .bind(parts.reserved)
        .bind(parts.reorder_point)
        .bind(parts.reorder_quantity)
        .bind(parts.version as i64)
        .bind(JsonValue::Object(parts.metadata))
        .bind(parts.created_at)
        .bind(parts.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_record", e))?;

        Ok(record)
    }

    #[instrument(skip(self), fields(record_id = %id), err)]
    async fn get(&self, id: InventoryRecordId) -> Result<InventoryRecord, LedgerError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM inventory_records WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_record", e))?
            .ok_or(LedgerError::NotFound)?;

        record_from_row(&row)
    }

    #[instrument(skip(self), fields(variant_id = %variant_id), err)]
    async fn query_by_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
             WHERE variant_id = $1 ORDER BY location ASC NULLS LAST, id ASC"
        );
        self.fetch_records("query_by_variant", &sql, Some(*variant_id.as_uuid()), None)
            .await
    }

    #[instrument(skip(self), err)]
    async fn query_by_location(
        &self,
        location: &str,
    ) -> Result<Vec<InventoryRecord>, LedgerError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
             WHERE location = $1 ORDER BY created_at ASC, id ASC"
        );
        self.fetch_records("query_by_location", &sql, None, Some(location))
            .await
    }

    #[instrument(skip(self), err)]
    async fn query_low_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
             WHERE reorder_point > 0 AND quantity <= reorder_point \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_records("query_low_stock", &sql, None, None).await
    }

    #[instrument(skip(self), fields(record_id = %id), err)]
    async fn movements(&self, id: InventoryRecordId) -> Result<Vec<StockMovement>, LedgerError> {
        // Distinguish "no movements yet" from "no such record".
        self.get(id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, record_id, delta, reason, reference, notes, occurred_at
            FROM stock_movements
            WHERE record_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    #[instrument(skip(self), fields(record_id = %id), err)]
    async fn load_for_update(
        &mut self,
        id: InventoryRecordId,
    ) -> Result<InventoryRecord, LedgerError> {
        if let Some(locked) = self.locked {
            if locked != id {
                return Err(LedgerError::Storage(format!(
                    "transaction already holds the lock on record {locked}"
                )));
            }
        }

        let sql = format!("SELECT {RECORD_COLUMNS} FROM inventory_records WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_for_update", e))?
            .ok_or(LedgerError::NotFound)?;

        let record = record_from_row(&row)?;
        self.locked = Some(id);
        Ok(record)
    }

    #[instrument(
        skip(self, record),
        fields(record_id = %record.record_id(), expected = ?expected),
        err
    )]
    async fn save(
        &mut self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, LedgerError> {
        let id = record.record_id();
        self.ensure_locked(id)?;

        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };
        let parts = record.into_parts();

        let row = sqlx::query(
            r#"
            UPDATE inventory_records
            SET quantity = $2,
                reserved = $3,
                reorder_point = $4,
                reorder_quantity = $5,
                metadata = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $1
              AND ($8::BIGINT IS NULL OR version = $8)
            RETURNING version
            "#,
        )
        .bind(id.as_uuid())
        .bind(parts.quantity)
        .bind(parts.reserved)
        .bind(parts.reorder_point)
        .bind(parts.reorder_quantity)
        .bind(JsonValue::Object(parts.metadata.clone()))
        .bind(parts.updated_at)
        .bind(expected_version)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_record", e))?;

        let Some(row) = row else {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM inventory_records WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&mut *self.tx)
                    .await
                    .map_err(|e| map_sqlx_error("check_version", e))?;
            return match actual {
                Some(actual) => {
                    check_expected(expected, actual as u64)?;
                    Err(LedgerError::Storage("versioned update matched no row".into()))
                }
                None => Err(LedgerError::NotFound),
            };
        };

        let version: i64 = row
            .try_get("version")
            .map_err(|e| LedgerError::Storage(format!("failed to read version: {e}")))?;

        InventoryRecord::from_parts(RecordParts {
            version: version as u64,
            ..parts
        })
        .map_err(|e| LedgerError::Storage(format!("saved row is invalid: {e}")))
    }

    #[instrument(
        skip(self, movement),
        fields(record_id = %movement.record_id, delta = movement.delta),
        err
    )]
    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), LedgerError> {
        self.ensure_locked(movement.record_id)?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id,
                record_id,
                delta,
                reason,
                reference,
                notes,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.record_id.as_uuid())
        .bind(movement.delta)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(&movement.notes)
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;

        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, LedgerError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| LedgerError::Storage(format!("failed to read column {name}: {e}")))
}

fn record_from_row(row: &PgRow) -> Result<InventoryRecord, LedgerError> {
    let metadata = match column::<JsonValue>(row, "metadata")? {
        JsonValue::Object(map) => map,
        JsonValue::Null => Metadata::new(),
        other => {
            return Err(LedgerError::Storage(format!(
                "metadata must be a JSON object, got {other}"
            )));
        }
    };
    let version: i64 = column(row, "version")?;

    InventoryRecord::from_parts(RecordParts {
        id: InventoryRecordId::from_uuid(column(row, "id")?),
        variant_id: VariantId::from_uuid(column(row, "variant_id")?),
        location: column(row, "location")?,
        quantity: column(row, "quantity")?,
        reserved: column(row, "reserved")?,
        reorder_point: column(row, "reorder_point")?,
        reorder_quantity: column(row, "reorder_quantity")?,
        version: version as u64,
        metadata,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
    .map_err(|e| LedgerError::Storage(format!("stored record is invalid: {e}")))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, LedgerError> {
    Ok(StockMovement {
        id: MovementId::from_uuid(column(row, "id")?),
        record_id: InventoryRecordId::from_uuid(column(row, "record_id")?),
        delta: column(row, "delta")?,
        reason: column(row, "reason")?,
        reference: column(row, "reference")?,
        notes: column(row, "notes")?,
        occurred_at: column(row, "occurred_at")?,
    })
}

/// Map SQLx errors to LedgerError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => LedgerError::Conflict(msg),
                Some("55P03") => LedgerError::LockTimeout(msg),
                Some("40001") | Some("40P01") => {
                    LedgerError::Storage(format!("{msg} (retryable)"))
                }
                _ => LedgerError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => LedgerError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
