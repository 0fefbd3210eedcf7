//! Postgres connection pool and schema migrations.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::LedgerConfig;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not configured")]
    MissingUrl,

    #[error("failed to connect to Postgres: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("migration {name} failed: {source}")]
    Migration {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Embedded migrations, applied in order. Each script is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_inventory",
    include_str!("../migrations/0001_inventory.sql"),
)];

pub async fn connect(config: &LedgerConfig) -> Result<PgPool, DbError> {
    let url = config.database_url.as_deref().ok_or(DbError::MissingUrl)?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .map_err(DbError::Connect)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    for &(name, sql) in MIGRATIONS {
        tracing::info!(migration = name, "applying migration");
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|source| DbError::Migration { name, source })?;
    }
    Ok(())
}
