//! Persistence layer.
//!
//! Async data access over sqlx for the five tables owned by this service:
//! housing cooperatives, mortgage deeds, borrowers, cooperative signers,
//! and the append-only audit log. Schema is created at startup with
//! idempotent migrations.

pub mod audit_repository;
pub mod cooperative_repository;
pub mod deed_repository;
pub mod models;
pub mod stats;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

/// Database connection pool
pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// Map a sqlx failure to the taxonomy, logging it with context.
pub(crate) fn classify(context: &str, e: sqlx::Error) -> DatabaseError {
    error!("Failed to {}: {}", context, e);
    match &e {
        sqlx::Error::RowNotFound => DatabaseError::NotFound(context.to_string()),
        sqlx::Error::Database(db_err) => match db_err.kind() {
            sqlx::error::ErrorKind::UniqueViolation => {
                DatabaseError::UniqueViolation(context.to_string())
            }
            sqlx::error::ErrorKind::ForeignKeyViolation => {
                DatabaseError::ForeignKeyViolation(context.to_string())
            }
            _ => DatabaseError::Query(format!("Failed to {}: {}", context, e)),
        },
        _ => DatabaseError::Query(format!("Failed to {}: {}", context, e)),
    }
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // An in-memory SQLite database exists per connection; more than one
    // connection would each see an empty schema.
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS housing_cooperatives (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organisation_number TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            city TEXT NOT NULL,
            administrator_company TEXT,
            administrator_name TEXT NOT NULL,
            administrator_person_number TEXT NOT NULL,
            administrator_email TEXT NOT NULL,
            created_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::Migration(format!("Failed to create housing_cooperatives table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mortgage_deeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            credit_number TEXT NOT NULL,
            housing_cooperative_id INTEGER NOT NULL,
            apartment_address TEXT NOT NULL,
            apartment_postal_code TEXT NOT NULL,
            apartment_city TEXT NOT NULL,
            apartment_number TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN (
                'CREATED',
                'PENDING_BORROWER_SIGNATURE',
                'PENDING_HOUSING_COOPERATIVE_SIGNATURE',
                'COMPLETED'
            )),
            bank_id INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            created_by_email TEXT NOT NULL,
            FOREIGN KEY (housing_cooperative_id) REFERENCES housing_cooperatives(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::Migration(format!("Failed to create mortgage_deeds table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS borrowers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deed_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            person_number TEXT NOT NULL,
            email TEXT NOT NULL,
            ownership_percentage REAL NOT NULL,
            signature_timestamp DATETIME,
            FOREIGN KEY (deed_id) REFERENCES mortgage_deeds(id),
            UNIQUE (deed_id, person_number)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create borrowers table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS housing_cooperative_signers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mortgage_deed_id INTEGER NOT NULL,
            administrator_name TEXT NOT NULL,
            administrator_person_number TEXT NOT NULL,
            administrator_email TEXT NOT NULL,
            signature_timestamp DATETIME,
            FOREIGN KEY (mortgage_deed_id) REFERENCES mortgage_deeds(id),
            UNIQUE (mortgage_deed_id, administrator_person_number)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::Migration(format!(
            "Failed to create housing_cooperative_signers table: {}",
            e
        ))
    })?;

    // deed_id is intentionally not a foreign key: entries outlive their
    // deed and get the reference nulled on deed deletion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id INTEGER NOT NULL,
            deed_id INTEGER,
            action_type TEXT NOT NULL,
            user_id TEXT NOT NULL,
            description TEXT NOT NULL,
            timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create audit_logs table: {}", e)))?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_deeds_bank_id ON mortgage_deeds(bank_id)",
        "CREATE INDEX IF NOT EXISTS idx_deeds_status ON mortgage_deeds(status)",
        "CREATE INDEX IF NOT EXISTS idx_deeds_cooperative ON mortgage_deeds(housing_cooperative_id)",
        "CREATE INDEX IF NOT EXISTS idx_borrowers_deed_id ON borrowers(deed_id)",
        "CREATE INDEX IF NOT EXISTS idx_borrowers_person_number ON borrowers(person_number)",
        "CREATE INDEX IF NOT EXISTS idx_signers_deed_id ON housing_cooperative_signers(mortgage_deed_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_deed_id ON audit_logs(deed_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_logs(timestamp)",
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to create index: {}", e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:", 5).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_create_all_tables() {
        let pool = init_database("sqlite::memory:", 5).await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
             ('housing_cooperatives', 'mortgage_deeds', 'borrowers', \
              'housing_cooperative_signers', 'audit_logs')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 5);
    }
}
