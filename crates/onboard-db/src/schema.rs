//! Table definitions and migration runner.
//!
//! Every collection is a SCHEMAFULL table holding the document body in a
//! FLEXIBLE `data` object next to the optimistic `version` counter.

use onboard_core::store::Collection;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "document_collections",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = "\
DEFINE TABLE profiles SCHEMAFULL;
DEFINE FIELD data ON TABLE profiles TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD version ON TABLE profiles TYPE int DEFAULT 0;
DEFINE FIELD updated_at ON TABLE profiles TYPE datetime DEFAULT time::now();

DEFINE TABLE allowlist SCHEMAFULL;
DEFINE FIELD data ON TABLE allowlist TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD version ON TABLE allowlist TYPE int DEFAULT 0;
DEFINE FIELD updated_at ON TABLE allowlist TYPE datetime DEFAULT time::now();

DEFINE TABLE admin_records SCHEMAFULL;
DEFINE FIELD data ON TABLE admin_records TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD version ON TABLE admin_records TYPE int DEFAULT 0;
DEFINE FIELD updated_at ON TABLE admin_records TYPE datetime DEFAULT time::now();

DEFINE TABLE admins SCHEMAFULL;
DEFINE FIELD data ON TABLE admins TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD version ON TABLE admins TYPE int DEFAULT 0;
DEFINE FIELD updated_at ON TABLE admins TYPE datetime DEFAULT time::now();

DEFINE TABLE credentials SCHEMAFULL;
DEFINE FIELD data ON TABLE credentials TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD version ON TABLE credentials TYPE int DEFAULT 0;
DEFINE FIELD updated_at ON TABLE credentials TYPE datetime DEFAULT time::now();
";

/// Bring the database up to the latest schema version. Safe to call on
/// every start; applied versions are recorded in `_migration`.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}
