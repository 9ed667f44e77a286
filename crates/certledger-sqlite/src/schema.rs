use certledger_core::error::{LedgerError, Result};
use rusqlite::Connection;

/// Schema version this build reads and writes
pub const SCHEMA_VERSION: u32 = 2;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "stock_ledger",
        sql: "
            CREATE TABLE IF NOT EXISTS batches (
                batch_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS branch_stock (
                batch_id TEXT NOT NULL REFERENCES batches(batch_id),
                branch_code TEXT NOT NULL,
                certificates INTEGER NOT NULL DEFAULT 0 CHECK (certificates >= 0),
                medals INTEGER NOT NULL DEFAULT 0 CHECK (medals >= 0),
                updated_at TEXT NOT NULL,
                PRIMARY KEY (batch_id, branch_code)
            );

            CREATE INDEX IF NOT EXISTS idx_branch_stock_branch
                ON branch_stock(branch_code);

            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id TEXT NOT NULL,
                action TEXT NOT NULL,
                description TEXT NOT NULL,
                source_branch TEXT,
                dest_branch TEXT,
                certificate_delta INTEGER NOT NULL,
                medal_delta INTEGER NOT NULL,
                old_values TEXT NOT NULL,
                new_values TEXT NOT NULL,
                actor TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_entries_batch
                ON ledger_entries(batch_id);
            CREATE INDEX IF NOT EXISTS idx_ledger_entries_created
                ON ledger_entries(created_at);
            CREATE INDEX IF NOT EXISTS idx_ledger_entries_action
                ON ledger_entries(action);
        ",
    },
    SchemaStep {
        version: 2,
        name: "branch_regions",
        sql: "
            CREATE TABLE IF NOT EXISTS branch_regions (
                branch_code TEXT PRIMARY KEY,
                region TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_branch_regions_region
                ON branch_regions(region);
        ",
    },
];

/// Current schema version recorded in the database file
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map(|v| v as u32)
        .map_err(|e| LedgerError::Persistence(e.to_string()))
}

/// Bring the schema up to [`SCHEMA_VERSION`]
///
/// Each pending step runs in its own transaction together with the
/// `user_version` bump. A database written by a newer build is refused.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let current = current_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(LedgerError::Config(format!(
            "database schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }

    for step in STEPS.iter().filter(|s| s.version > current) {
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        tx.execute_batch(step.sql)
            .map_err(|e| LedgerError::Persistence(format!("schema step {}: {}", step.name, e)))?;
        tx.pragma_update(None, "user_version", step.version as i64)
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        tx.commit()
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        tracing::info!(
            "Applied schema step {} ({})",
            step.version,
            step.name
        );
    }

    current_version(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);

        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('batches', 'branch_stock', 'ledger_entries', 'branch_regions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99i64).unwrap();
        assert!(matches!(migrate(&mut conn), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_negative_stock_rejected_by_check() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO batches (batch_id, created_at) VALUES ('B-1', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO branch_stock (batch_id, branch_code, certificates, medals, updated_at)
             VALUES ('B-1', 'SND', -1, 0, '2026-01-01T00:00:00.000000Z')",
            [],
        );
        assert!(result.is_err());
    }
}
