use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // In-memory and fresh databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id          TEXT PRIMARY KEY,
            point       TEXT NOT NULL,
            mu          REAL NOT NULL,
            max_degree  INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT '',
            config_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS polynomials (
            run_id  TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            stage   TEXT NOT NULL,
            degree  INTEGER NOT NULL,
            coeffs  TEXT NOT NULL,
            PRIMARY KEY (run_id, stage, degree)
        );

        CREATE INDEX IF NOT EXISTS idx_poly_run ON polynomials(run_id);
        CREATE INDEX IF NOT EXISTS idx_runs_created ON runs(created_at);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    tracing::info!(version = SCHEMA_VERSION, "schema initialized");

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "runs", "polynomials"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_wal_mode_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        // In-memory always reports "memory", on-disk would report "wal"
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert!(mode == "memory" || mode == "wal", "got mode: {mode}");
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO polynomials (run_id, stage, degree, coeffs) VALUES ('missing', 'physical', 0, '[]')",
            [],
        );
        assert!(result.is_err(), "orphan polynomial rows must be rejected");
    }

    #[test]
    fn test_delete_cascades_to_polynomials() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO runs (id, point, mu, max_degree, config_json) VALUES ('r1', 'L1', 0.01, 3, '{}');
             INSERT INTO polynomials (run_id, stage, degree, coeffs) VALUES ('r1', 'physical', 0, '[]');
             DELETE FROM runs WHERE id = 'r1';",
        )
        .unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM polynomials", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
