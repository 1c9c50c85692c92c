//! Versioned schema migrations.
//!
//! Each migration runs at most once; applied versions are recorded in
//! `schema_migrations`. Timestamps are stored as RFC 3339 TEXT in UTC so
//! freshness checks can compare lexicographically.

use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_isin_cache",
        sql: r#"
CREATE TABLE IF NOT EXISTS isin_cache (
    alias TEXT NOT NULL,
    alias_type TEXT NOT NULL,
    isin TEXT,
    resolution_status TEXT NOT NULL,
    confidence DOUBLE NOT NULL DEFAULT 0.0,
    source TEXT,
    expires_at TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY(alias, alias_type)
);
"#,
    },
    Migration {
        version: "0002_fund_holdings",
        sql: r#"
CREATE TABLE IF NOT EXISTS fund_holdings (
    isin TEXT PRIMARY KEY,
    fund_name TEXT,
    payload TEXT NOT NULL,
    source TEXT NOT NULL,
    cached_at TEXT NOT NULL
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_isin_cache_expires_at ON isin_cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_isin_cache_status ON isin_cache(resolution_status);
CREATE INDEX IF NOT EXISTS idx_fund_holdings_cached_at ON fund_holdings(cached_at);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let connection = Connection::open_in_memory().expect("open in-memory db");
        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .expect("count migrations");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn creates_expected_tables() {
        let connection = Connection::open_in_memory().expect("open in-memory db");
        apply_migrations(&connection).expect("apply");

        for table in ["isin_cache", "fund_holdings"] {
            let count: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                    [table],
                    |row| row.get(0),
                )
                .expect("lookup table");
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
