//! Schema migrations.
//!
//! An ordered list of idempotent steps, applied in one transaction at
//! startup. New steps are only ever appended.

use sqlx::SqlitePool;
use tracing::debug;

use crate::common::error::StoreResult;

/// (name, statement) pairs in application order.
pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create attributes",
        r#"CREATE TABLE IF NOT EXISTS attributes (
            attribute_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT    NOT NULL UNIQUE
        )"#,
    ),
    (
        "create bridges",
        r#"CREATE TABLE IF NOT EXISTS bridges (
            bridge_id           INTEGER PRIMARY KEY AUTOINCREMENT,
            source_guild        TEXT    NOT NULL,
            source_channel      TEXT    NOT NULL,
            destination_guild   TEXT    NOT NULL,
            destination_channel TEXT    NOT NULL
        )"#,
    ),
    (
        "create bridge_conditions",
        r#"CREATE TABLE IF NOT EXISTS bridge_conditions (
            condition_id INTEGER PRIMARY KEY AUTOINCREMENT,
            bridge_id    INTEGER NOT NULL,
            attribute    TEXT    NOT NULL,
            regex        TEXT    NOT NULL,
            FOREIGN KEY(bridge_id) REFERENCES bridges(bridge_id) ON DELETE CASCADE,
            FOREIGN KEY(attribute) REFERENCES attributes(name)
        )"#,
    ),
    (
        "seed attributes",
        r#"INSERT OR IGNORE INTO attributes(name)
           VALUES ('uid'), ('uname'), ('text'), ('cid'), ('cname')"#,
    ),
    (
        "create bridge_mentions",
        r#"CREATE TABLE IF NOT EXISTS bridge_mentions (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            bridge_id INTEGER NOT NULL,
            mention   TEXT    NOT NULL,
            FOREIGN KEY(bridge_id) REFERENCES bridges(bridge_id) ON DELETE CASCADE
        )"#,
    ),
    (
        "index bridges by source",
        "CREATE INDEX IF NOT EXISTS idx_bridges_source_channel ON bridges(source_channel)",
    ),
];

/// Apply all migration steps.
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    let mut tx = pool.begin().await?;
    for (name, sql) in MIGRATIONS {
        debug!(step = name, "Applying migration");
        sqlx::query(sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}
