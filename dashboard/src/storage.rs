use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

/// Durable key/value storage for client state (the local-storage of the CLI).
///
/// Every write is a single statement, so each key is updated atomically.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).with_context(|| format!("Open DB: {db_path}"))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .context("Create kv table")?;

        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("Read key {key}"))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, chrono::Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("Write key {key}"))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])
            .with_context(|| format!("Delete key {key}"))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM kv", []).context("Clear kv")?;
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }
}
