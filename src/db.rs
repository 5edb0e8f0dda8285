use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{info, warn};

pub type Document = Map<String, Value>;

/// What the pipeline needs from a document store.
pub trait RecordStore {
    /// Inserts every document; returns how many were written.
    fn insert(&mut self, documents: &[Document]) -> Result<usize>;

    fn find_all(&self) -> Result<Vec<Document>>;

    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// One JSON document per row, one table per collection.
pub struct SqliteStore {
    conn: Connection,
    collection: String,
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection, collection: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {c} (
            id          INTEGER PRIMARY KEY,
            item_id     TEXT,
            keyword     TEXT,
            body        TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_{c}_item_id ON {c}(item_id);
        CREATE INDEX IF NOT EXISTS idx_{c}_keyword ON {c}(keyword);
        ",
        c = collection
    ))?;
    Ok(())
}

fn check_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid collection name {:?}", name);
    }
    Ok(())
}

impl SqliteStore {
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        check_collection_name(collection)?;
        let conn = connect(path)?;
        init_schema(&conn, collection)?;
        info!("Connected to document store: {}.{}", path.display(), collection);
        Ok(SqliteStore {
            conn,
            collection: collection.to_string(),
        })
    }

    #[cfg(test)]
    pub fn in_memory(collection: &str) -> Result<Self> {
        check_collection_name(collection)?;
        let conn = Connection::open_in_memory()?;
        init_schema(&conn, collection)?;
        Ok(SqliteStore {
            conn,
            collection: collection.to_string(),
        })
    }

    pub fn count(&self) -> Result<usize> {
        let n: usize = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.collection),
            [],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}

impl RecordStore for SqliteStore {
    fn insert(&mut self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            warn!("No documents to insert");
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (item_id, keyword, body) VALUES (?1, ?2, ?3)",
                self.collection
            ))?;
            for doc in documents {
                let item_id = doc.get("item_id").and_then(Value::as_str);
                let keyword = doc.get("keyword").and_then(Value::as_str);
                let body = serde_json::to_string(doc)?;
                count += stmt.execute(rusqlite::params![item_id, keyword, body])?;
            }
        }
        tx.commit()?;
        info!("Inserted {} documents", count);
        Ok(count)
    }

    fn find_all(&self) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT body FROM {} ORDER BY id", self.collection))?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|b| serde_json::from_str::<Document>(b).context("corrupt document body"))
            .collect()
    }

    fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow::anyhow!("failed to close document store: {}", e))?;
        info!("Document store connection closed");
        Ok(())
    }
}
