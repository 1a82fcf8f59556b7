//! SQLite-backed action payload store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, DatabaseName, OpenFlags, OptionalExtension, params};

use crate::payload::{ActionPayload, ActionStore};

pub fn derive_db_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(name);
    if path.extension().is_none() {
        path.set_extension("clipserve.db");
    }
    path
}

pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Open the database at `path`, creating it and its schema when missing.
pub fn open_or_create_store(path: &Path) -> Result<Connection> {
    ensure_parent_dirs(path)?;
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_READ_WRITE,
    )
    .with_context(|| format!("failed to open {}", path.display()))?;
    configure_pragmas(&conn)?;
    install_schema(&conn)?;
    Ok(conn)
}

/// Open an existing database.
pub fn open_store(path: &Path) -> Result<Connection> {
    if !path.exists() {
        bail!("database not found at {}", path.display());
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .with_context(|| format!("failed to open {}", path.display()))?;
    configure_pragmas(&conn)?;
    install_schema(&conn)?;
    Ok(conn)
}

pub fn configure_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(Some(DatabaseName::Main), "journal_mode", &"WAL")?;
    conn.pragma_update(Some(DatabaseName::Main), "synchronous", &"NORMAL")?;
    conn.pragma_update(Some(DatabaseName::Main), "temp_store", &"MEMORY")?;
    Ok(())
}

pub fn install_schema(conn: &Connection) -> Result<()> {
    const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS action_data (
  id    INTEGER PRIMARY KEY,
  cbor  BLOB NOT NULL
);
"#;

    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn load_payload(conn: &Connection, action_id: i64) -> Result<ActionPayload> {
    let cbor: Option<Vec<u8>> = conn
        .query_row(
            "SELECT cbor FROM action_data WHERE id = ?1",
            [action_id],
            |row| row.get(0),
        )
        .optional()?;
    match cbor {
        Some(bytes) => serde_cbor::from_slice(&bytes)
            .with_context(|| format!("failed to decode payload for action {action_id}")),
        None => Ok(ActionPayload::new()),
    }
}

pub fn save_payload(conn: &Connection, action_id: i64, payload: &ActionPayload) -> Result<()> {
    let cbor = serde_cbor::to_vec(payload)
        .with_context(|| format!("failed to encode payload for action {action_id}"))?;
    conn.execute(
        "INSERT INTO action_data (id, cbor) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET cbor = excluded.cbor",
        params![action_id, cbor],
    )?;
    Ok(())
}

pub fn list_action_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM action_data ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Remove the payload for `action_id`; returns whether a row existed.
pub fn clear_payload(conn: &Connection, action_id: i64) -> Result<bool> {
    let rows = conn.execute("DELETE FROM action_data WHERE id = ?1", [action_id])?;
    Ok(rows > 0)
}

/// [`ActionStore`] over a single SQLite connection.
pub struct SqliteActionStore {
    conn: Mutex<Connection>,
}

impl SqliteActionStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_or_create_store(path)?))
    }
}

impl ActionStore for SqliteActionStore {
    fn get(&self, action_id: i64) -> Result<ActionPayload> {
        let conn = self.conn.lock().expect("action store poisoned");
        load_payload(&conn, action_id)
    }

    fn set(&self, action_id: i64, payload: &ActionPayload) -> Result<()> {
        let conn = self.conn.lock().expect("action store poisoned");
        save_payload(&conn, action_id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DataValue;

    fn sample() -> ActionPayload {
        let mut payload = ActionPayload::new();
        payload.insert("text/plain".into(), DataValue::Bytes(b"hello".to_vec()));
        payload.insert("count".into(), DataValue::Int(3));
        payload.insert("ratio".into(), DataValue::Float(0.5));
        payload
    }

    #[test]
    fn missing_payload_is_empty() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        install_schema(&conn)?;
        assert!(load_payload(&conn, 9)?.is_empty());
        Ok(())
    }

    #[test]
    fn save_overwrites_and_lists() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        install_schema(&conn)?;
        save_payload(&conn, 2, &sample())?;
        let mut changed = sample();
        changed.insert("count".into(), DataValue::Int(4));
        save_payload(&conn, 2, &changed)?;
        save_payload(&conn, 1, &ActionPayload::new())?;

        assert_eq!(load_payload(&conn, 2)?, changed);
        assert_eq!(list_action_ids(&conn)?, vec![1, 2]);
        assert!(clear_payload(&conn, 2)?);
        assert!(!clear_payload(&conn, 2)?);
        assert_eq!(list_action_ids(&conn)?, vec![1]);
        Ok(())
    }

    #[test]
    fn file_store_persists_across_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("actions.clipserve.db");
        {
            let store = SqliteActionStore::open(&path)?;
            store.set(5, &sample())?;
        }
        let store = SqliteActionStore::new(open_store(&path)?);
        assert_eq!(store.get(5)?, sample());
        Ok(())
    }

    #[test]
    fn derive_db_path_adds_extension() {
        assert_eq!(derive_db_path("actions"), PathBuf::from("actions.clipserve.db"));
        assert_eq!(derive_db_path("a.db"), PathBuf::from("a.db"));
    }
}
