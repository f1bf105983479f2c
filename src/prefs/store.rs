use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

type Watchers = HashMap<String, watch::Sender<Option<Value>>>;

/// Durable key-value preference storage backed by SQLite.
///
/// Values are JSON-encoded scalars. Every key can be observed: a subscriber
/// receives the current value immediately and again after every write to
/// that key. rusqlite is blocking, so each operation runs on
/// `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct PreferenceStore {
    conn: Arc<Mutex<Connection>>,
    watchers: Arc<Mutex<Watchers>>,
}

impl PreferenceStore {
    /// Open or create the preference database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir: {}", e))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| format!("Failed to open preference database at {:?}: {}", db_path, e))?;
        let store = Self::with_connection(conn)?;
        info!("Opened preference store at {:?}", db_path);
        Ok(store)
    }

    /// Non-durable store, for tests and previews.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory preference database: {}", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, String> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| format!("Failed to create preferences table: {}", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Read the current value for `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, String> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Value>, String> {
            let conn = lock(&conn)?;
            read_value(&conn, &key)
        })
        .await
        .map_err(|e| format!("Preference read task panicked: {}", e))?
    }

    /// Write `value` under `key` and notify observers of that key.
    pub async fn set(&self, key: &str, value: Value) -> Result<(), String> {
        let conn = self.conn.clone();
        let watchers = self.watchers.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let watchers = lock(&watchers)?;
            {
                let conn = lock(&conn)?;
                write_value(&conn, &key, &value)?;
            }
            if let Some(tx) = watchers.get(&key) {
                tx.send_replace(Some(value));
            }
            debug!("Stored preference '{}'", key);
            Ok(())
        })
        .await
        .map_err(|e| format!("Preference write task panicked: {}", e))?
    }

    /// Write `value` only when `key` has never been written.
    /// Returns whether the value was stored.
    pub async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, String> {
        let conn = self.conn.clone();
        let watchers = self.watchers.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, String> {
            let watchers = lock(&watchers)?;
            let inserted = {
                let conn = lock(&conn)?;
                let json = serde_json::to_string(&value)
                    .map_err(|e| format!("Failed to encode preference '{}': {}", key, e))?;
                conn.execute(
                    "INSERT OR IGNORE INTO preferences (key, value) VALUES (?1, ?2)",
                    params![key, json],
                )
                .map_err(|e| format!("Failed to seed preference '{}': {}", key, e))?
            };
            if inserted > 0 {
                if let Some(tx) = watchers.get(&key) {
                    tx.send_replace(Some(value));
                }
            }
            Ok(inserted > 0)
        })
        .await
        .map_err(|e| format!("Preference write task panicked: {}", e))?
    }

    /// Subscribe to `key`. The stream yields the current value first, then
    /// every subsequent write. Dropping the stream and calling `observe` again
    /// restarts from the latest value.
    pub async fn observe(&self, key: &str) -> Result<WatchStream<Option<Value>>, String> {
        let conn = self.conn.clone();
        let watchers = self.watchers.clone();
        let key = key.to_string();
        let rx = tokio::task::spawn_blocking(move || -> Result<_, String> {
            let mut watchers = lock(&watchers)?;
            if let Some(tx) = watchers.get(&key) {
                return Ok(tx.subscribe());
            }
            let current = {
                let conn = lock(&conn)?;
                read_value(&conn, &key)?
            };
            let (tx, rx) = watch::channel(current);
            watchers.insert(key, tx);
            Ok(rx)
        })
        .await
        .map_err(|e| format!("Preference observe task panicked: {}", e))??;

        Ok(WatchStream::new(rx))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, String> {
    mutex
        .lock()
        .map_err(|e| format!("Preference store lock poisoned: {}", e))
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>, String> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM preferences WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| format!("Failed to read preference '{}': {}", key, e))?;

    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| format!("Failed to decode preference '{}': {}", key, e))
    })
    .transpose()
}

fn write_value(conn: &Connection, key: &str, value: &Value) -> Result<(), String> {
    let json = serde_json::to_string(value)
        .map_err(|e| format!("Failed to encode preference '{}': {}", key, e))?;
    conn.execute(
        "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
        params![key, json],
    )
    .map_err(|e| format!("Failed to store preference '{}': {}", key, e))?;
    Ok(())
}
