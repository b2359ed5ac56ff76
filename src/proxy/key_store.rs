// API key lookup backends
use async_trait::async_trait;
use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{AppError, AppResult};
use crate::proxy::config::KeyStoreConfig;

/// Read-only key/value lookup used by the authorizer.
///
/// `Ok(None)` means the key is unknown; `Err` means the store itself could
/// not be reached and must not be read as "unknown".
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
}

/// In-process store
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: DashMap<String, String>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.keys.insert(key.into(), payload.into());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.keys.get(key).map(|entry| entry.value().clone()))
    }
}

/// SQLite-backed store. Queries run on the blocking pool.
pub struct SqliteKeyStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteKeyStore {
    pub fn open(path: impl AsRef<Path>, table: &str) -> AppResult<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::Config(format!("Invalid key table name: {:?}", table)));
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            table
        ))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        })
    }

    /// Insert or replace a key (admin/seeding use)
    pub fn put(&self, key: &str, payload: &str) -> AppResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Store("SQLite connection lock poisoned".to_string()))?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                self.table
            ),
            [key, payload],
        )?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn.clone();
        let query = format!("SELECT value FROM {} WHERE key = ?1", self.table);
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> AppResult<Option<String>> {
            let conn = conn
                .lock()
                .map_err(|_| AppError::Store("SQLite connection lock poisoned".to_string()))?;
            let value = conn
                .query_row(&query, [&key], |row| row.get::<_, String>(0))
                .optional()?;
            Ok(value)
        })
        .await
        .map_err(|e| AppError::Store(format!("Key lookup task failed: {}", e)))?
    }
}

/// Build the configured key store
pub fn build_key_store(config: &KeyStoreConfig) -> AppResult<Arc<dyn KeyStore>> {
    match config {
        KeyStoreConfig::Memory { keys } => {
            let store = MemoryKeyStore::new();
            for (key, payload) in keys {
                // Bare strings are stored verbatim, structured values as JSON text
                let payload = match payload {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                store.insert(key.clone(), payload);
            }
            tracing::info!("Loaded {} API key(s) into memory store", store.len());
            Ok(Arc::new(store))
        }
        KeyStoreConfig::Sqlite { path, table } => {
            let store = SqliteKeyStore::open(path, table)?;
            tracing::info!("Using SQLite key store at {} (table {})", path, table);
            Ok(Arc::new(store))
        }
    }
}

/// Generate a fresh API key
pub fn generate_api_key() -> String {
    format!("fk-{}", uuid::Uuid::new_v4().simple())
}
