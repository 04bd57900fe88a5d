//! Named configuration store.
//!
//! Task and model configurations are stored as JSON documents keyed by a
//! lowercased name. `add` refuses existing names and `update` refuses
//! missing ones, so a typo never silently creates a second configuration.

use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for named configuration storage backends.
pub trait ConfigStore: Send + Sync {
    /// Returns the configuration stored under a name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the name is absent.
    fn get(&self, name: &str) -> Result<serde_json::Value>;

    /// Stores a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the name already exists.
    fn add(&self, config: &serde_json::Value, name: &str) -> Result<()>;

    /// Replaces an existing configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the name is absent.
    fn update(&self, config: &serde_json::Value, name: &str) -> Result<()>;

    /// Deletes a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the name is absent.
    fn delete(&self, name: &str) -> Result<()>;

    /// Lists all stored names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    fn list_names(&self) -> Result<Vec<String>>;
}

/// `SQLite`-backed configuration store.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteConfigStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_config_store".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_config_store_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the default user-scope database path.
    #[must_use]
    pub fn default_user_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|d| d.config_dir().join("scrub").join("configs.db"))
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS configs (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_configs_table".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| Error::OperationFailed {
            operation: "lock_config_store".to_string(),
            cause: e.to_string(),
        })
    }

    fn exists(conn: &Connection, name: &str) -> Result<bool> {
        conn.query_row("SELECT 1 FROM configs WHERE name = ?1", params![name], |_| {
            Ok(())
        })
        .optional()
        .map(|row| row.is_some())
        .map_err(|e| Error::OperationFailed {
            operation: "query_config".to_string(),
            cause: e.to_string(),
        })
    }

    fn write(conn: &Connection, name: &str, config: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string(config).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO configs (name, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET body = ?2, updated_at = ?3",
            params![name, body, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "write_config".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Dumps every stored configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error on database or I/O failure.
    pub fn backup(&self, path: impl AsRef<Path>) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name, body FROM configs ORDER BY name")
            .map_err(|e| Error::OperationFailed {
                operation: "backup_configs".to_string(),
                cause: e.to_string(),
            })?;

        let mut all = serde_json::Map::new();
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "backup_configs".to_string(),
                cause: e.to_string(),
            })?;
        for row in rows {
            let (name, body) = row.map_err(|e| Error::OperationFailed {
                operation: "backup_configs".to_string(),
                cause: e.to_string(),
            })?;
            let value: serde_json::Value =
                serde_json::from_str(&body).map_err(|e| Error::OperationFailed {
                    operation: "backup_configs".to_string(),
                    cause: format!("corrupt body for '{name}': {e}"),
                })?;
            all.insert(name, value);
        }

        let json = serde_json::to_string_pretty(&serde_json::Value::Object(all)).map_err(|e| {
            Error::OperationFailed {
                operation: "backup_configs".to_string(),
                cause: e.to_string(),
            }
        })?;
        std::fs::write(path.as_ref(), json).map_err(|e| Error::OperationFailed {
            operation: "backup_configs".to_string(),
            cause: format!("{}: {e}", path.as_ref().display()),
        })
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, name: &str) -> Result<serde_json::Value> {
        let name = name.to_lowercase();
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM configs WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "get_config".to_string(),
                cause: e.to_string(),
            })?;

        let body = body.ok_or_else(|| Error::Configuration {
            name: name.clone(),
            cause: "does not exist".to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| Error::OperationFailed {
            operation: "get_config".to_string(),
            cause: format!("corrupt body for '{name}': {e}"),
        })
    }

    fn add(&self, config: &serde_json::Value, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        let conn = self.lock()?;
        if Self::exists(&conn, &name)? {
            return Err(Error::Configuration {
                name,
                cause: "already exists".to_string(),
            });
        }
        Self::write(&conn, &name, config)
    }

    fn update(&self, config: &serde_json::Value, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        let conn = self.lock()?;
        if !Self::exists(&conn, &name)? {
            return Err(Error::Configuration {
                name,
                cause: "does not exist".to_string(),
            });
        }
        Self::write(&conn, &name, config)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM configs WHERE name = ?1", params![name])
            .map_err(|e| Error::OperationFailed {
                operation: "delete_config".to_string(),
                cause: e.to_string(),
            })?;
        if deleted == 0 {
            return Err(Error::Configuration {
                name,
                cause: "does not exist".to_string(),
            });
        }
        Ok(())
    }

    fn list_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM configs ORDER BY name")
            .map_err(|e| Error::OperationFailed {
                operation: "list_configs".to_string(),
                cause: e.to_string(),
            })?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::OperationFailed {
                operation: "list_configs".to_string(),
                cause: e.to_string(),
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "list_configs".to_string(),
                cause: e.to_string(),
            })?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_get_roundtrip() {
        let store = SqliteConfigStore::in_memory().unwrap();
        let config = json!({"model": {"kind": "pattern"}, "pattern": r"\d+"});

        store.add(&config, "Numbers").unwrap();
        // Names are lowercased keys.
        assert_eq!(store.get("numbers").unwrap(), config);
        assert_eq!(store.get("NUMBERS").unwrap(), config);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let store = SqliteConfigStore::in_memory().unwrap();
        store.add(&json!({}), "emails").unwrap();

        assert!(matches!(
            store.add(&json!({}), "EMAILS"),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_update_missing_fails() {
        let store = SqliteConfigStore::in_memory().unwrap();
        assert!(store.update(&json!({}), "ghost").is_err());

        store.add(&json!({"v": 1}), "real").unwrap();
        store.update(&json!({"v": 2}), "real").unwrap();
        assert_eq!(store.get("real").unwrap()["v"], 2);
    }

    #[test]
    fn test_delete() {
        let store = SqliteConfigStore::in_memory().unwrap();
        store.add(&json!({}), "gone").unwrap();
        store.delete("gone").unwrap();

        assert!(store.get("gone").is_err());
        assert!(store.delete("gone").is_err());
    }

    #[test]
    fn test_list_names_sorted() {
        let store = SqliteConfigStore::in_memory().unwrap();
        store.add(&json!({}), "zeta").unwrap();
        store.add(&json!({}), "alpha").unwrap();

        assert_eq!(store.list_names().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_backup_writes_all_configs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteConfigStore::in_memory().unwrap();
        store.add(&json!({"a": 1}), "one").unwrap();
        store.add(&json!({"b": 2}), "two").unwrap();

        let path = dir.path().join("backup.json");
        store.backup(&path).unwrap();

        let dump: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(dump["one"]["a"], 1);
        assert_eq!(dump["two"]["b"], 2);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs.db");

        {
            let store = SqliteConfigStore::new(&path).unwrap();
            store.add(&json!({"kept": true}), "task").unwrap();
        }
        let store = SqliteConfigStore::new(&path).unwrap();
        assert_eq!(store.get("task").unwrap()["kept"], true);
    }
}
