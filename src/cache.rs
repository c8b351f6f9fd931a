//! Versioned key-value store over SQLite.
//!
//! Auxiliary data (style metadata, file modification times) lives in named
//! [`Store`]s, one table each. The file carries a schema version row; a
//! mismatch on open wipes the file's content and starts fresh, the same
//! non-migrating policy the search index uses.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db;

/// Schema version for cache files.
pub const CACHE_VERSION: i64 = 1;

const NAME_RESERVED: [&str; 3] = ["dbinfo", "sqlite_sequence", "sqlite_master"];

/// Key-value store manager: one SQLite file, one table per [`Store`].
pub struct Cache {
    pool: SqlitePool,
}

impl Cache {
    /// Open (or create, or destructively reinitialize) the cache at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;

        let version: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT value FROM dbinfo WHERE key = 'version'")
                .fetch_optional(&pool)
                .await;

        let valid = matches!(&version, Ok(Some(v)) if v.parse::<i64>() == Ok(CACHE_VERSION));
        if !valid {
            if version.is_ok() {
                debug!(path = %path.display(), "clearing stale cache");
                let tables = user_tables(&pool).await?;
                for table in tables {
                    sqlx::query(&format!("DROP TABLE IF EXISTS `{table}`"))
                        .execute(&pool)
                        .await?;
                }
                sqlx::query("DROP TABLE IF EXISTS dbinfo")
                    .execute(&pool)
                    .await?;
            }
            sqlx::query("CREATE TABLE dbinfo (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)")
                .execute(&pool)
                .await?;
            sqlx::query("INSERT INTO dbinfo VALUES ('version', ?)")
                .bind(CACHE_VERSION.to_string())
                .execute(&pool)
                .await?;
        }

        Ok(Self { pool })
    }

    /// Open the [`Store`] called `name`, creating its table if needed.
    ///
    /// Names are restricted to `[a-z][a-z0-9_]*`, at most 100 characters.
    pub async fn store(&self, name: &str) -> Result<Store> {
        validate_name(name)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS `{name}` (\
             key TEXT PRIMARY KEY, \
             value TEXT NOT NULL, \
             updated REAL NOT NULL DEFAULT 0)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(Store {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }
}

/// One named key-value table. Values are stored as JSON.
pub struct Store {
    pool: SqlitePool,
    name: String,
}

impl Store {
    /// Value for `key`, or `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value: Option<String> = sqlx::query_scalar(&format!(
            "SELECT value FROM `{}` WHERE key = ?",
            self.name
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match value {
            Some(js) => Ok(Some(serde_json::from_str(&js)?)),
            None => Ok(None),
        }
    }

    /// Store `value` for `key`, overwriting.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let js = serde_json::to_string(value)?;
        sqlx::query(&format!(
            "INSERT INTO `{}` (key, value, updated) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated = excluded.updated",
            self.name
        ))
        .bind(key)
        .bind(js)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove `key`. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM `{}` WHERE key = ?", self.name))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All keys in this store.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("SELECT key FROM `{}`", self.name))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    /// When `key` was last written, seconds since the epoch; 0.0 if absent.
    pub async fn updated(&self, key: &str) -> Result<f64> {
        let t: Option<f64> = sqlx::query_scalar(&format!(
            "SELECT updated FROM `{}` WHERE key = ?",
            self.name
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(t.unwrap_or(0.0))
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 100
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !NAME_RESERVED.contains(&name);
    if !ok {
        anyhow::bail!("invalid store name: {name:?}");
    }
    Ok(())
}

async fn user_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| r.get::<String, _>("name"))
        .filter(|n| n != "dbinfo")
        .collect())
}
