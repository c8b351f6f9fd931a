//! Fixture: a miniature Zotero database to sync against.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub const TYPE_NOTE: i64 = 1;
pub const TYPE_JOURNAL_ARTICLE: i64 = 2;
pub const TYPE_BOOK: i64 = 3;
pub const TYPE_WEBPAGE: i64 = 4;
pub const TYPE_ATTACHMENT: i64 = 14;

pub const ROLE_AUTHOR: i64 = 1;
pub const ROLE_EDITOR: i64 = 2;

const SCHEMA: &str = "
CREATE TABLE items (
    itemID INTEGER PRIMARY KEY,
    itemTypeID INTEGER NOT NULL,
    dateModified TEXT NOT NULL,
    key TEXT NOT NULL UNIQUE,
    libraryID INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE itemTypes (itemTypeID INTEGER PRIMARY KEY, typeName TEXT);
CREATE TABLE deletedItems (itemID INTEGER PRIMARY KEY, dateDeleted TEXT);
CREATE TABLE creators (creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT);
CREATE TABLE creatorTypes (creatorTypeID INTEGER PRIMARY KEY, creatorType TEXT);
CREATE TABLE itemCreators (
    itemID INTEGER,
    creatorID INTEGER,
    creatorTypeID INTEGER,
    orderIndex INTEGER
);
CREATE TABLE collections (collectionID INTEGER PRIMARY KEY, collectionName TEXT, key TEXT);
CREATE TABLE collectionItems (collectionID INTEGER, itemID INTEGER);
CREATE TABLE itemAttachments (itemID INTEGER PRIMARY KEY, parentItemID INTEGER, path TEXT);
CREATE TABLE itemData (itemID INTEGER, fieldID INTEGER, valueID INTEGER);
CREATE TABLE itemDataValues (valueID INTEGER PRIMARY KEY, value TEXT);
CREATE TABLE fields (fieldID INTEGER PRIMARY KEY, fieldName TEXT);
CREATE TABLE itemNotes (itemID INTEGER PRIMARY KEY, parentItemID INTEGER, note TEXT);
CREATE TABLE tags (tagID INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE itemTags (itemID INTEGER, tagID INTEGER);

INSERT INTO itemTypes VALUES (1, 'note');
INSERT INTO itemTypes VALUES (2, 'journalArticle');
INSERT INTO itemTypes VALUES (3, 'book');
INSERT INTO itemTypes VALUES (4, 'webpage');
INSERT INTO itemTypes VALUES (14, 'attachment');

INSERT INTO creatorTypes VALUES (1, 'author');
INSERT INTO creatorTypes VALUES (2, 'editor');
";

/// A temp directory laid out like a Zotero data directory, with an open
/// writable connection for mutating the fixture mid-test.
pub struct Source {
    pub dir: tempfile::TempDir,
    pub pool: SqlitePool,
}

impl Source {
    pub async fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("storage")).unwrap();
        std::fs::create_dir_all(dir.path().join("styles")).unwrap();

        // Plain rollback journal so every write lands in the main file
        // (and bumps its mtime) immediately.
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            dir.path().join("zotero.sqlite").display()
        ))
        .unwrap()
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Delete);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::raw_sql(SCHEMA).execute(&pool).await.unwrap();

        Self { dir, pool }
    }

    pub fn datadir(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.dir.path().join("storage")
    }

    pub async fn add_item(&self, id: i64, key: &str, type_id: i64, modified: &str) {
        sqlx::query("INSERT INTO items (itemID, itemTypeID, dateModified, key) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(type_id)
            .bind(modified)
            .bind(key)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn touch_item(&self, id: i64, modified: &str) {
        sqlx::query("UPDATE items SET dateModified = ? WHERE itemID = ?")
            .bind(modified)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn tombstone(&self, id: i64) {
        sqlx::query("INSERT INTO deletedItems VALUES (?, '2099-01-01 00:00:00')")
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_field(&self, item_id: i64, name: &str, value: &str) {
        let field_id: Option<i64> =
            sqlx::query_scalar("SELECT fieldID FROM fields WHERE fieldName = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .unwrap();
        let field_id = match field_id {
            Some(id) => id,
            None => {
                let next: i64 =
                    sqlx::query_scalar("SELECT COALESCE(MAX(fieldID), 0) + 1 FROM fields")
                        .fetch_one(&self.pool)
                        .await
                        .unwrap();
                sqlx::query("INSERT INTO fields VALUES (?, ?)")
                    .bind(next)
                    .bind(name)
                    .execute(&self.pool)
                    .await
                    .unwrap();
                next
            }
        };

        let value_id: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(valueID), 0) + 1 FROM itemDataValues")
                .fetch_one(&self.pool)
                .await
                .unwrap();
        sqlx::query("INSERT INTO itemDataValues VALUES (?, ?)")
            .bind(value_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO itemData VALUES (?, ?, ?)")
            .bind(item_id)
            .bind(field_id)
            .bind(value_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn add_creator(
        &self,
        item_id: i64,
        given: Option<&str>,
        family: Option<&str>,
        role_id: i64,
        order: i64,
    ) {
        let creator_id: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(creatorID), 0) + 1 FROM creators")
                .fetch_one(&self.pool)
                .await
                .unwrap();
        sqlx::query("INSERT INTO creators VALUES (?, ?, ?)")
            .bind(creator_id)
            .bind(given)
            .bind(family)
            .execute(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO itemCreators VALUES (?, ?, ?, ?)")
            .bind(item_id)
            .bind(creator_id)
            .bind(role_id)
            .bind(order)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn add_tag(&self, item_id: i64, name: &str) {
        let tag_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(tagID), 0) + 1 FROM tags")
            .fetch_one(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO tags VALUES (?, ?)")
            .bind(tag_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO itemTags VALUES (?, ?)")
            .bind(item_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn add_collection(&self, coll_id: i64, key: &str, name: &str, item_id: i64) {
        sqlx::query("INSERT OR IGNORE INTO collections VALUES (?, ?, ?)")
            .bind(coll_id)
            .bind(name)
            .bind(key)
            .execute(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO collectionItems VALUES (?, ?)")
            .bind(coll_id)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn add_note(&self, note_id: i64, key: &str, parent_id: i64, html: &str) {
        self.add_item(note_id, key, TYPE_NOTE, "2020-01-01 00:00:00").await;
        sqlx::query("INSERT INTO itemNotes VALUES (?, ?, ?)")
            .bind(note_id)
            .bind(parent_id)
            .bind(html)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn update_note(&self, note_id: i64, html: &str) {
        sqlx::query("UPDATE itemNotes SET note = ? WHERE itemID = ?")
            .bind(html)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Add an attachment item under `parent_id`. `path` is the raw source
    /// path (e.g. `storage:file.pdf`); title/url go in via `set_field`.
    pub async fn add_attachment(
        &self,
        att_id: i64,
        key: &str,
        parent_id: i64,
        path: Option<&str>,
        modified: &str,
    ) {
        self.add_item(att_id, key, TYPE_ATTACHMENT, modified).await;
        sqlx::query("INSERT INTO itemAttachments VALUES (?, ?, ?)")
            .bind(att_id)
            .bind(parent_id)
            .bind(path)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

/// A typical article: title, date, abstract, one author, one tag.
pub async fn add_article(source: &Source, id: i64, key: &str, title: &str, modified: &str) {
    source.add_item(id, key, TYPE_JOURNAL_ARTICLE, modified).await;
    source.set_field(id, "title", title).await;
    source.set_field(id, "date", "2019-03-15 March 15, 2019").await;
    source
        .add_creator(id, Some("Ada"), Some("Lovelace"), ROLE_AUTHOR, 0)
        .await;
    source.add_tag(id, "computing").await;
}
