//! Read-only adapter for the Zotero database.
//!
//! A fairly thin wrapper around the SQLite file the Zotero application
//! maintains. It abstracts the seven-table join needed to assemble one
//! entry and exposes the change feeds the sync engine diffs against:
//! everything, everything modified since a timestamp (including entries
//! whose attachments changed), and the set of live ids.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db;
use crate::models::{Collection, Creator, Record};
use crate::normalize::{self, AttachmentResolver};
use crate::util::file_mtime;

/// Timestamp format used in the source database (UTC).
pub const SQLITE_DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";

// Notes and attachments are item types of their own (1, 14); they are
// reached through their parent items, not indexed separately. Tombstoned
// items are excluded.
const ITEMS_SQL: &str = "
SELECT  items.itemID AS id,
        items.dateModified AS modified,
        items.key AS key,
        items.libraryID AS library,
        itemTypes.typeName AS type
    FROM items
    LEFT JOIN itemTypes
        ON items.itemTypeID = itemTypes.itemTypeID
    LEFT JOIN deletedItems
        ON items.itemID = deletedItems.itemID
WHERE items.itemTypeID NOT IN (1, 14)
AND deletedItems.dateDeleted IS NULL
";

const CREATORS_SQL: &str = "
SELECT  creators.firstName AS given,
        creators.lastName AS family,
        itemCreators.orderIndex AS idx,
        creatorTypes.creatorType AS type
    FROM creators
    LEFT JOIN itemCreators
        ON creators.creatorID = itemCreators.creatorID
    LEFT JOIN creatorTypes
        ON itemCreators.creatorTypeID = creatorTypes.creatorTypeID
WHERE itemCreators.itemID = ?
ORDER BY idx ASC
";

const COLLECTIONS_SQL: &str = "
SELECT  collections.collectionName AS name,
        collections.key AS key
    FROM collections
    LEFT JOIN collectionItems
        ON collections.collectionID = collectionItems.collectionID
WHERE collectionItems.itemID = ?
";

const ATTACHMENTS_SQL: &str = "
SELECT
    items.key AS key,
    itemAttachments.path AS path,
    (SELECT  itemDataValues.value
        FROM itemData
        LEFT JOIN fields
            ON itemData.fieldID = fields.fieldID
        LEFT JOIN itemDataValues
            ON itemData.valueID = itemDataValues.valueID
    WHERE itemData.itemID = items.itemID AND fields.fieldName = 'title')
    title,
    (SELECT  itemDataValues.value
        FROM itemData
        LEFT JOIN fields
            ON itemData.fieldID = fields.fieldID
        LEFT JOIN itemDataValues
            ON itemData.valueID = itemDataValues.valueID
    WHERE itemData.itemID = items.itemID AND fields.fieldName = 'url')
    url
FROM itemAttachments
    LEFT JOIN items
        ON itemAttachments.itemID = items.itemID
WHERE itemAttachments.parentItemID = ?
";

// Attachment edits do not always touch the parent item's own modified
// column, so changed attachments are a change feed of their own.
const MODIFIED_ATTACHMENTS_SQL: &str = "
SELECT  (SELECT items.key
            FROM items
            WHERE items.itemID = itemAttachments.parentItemID)
        key
    FROM itemAttachments
    LEFT JOIN items
        ON itemAttachments.itemID = items.itemID
WHERE itemAttachments.parentItemID IS NOT NULL
AND items.dateModified > ?
GROUP BY itemAttachments.parentItemID
";

const METADATA_SQL: &str = "
SELECT  fields.fieldName AS name,
        itemDataValues.value AS value
    FROM itemData
    LEFT JOIN fields
        ON itemData.fieldID = fields.fieldID
    LEFT JOIN itemDataValues
        ON itemData.valueID = itemDataValues.valueID
WHERE itemData.itemID = ?
";

const NOTES_SQL: &str = "
SELECT itemNotes.note AS note
    FROM itemNotes
    LEFT JOIN items
        ON itemNotes.itemID = items.itemID
WHERE itemNotes.parentItemID = ?
";

const TAGS_SQL: &str = "
SELECT tags.name AS name
    FROM tags
    LEFT JOIN itemTags
        ON tags.tagID = itemTags.tagID
WHERE itemTags.itemID = ?
";

/// An item row before its related rows are joined in.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub id: i64,
    pub key: String,
    pub library: i64,
    pub kind: String,
    pub modified: NaiveDateTime,
}

/// An attachment row before path resolution.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub key: String,
    pub path: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// One metadata field row, verbatim.
#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub value: String,
}

/// Read-only handle on a Zotero database.
pub struct Zotero {
    datadir: PathBuf,
    dbpath: PathBuf,
    resolver: AttachmentResolver,
    pool: SqlitePool,
}

impl Zotero {
    /// Open the database under `datadir` (or at `dbpath`, when the working
    /// copy lives elsewhere).
    ///
    /// `attachments_dir` is the linked-attachment base directory from the
    /// Zotero preferences, if one is configured.
    pub async fn open(
        datadir: &Path,
        dbpath: Option<PathBuf>,
        attachments_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let dbpath = dbpath.unwrap_or_else(|| datadir.join("zotero.sqlite"));
        if !dbpath.exists() {
            anyhow::bail!("Zotero database not found: {}", dbpath.display());
        }

        // Missing roots are not fatal here; the resolver skips affected
        // attachments with a warning instead.
        let storage = datadir.join("storage");
        let storage = storage.exists().then_some(storage);
        let attachments_dir = match attachments_dir {
            Some(dir) if dir.exists() => Some(dir),
            Some(dir) => {
                tracing::warn!(dir = %dir.display(), "attachments directory does not exist");
                None
            }
            None => None,
        };

        let pool = db::connect_read_only(&dbpath).await?;
        debug!(path = %dbpath.display(), "opened Zotero database");

        Ok(Self {
            datadir: datadir.to_path_buf(),
            dbpath,
            resolver: AttachmentResolver::new(storage, attachments_dir),
            pool,
        })
    }

    /// Modification time of the database file, in seconds since the epoch.
    pub fn last_updated(&self) -> f64 {
        file_mtime(&self.dbpath)
    }

    /// Directory the application stores CSL stylesheets in.
    pub fn styles_dir(&self) -> Result<PathBuf> {
        let path = self.datadir.join("styles");
        if !path.exists() {
            anyhow::bail!("styles directory does not exist: {}", path.display());
        }
        Ok(path)
    }

    /// Ids of every live (non-deleted) entry.
    pub async fn ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(ITEMS_SQL).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// External keys of every live entry.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(ITEMS_SQL).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    /// Every live entry, fully populated.
    pub async fn all_entries(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query(ITEMS_SQL).fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(self.populate(raw_entry(&row)?).await?);
        }
        Ok(entries)
    }

    /// Entries modified after `since`, plus entries whose attachments were.
    pub async fn modified_since(&self, since: NaiveDateTime) -> Result<Vec<Record>> {
        let ts = since.format(SQLITE_DATE_FMT).to_string();

        let sql = format!("{ITEMS_SQL} AND items.dateModified > ?");
        let rows = sqlx::query(&sql).bind(&ts).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut seen = HashSet::new();
        for row in rows {
            let raw = raw_entry(&row)?;
            seen.insert(raw.id);
            entries.push(self.populate(raw).await?);
        }

        let rows = sqlx::query(MODIFIED_ATTACHMENTS_SQL)
            .bind(&ts)
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let Some(key) = row.get::<Option<String>, _>("key") else {
                continue;
            };
            debug!(key = %key, "attachment(s) modified");
            if let Some(entry) = self.entry(&key).await? {
                if seen.insert(entry.id) {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    /// Entry for an external key, or `None`.
    pub async fn entry(&self, key: &str) -> Result<Option<Record>> {
        let sql = format!("{ITEMS_SQL} AND items.key = ?");
        let row = sqlx::query(&sql).bind(key).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.populate(raw_entry(&row)?).await?)),
            None => Ok(None),
        }
    }

    /// Entry for a database id, or `None`.
    pub async fn entry_by_id(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!("{ITEMS_SQL} AND items.itemID = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.populate(raw_entry(&row)?).await?)),
            None => Ok(None),
        }
    }

    /// Join the related rows for `raw` and normalize them into a [`Record`].
    async fn populate(&self, raw: RawEntry) -> Result<Record> {
        let creators = sqlx::query(CREATORS_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| Creator {
                family: r.get("family"),
                given: r.get("given"),
                kind: r.get::<Option<String>, _>("type").unwrap_or_default(),
                index: r.get("idx"),
            })
            .collect();

        let tags = sqlx::query(TAGS_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.get("name"))
            .collect();

        let collections = sqlx::query(COLLECTIONS_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| Collection {
                name: r.get("name"),
                key: r.get("key"),
            })
            .collect();

        let attachments = sqlx::query(ATTACHMENTS_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| RawAttachment {
                key: r.get("key"),
                path: r.get("path"),
                title: r.get("title"),
                url: r.get("url"),
            })
            .collect();

        let notes = sqlx::query(NOTES_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.get("note"))
            .collect();

        let fields = sqlx::query(METADATA_SQL)
            .bind(raw.id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| RawField {
                name: r.get("name"),
                value: r.get("value"),
            })
            .collect();

        Ok(normalize::build_record(
            raw,
            creators,
            tags,
            collections,
            attachments,
            notes,
            fields,
            &self.resolver,
        ))
    }
}

fn raw_entry(row: &sqlx::sqlite::SqliteRow) -> Result<RawEntry> {
    let modified: String = row.get("modified");
    // Timestamps occasionally carry fractional seconds; drop them.
    let modified = modified.split('.').next().unwrap_or(&modified);
    let modified = NaiveDateTime::parse_from_str(modified, SQLITE_DATE_FMT)
        .with_context(|| format!("bad dateModified: {modified:?}"))?;

    Ok(RawEntry {
        id: row.get("id"),
        key: row.get("key"),
        library: row.get("library"),
        kind: row.get::<Option<String>, _>("type").unwrap_or_default(),
        modified,
    })
}
