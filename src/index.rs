//! The search index: a versioned SQLite database holding one weighted
//! multi-field FTS document, one canonical JSON serialization, and one
//! modification timestamp per record.
//!
//! Assembling a record from the source takes seven queries, so the full
//! serialized form is stored here too and queries never touch the source.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::db;
use crate::models::Record;
use crate::util::file_mtime;
use crate::zotero::SQLITE_DATE_FMT;

/// Version of the schema/data format. Incremented whenever the schema or
/// the record JSON changes; a mismatch invalidates the whole index.
pub const DB_VERSION: i64 = 8;

/// Hard cap on search results.
pub const MAX_RESULTS: usize = 100;

/// Below this many exact hits, a second prefix-wildcard pass runs.
const WILDCARD_THRESHOLD: usize = 30;

// The `porter` tokenizer lets singular query terms reach plural field text
// in the exact pass; the wildcard pass stays purely additive.
const INDEX_SCHEMA: &str = "
CREATE VIRTUAL TABLE search USING fts5(
    title, year, creators, authors, editors,
    tags, collections, attachments, notes, abstract, catchall,
    tokenize = 'porter unicode61'
);

CREATE TABLE modified (
    id INTEGER PRIMARY KEY NOT NULL,
    modified TEXT NOT NULL
);

CREATE TABLE data (
    id INTEGER PRIMARY KEY NOT NULL,
    json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE dbinfo (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

const RESET_SQL: &str = "
DROP TABLE IF EXISTS data;
DROP TABLE IF EXISTS dbinfo;
DROP TABLE IF EXISTS modified;
DROP TABLE IF EXISTS search;
VACUUM;
";

/// Per-field ranking weights for the FTS document.
///
/// The catch-all field is kept far below the named fields so that a match
/// which "really" belongs to title or creators is never dominated by it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub year: f64,
    pub creators: f64,
    pub authors: f64,
    pub editors: f64,
    pub tags: f64,
    pub collections: f64,
    pub attachments: f64,
    pub notes: f64,
    #[serde(rename = "abstract")]
    pub abstract_: f64,
    pub catchall: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 1.0,
            year: 1.0,
            creators: 1.0,
            authors: 1.0,
            editors: 1.0,
            tags: 1.0,
            collections: 0.5,
            attachments: 0.4,
            notes: 0.3,
            abstract_: 0.3,
            catchall: 0.1,
        }
    }
}

impl FieldWeights {
    /// (column name, weight) pairs in schema order.
    pub fn entries(&self) -> [(&'static str, f64); 11] {
        [
            ("title", self.title),
            ("year", self.year),
            ("creators", self.creators),
            ("authors", self.authors),
            ("editors", self.editors),
            ("tags", self.tags),
            ("collections", self.collections),
            ("attachments", self.attachments),
            ("notes", self.notes),
            ("abstract", self.abstract_),
            ("catchall", self.catchall),
        ]
    }
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: i64,
    pub score: f64,
    pub record: Record,
}

/// Search index database.
pub struct Index {
    path: PathBuf,
    pool: SqlitePool,
    weights: FieldWeights,
}

impl Index {
    /// Open (and if necessary create or reset) the index at `path`.
    ///
    /// An existing file whose version marker does not match [`DB_VERSION`]
    /// has its entire content destroyed and recreated empty. Nothing is
    /// migrated.
    pub async fn open(path: &Path, weights: FieldWeights) -> Result<Self> {
        let pool = db::connect(path).await?;

        if !db_valid(&pool).await? {
            debug!(path = %path.display(), "initialising index");
            sqlx::raw_sql(INDEX_SCHEMA).execute(&pool).await?;
            sqlx::query("INSERT INTO dbinfo VALUES ('version', ?)")
                .bind(DB_VERSION.to_string())
                .execute(&pool)
                .await?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            pool,
            weights,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// `true` if the index holds no documents.
    pub async fn is_empty(&self) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search")
            .fetch_one(&self.pool)
            .await?;
        Ok(n == 0)
    }

    /// Modification time of the index file, used as the staleness clock.
    /// 0.0 if the file does not exist yet.
    pub fn last_updated(&self) -> f64 {
        file_mtime(&self.path)
    }

    /// Stored [`Record`] for `id`, or `None`.
    pub async fn record(&self, id: i64) -> Result<Option<Record>> {
        let json: Option<String> = sqlx::query_scalar("SELECT json FROM data WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match json {
            Some(js) => Ok(Some(Record::from_json(&js)?)),
            None => Ok(None),
        }
    }

    /// Every id currently tracked by the index.
    pub async fn known_ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query("SELECT id FROM data").fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Write or overwrite one record: the FTS document, the canonical JSON
    /// and the modification timestamp, in a single transaction.
    pub async fn upsert_record(&self, record: &Record) -> Result<()> {
        let fields = document_fields(record);
        let json = record.to_json()?;
        let modified = record.modified.format(SQLITE_DATE_FMT).to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM search WHERE rowid = ?")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        let mut insert = sqlx::query(
            "INSERT INTO search (rowid, title, year, creators, authors, editors, \
             tags, collections, attachments, notes, abstract, catchall) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id);
        for field in &fields {
            insert = insert.bind(field.as_str());
        }
        insert.execute(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO data (id, json) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET json = excluded.json",
        )
        .bind(record.id)
        .bind(&json)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO modified (id, modified) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET modified = excluded.modified",
        )
        .bind(record.id)
        .bind(&modified)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove `ids` from all three tables in a single transaction.
    pub async fn delete_records(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM search WHERE rowid = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM data WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM modified WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Ranked full-text search.
    ///
    /// Runs the literal query first. If that returns few hits and the term
    /// carries no wildcard already, a second pass with a trailing `*` fills
    /// the list; second-pass hits are appended after the exact hits and
    /// never displace or duplicate them.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut ranked = self.match_pass(query).await?;

        if ranked.len() < WILDCARD_THRESHOLD && !query.ends_with('*') {
            let seen: HashSet<i64> = ranked.iter().map(|(id, _)| *id).collect();
            for hit in self.match_pass(&format!("{query}*")).await? {
                if !seen.contains(&hit.0) {
                    ranked.push(hit);
                }
            }
            ranked.truncate(MAX_RESULTS);
        }

        let mut hits = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            if let Some(record) = self.record(id).await? {
                hits.push(SearchHit { id, score, record });
            }
        }

        info!(results = hits.len(), query, "search");
        Ok(hits)
    }

    /// One ranked MATCH pass: collect the engine's per-field match
    /// statistics column by column, combine them with the weight table, and
    /// return (id, score) ordered best-first.
    async fn match_pass(&self, query: &str) -> Result<Vec<(i64, f64)>> {
        let entries = self.weights.entries();
        let mut stats: HashMap<i64, [f64; 11]> = HashMap::new();

        for (i, (column, weight)) in entries.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            // bm25() folds term frequency, inverse document frequency and
            // field-length normalization into one statistic per row; smaller
            // is better, so negate.
            let rows = sqlx::query(
                "SELECT rowid AS id, bm25(search) AS rank FROM search \
                 WHERE search MATCH ? ORDER BY rank LIMIT ?",
            )
            .bind(format!("{{{column}}}:({query})"))
            .bind(MAX_RESULTS as i64)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let id: i64 = row.get("id");
                let rank: f64 = row.get("rank");
                stats.entry(id).or_default()[i] = -rank;
            }
        }

        let mut ranked: Vec<(i64, f64)> = stats
            .into_iter()
            .map(|(id, s)| (id, score(&s, &entries)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(MAX_RESULTS);
        Ok(ranked)
    }
}

/// Combine per-field match statistics with the weight table.
fn score(stats: &[f64; 11], weights: &[(&'static str, f64); 11]) -> f64 {
    stats
        .iter()
        .zip(weights.iter())
        .map(|(s, (_, w))| s * w)
        .sum()
}

async fn db_valid(pool: &SqlitePool) -> Result<bool> {
    let version: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT value FROM dbinfo WHERE key = 'version'")
            .fetch_optional(pool)
            .await;

    match version {
        Ok(Some(v)) if v.parse::<i64>() == Ok(DB_VERSION) => Ok(true),
        Ok(_) => {
            // Stale format. Clear everything and start over.
            debug!("clearing stale index database");
            sqlx::raw_sql(RESET_SQL).execute(pool).await?;
            Ok(false)
        }
        // No dbinfo table at all: a fresh file.
        Err(_) => Ok(false),
    }
}

// Metadata fields excluded from the catch-all: the title is already there,
// page/volume counts are noise, and date variants go through the parsed
// date instead.
const CATCHALL_SKIP: [&str; 3] = ["title", "numPages", "numberOfVolumes"];

/// Build the 11 FTS field texts for a record, schema order.
fn document_fields(record: &Record) -> [String; 11] {
    let creators = join(record.creators.iter().filter_map(|c| c.family.as_deref()));
    let authors = join(record.authors().filter_map(|c| c.family.as_deref()));
    let editors = join(record.editors().filter_map(|c| c.family.as_deref()));
    let tags = record.tags.join(" ");
    let collections = join(record.collections.iter().map(|c| c.name.as_str()));
    let attachments = join(record.attachments.iter().filter_map(|a| a.name.as_deref()));
    let notes = record.notes.join(" ");

    // De-duplicated surnames for the catch-all.
    let names: BTreeSet<&str> = record
        .creators
        .iter()
        .filter_map(|c| c.family.as_deref())
        .collect();

    let mut catchall: Vec<String> = vec![
        record.title.clone(),
        names.into_iter().collect::<Vec<_>>().join(" "),
        tags.clone(),
        collections.clone(),
        attachments.clone(),
        notes.clone(),
        record.abstract_.clone(),
        record.year.to_string(),
    ];
    if let Some(date) = &record.date {
        catchall.push(date.to_string());
    }

    for (name, value) in &record.zdata {
        if value.is_empty()
            || CATCHALL_SKIP.contains(&name.as_str())
            || name.to_lowercase().contains("date")
        {
            continue;
        }
        if name == "url" {
            if let Some(host) = hostname(value) {
                catchall.push(host);
            }
        } else {
            catchall.push(value.clone());
        }
    }
    catchall.retain(|v| !v.is_empty());

    [
        record.title.clone(),
        record.year.to_string(),
        creators,
        authors,
        editors,
        tags,
        collections,
        attachments,
        notes,
        record.abstract_.clone(),
        catchall.join(" "),
    ]
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

/// Hostname of a URL with any leading `www.` stripped, for the catch-all.
fn hostname(value: &str) -> Option<String> {
    let host = url::Url::parse(value).ok()?.host_str()?.to_string();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Collection, Creator};
    use std::collections::BTreeMap;

    fn record(id: i64, title: &str, abstract_: &str) -> Record {
        Record {
            id,
            key: format!("KEY{id:04}"),
            library: 1,
            kind: "journalArticle".into(),
            title: title.into(),
            date: None,
            year: 0,
            abstract_: abstract_.into(),
            modified: chrono::NaiveDate::from_ymd_opt(2021, 6, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            zdata: BTreeMap::new(),
            creators: Vec::new(),
            collections: Vec::new(),
            attachments: Vec::new(),
            notes: Vec::new(),
            tags: Vec::new(),
            csl: serde_json::json!({}),
        }
    }

    async fn open_index(dir: &tempfile::TempDir) -> Index {
        Index::open(&dir.path().join("search.sqlite"), FieldWeights::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        let mut r = record(7, "Graph Minors", "structure theory");
        r.year = 1995;
        r.date = Some("1995-04".parse().unwrap());
        r.tags = vec!["graphs".into()];
        r.creators.push(Creator {
            family: Some("Robertson".into()),
            given: Some("Neil".into()),
            kind: "author".into(),
            index: 0,
        });
        r.zdata.insert("volume".into(), "20".into());

        index.upsert_record(&r).await.unwrap();
        let back = index.record(7).await.unwrap().unwrap();
        assert_eq!(back, r);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;
        assert!(index.record(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_until_first_upsert() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;
        assert!(index.is_empty().await.unwrap());

        index.upsert_record(&record(1, "A", "")).await.unwrap();
        assert!(!index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_all_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index.upsert_record(&record(1, "A", "")).await.unwrap();
        index.upsert_record(&record(2, "B", "")).await.unwrap();
        index.delete_records(&[1]).await.unwrap();

        assert_eq!(index.known_ids().await.unwrap(), HashSet::from([2]));
        assert!(index.record(1).await.unwrap().is_none());
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search")
            .fetch_one(&index.pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn stale_version_resets_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("search.sqlite");

        let index = Index::open(&path, FieldWeights::default()).await.unwrap();
        index.upsert_record(&record(1, "Old", "")).await.unwrap();
        sqlx::query("UPDATE dbinfo SET value = '1' WHERE key = 'version'")
            .execute(&index.pool)
            .await
            .unwrap();
        index.close().await;

        let index = Index::open(&path, FieldWeights::default()).await.unwrap();
        assert!(index.is_empty().await.unwrap());
        assert!(index.record(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn title_hit_outranks_abstract_hit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index
            .upsert_record(&record(1, "Neural Networks", "learning machines"))
            .await
            .unwrap();
        index
            .upsert_record(&record(2, "Learning Machines", "a survey of the network literature"))
            .await
            .unwrap();

        let hits = index.search("network").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1, "title match should rank first");
        assert_eq!(hits[1].id, 2);
    }

    #[tokio::test]
    async fn wildcard_pass_never_duplicates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index
            .upsert_record(&record(1, "Networks", ""))
            .await
            .unwrap();
        index
            .upsert_record(&record(2, "Networking for Dummies", ""))
            .await
            .unwrap();

        // Both passes match record 1 ("network" stems onto "Networks");
        // the merged list must list each id once.
        let hits = index.search("network").await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        assert!(unique.contains(&1));
        assert!(unique.contains(&2));
    }

    #[tokio::test]
    async fn search_matches_collection_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        let mut r = record(3, "Untitled Draft", "");
        r.collections.push(Collection {
            name: "Quantum Computing".into(),
            key: "COLL1".into(),
        });
        index.upsert_record(&r).await.unwrap();

        let hits = index.search("quantum").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn catchall_gets_hostname_not_url() {
        let mut r = record(4, "Page", "");
        r.zdata.insert(
            "url".into(),
            "https://www.example.org/articles/42".into(),
        );
        let fields = document_fields(&r);
        let catchall = &fields[10];
        assert!(catchall.contains("example.org"));
        assert!(!catchall.contains("www."));
        assert!(!catchall.contains("/articles/"));
    }

    #[test]
    fn catchall_skips_date_fields() {
        let mut r = record(5, "Page", "");
        r.zdata.insert("accessDate".into(), "2020-01-02".into());
        r.zdata.insert("numPages".into(), "300".into());
        let fields = document_fields(&r);
        assert!(!fields[10].contains("2020-01-02"));
        assert!(!fields[10].contains("300"));
    }

    #[test]
    fn score_is_weighted_sum() {
        let weights = FieldWeights::default().entries();
        let mut stats = [0.0; 11];
        stats[0] = 2.0; // title
        stats[9] = 1.0; // abstract
        assert!((score(&stats, &weights) - (2.0 + 0.3)).abs() < 1e-9);
    }
}
