//! Core data models.
//!
//! These types represent the canonical records that flow from the Zotero
//! database through the sync pipeline into the search index, and back out
//! of it at query time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A publication from the Zotero database, fully denormalized.
///
/// Records are rebuilt from the source on every sync pass and stored in the
/// index as JSON; [`Record`]s read back from the index are field-for-field
/// equal to what was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Source-assigned database id. Stable for the life of the item.
    pub id: i64,
    /// Unique external key, e.g. `"ABCD2345"`.
    pub key: String,
    /// Owning library id.
    pub library: i64,
    /// Publication type tag, e.g. `"journalArticle"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Title. Empty if the source has none.
    #[serde(default)]
    pub title: String,
    /// Publication date, as far as it could be parsed.
    #[serde(default)]
    pub date: Option<PartialDate>,
    /// Publication year derived from the raw date string; 0 if unknown.
    #[serde(default)]
    pub year: i32,
    /// Abstract. Empty if the source has none.
    #[serde(rename = "abstract", default)]
    pub abstract_: String,
    /// Last-modified timestamp from the source database (UTC).
    pub modified: NaiveDateTime,
    /// Every metadata field the source supplied, verbatim, whether or not
    /// it was promoted to a typed attribute above.
    #[serde(default)]
    pub zdata: BTreeMap<String, String>,
    /// Creators in display order.
    #[serde(default)]
    pub creators: Vec<Creator>,
    /// Collections the record belongs to.
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// File or link attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Plain-text notes, markup already stripped.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Tag strings.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cached CSL-JSON projection. An empty object if the record's type has
    /// no CSL mapping; such records stay searchable but are not citable.
    #[serde(default)]
    pub csl: serde_json::Value,
}

impl Record {
    /// Creators whose role is `author`.
    pub fn authors(&self) -> impl Iterator<Item = &Creator> {
        self.creators.iter().filter(|c| c.kind == "author")
    }

    /// Creators whose role is `editor`.
    pub fn editors(&self) -> impl Iterator<Item = &Creator> {
        self.creators.iter().filter(|c| c.kind == "editor")
    }

    pub fn from_json(js: &str) -> serde_json::Result<Self> {
        serde_json::from_str(js)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if self.year != 0 {
            write!(f, " ({})", self.year)?;
        }
        let names: Vec<&str> = self
            .creators
            .iter()
            .filter_map(|c| c.family.as_deref())
            .collect();
        if !names.is_empty() {
            write!(f, " by {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Author/editor/performer of a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Family name. Creators without one are excluded from citation output.
    pub family: Option<String>,
    pub given: Option<String>,
    /// Role tag, e.g. `"author"`, `"editor"`, `"translator"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display-order priority among co-creators of the same record.
    pub index: i64,
}

/// Collection a [`Record`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub key: String,
}

/// File attached to a [`Record`].
///
/// Exactly one of `path` and `url` is set; the other is `None` and
/// serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub key: String,
    /// Display name. Absent for untitled attachments.
    pub name: Option<String>,
    /// Resolved filesystem path, for file attachments.
    pub path: Option<String>,
    /// Remote URL, for link attachments.
    pub url: Option<String>,
}

/// A calendar date with optional month and day.
///
/// Serialized as `"YYYY"`, `"YYYY-MM"` or `"YYYY-MM-DD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    /// The `[year, month, day]` prefix actually present, for CSL
    /// `date-parts`.
    pub fn parts(&self) -> Vec<i64> {
        let mut parts = vec![self.year as i64];
        if let Some(m) = self.month {
            parts.push(m as i64);
            if let Some(d) = self.day {
                parts.push(d as i64);
            }
        }
        parts
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "-{:02}", m)?;
            if let Some(d) = self.day {
                write!(f, "-{:02}", d)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PartialDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut it = s.splitn(3, '-');
        let year = it
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| format!("invalid date: {s:?}"))?;
        let month = it.next().map(|p| p.parse::<u32>()).transpose().ok().flatten();
        let day = if month.is_some() {
            it.next().map(|p| p.parse::<u32>()).transpose().ok().flatten()
        } else {
            None
        };
        Ok(PartialDate { year, month, day })
    }
}

impl Serialize for PartialDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartialDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A CSL style definition discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CslStyle {
    /// Human-readable style name from the stylesheet's `<title>`.
    pub name: String,
    /// Path to the `.csl` file.
    pub path: std::path::PathBuf,
    /// The style's own canonical URL, if declared.
    pub url: Option<String>,
    /// URL of the independent parent, for dependent stylesheets.
    pub parent_url: Option<String>,
    /// Parent styles live in a hidden directory and are not listed.
    #[serde(default)]
    pub hidden: bool,
}

impl CslStyle {
    /// Unique key: lowercase file stem of the `.csl` file.
    pub fn key(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Display for CslStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.key(), self.name)
    }
}
