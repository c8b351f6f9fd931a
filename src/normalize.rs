//! Raw source rows → canonical [`Record`]s.
//!
//! Promotes `title`/`date`/`abstractNote` to typed attributes, parses dates
//! tolerantly, strips note markup, resolves attachment paths against the
//! configured storage roots, and caches the CSL projection on the record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::csl;
use crate::models::{Attachment, Collection, Creator, PartialDate, Record};
use crate::zotero::{RawAttachment, RawEntry, RawField};

/// Metadata fields the source may use before promotion. Everything else in
/// the raw rows ends up in `zdata` untouched, including these.
const FIELD_TITLE: &str = "title";
const FIELD_DATE: &str = "date";
const FIELD_ABSTRACT: &str = "abstractNote";

/// Parse a source date string into a [`PartialDate`].
///
/// Source dates are `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, usually followed by
/// the date again in words. Only the leading numeric components are parsed;
/// trailing text is ignored. Returns `None` when no leading year is present.
pub fn parse_date(s: &str) -> Option<PartialDate> {
    let s = s.trim();
    let year = lead_digits(s, 4)?;
    let mut date = PartialDate {
        year: year as i32,
        month: None,
        day: None,
    };

    let rest = &s[4..];
    let Some(rest) = rest.strip_prefix('-') else {
        return Some(date);
    };
    match lead_digits(rest, 2) {
        Some(m @ 1..=12) => date.month = Some(m),
        _ => return Some(date),
    }

    let rest = &rest[2..];
    let Some(rest) = rest.strip_prefix('-') else {
        return Some(date);
    };
    if let Some(d @ 1..=31) = lead_digits(rest, 2) {
        date.day = Some(d);
    }

    Some(date)
}

/// Derived year for a source date string: the leading four digits, or 0.
pub fn parse_year(s: &str) -> i32 {
    lead_digits(s.trim(), 4).map(|y| y as i32).unwrap_or(0)
}

/// The value of the first `n` bytes of `s` iff they are all ASCII digits.
fn lead_digits(s: &str, n: usize) -> Option<u32> {
    if s.len() < n || !s.as_bytes()[..n].iter().all(u8::is_ascii_digit) {
        return None;
    }
    s[..n].parse().ok()
}

/// Extract the text content of an HTML fragment, discarding all tags.
///
/// Notes are stored by the source as HTML; the index only wants the words.
/// Basic character entities are decoded, everything between `<` and `>` is
/// dropped.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(i) = rest.find(['<', '&']) {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        if rest.starts_with('<') {
            match rest.find('>') {
                Some(end) => rest = &rest[end + 1..],
                None => return out, // unterminated tag, drop the remainder
            }
        } else {
            let (decoded, consumed) = decode_entity(rest);
            out.push_str(&decoded);
            rest = &rest[consumed..];
        }
    }
    out.push_str(rest);
    out
}

/// Decode one entity at the start of `s` (which begins with `&`). Returns
/// the replacement text and the number of bytes consumed. Unknown entities
/// pass through verbatim.
fn decode_entity(s: &str) -> (String, usize) {
    let end = match s.find(';') {
        Some(end) if end <= 9 => end,
        _ => return ("&".to_string(), 1),
    };
    let name = &s[1..end];
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => name
            .strip_prefix("#x")
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .or_else(|| name.strip_prefix('#').and_then(|d| d.parse().ok()))
            .and_then(char::from_u32),
    };
    match decoded {
        Some(c) => (c.to_string(), end + 1),
        None => ("&".to_string(), 1),
    }
}

/// One prefix-rewriting rule for attachment paths.
struct PathRule {
    prefix: &'static str,
    /// Base directory the remainder is resolved against. `None` when the
    /// root is unconfigured or missing on disk.
    base: Option<PathBuf>,
    /// Whether the attachment key is a path component under the base.
    keyed: bool,
}

/// Resolves source attachment paths against the managed storage root and
/// the user-configured external attachments root.
///
/// Rules are tried in order; first matching prefix wins. A matching rule
/// whose base directory is unavailable drops the attachment rather than
/// failing the record.
pub struct AttachmentResolver {
    rules: Vec<PathRule>,
}

impl AttachmentResolver {
    pub fn new(storage_dir: Option<PathBuf>, attachments_dir: Option<PathBuf>) -> Self {
        Self {
            rules: vec![
                PathRule {
                    prefix: "storage:",
                    base: storage_dir,
                    keyed: true,
                },
                PathRule {
                    prefix: "attachments:",
                    base: attachments_dir,
                    keyed: false,
                },
            ],
        }
    }

    /// Resolve `raw` for the attachment `key`. `None` means the attachment
    /// should be dropped.
    fn resolve(&self, key: &str, raw: &str) -> Option<PathBuf> {
        // Absolute paths that exist need no rewriting.
        if Path::new(raw).exists() {
            return Some(PathBuf::from(raw));
        }

        for rule in &self.rules {
            let Some(rest) = raw.strip_prefix(rule.prefix) else {
                continue;
            };
            return match &rule.base {
                Some(base) if rule.keyed => Some(base.join(key).join(rest)),
                Some(base) => Some(base.join(rest)),
                None => {
                    warn!(key, path = raw, "can't resolve attachment, base directory unavailable");
                    None
                }
            };
        }

        // No prefix matched: keep the path as stored, dangling or not.
        Some(PathBuf::from(raw))
    }
}

/// Build an [`Attachment`], enforcing the one-of-path/url invariant.
///
/// A file path wins over a URL when the source has both; an attachment with
/// neither is dropped.
fn build_attachment(resolver: &AttachmentResolver, raw: RawAttachment) -> Option<Attachment> {
    let path = match &raw.path {
        Some(p) => Some(resolver.resolve(&raw.key, p)?),
        None => None,
    };

    match (path, raw.url) {
        (Some(p), _) => Some(Attachment {
            key: raw.key,
            name: raw.title,
            path: Some(p.to_string_lossy().into_owned()),
            url: None,
        }),
        (None, Some(u)) => Some(Attachment {
            key: raw.key,
            name: raw.title,
            path: None,
            url: Some(u),
        }),
        (None, None) => {
            debug!(key = %raw.key, "attachment has neither path nor url, dropping");
            None
        }
    }
}

/// Assemble a canonical [`Record`] from one raw entry and its related rows.
#[allow(clippy::too_many_arguments)]
pub fn build_record(
    raw: RawEntry,
    creators: Vec<Creator>,
    tags: Vec<String>,
    collections: Vec<Collection>,
    attachments: Vec<RawAttachment>,
    notes: Vec<String>,
    fields: Vec<RawField>,
    resolver: &AttachmentResolver,
) -> Record {
    let mut record = Record {
        id: raw.id,
        key: raw.key,
        library: raw.library,
        kind: raw.kind,
        title: String::new(),
        date: None,
        year: 0,
        abstract_: String::new(),
        modified: raw.modified,
        zdata: BTreeMap::new(),
        creators,
        collections,
        attachments: attachments
            .into_iter()
            .filter_map(|a| build_attachment(resolver, a))
            .collect(),
        notes: notes.iter().map(|n| strip_markup(n)).collect(),
        tags,
        csl: serde_json::Value::Object(Default::default()),
    };

    for RawField { name, value } in fields {
        match name.as_str() {
            FIELD_TITLE => record.title = value.clone(),
            FIELD_DATE => {
                record.date = parse_date(&value);
                record.year = parse_year(&value);
            }
            FIELD_ABSTRACT => record.abstract_ = value.clone(),
            _ => {}
        }
        record.zdata.insert(name, value);
    }

    record.csl = csl::entry_data(&record);
    record
}
