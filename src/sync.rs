//! Sync engine: diff the source database against the index and reconcile.
//!
//! The index file's own modification time is the staleness clock. A sync
//! pass only loads entries whose timestamps moved, falls back to a full
//! re-index when the source changed in a way no timestamp captures, and
//! prunes ids that disappeared from the source.

use anyhow::Result;
use chrono::DateTime;
use tracing::debug;

use crate::app;
use crate::config::Config;
use crate::index::Index;
use crate::zotero::Zotero;

/// What one `refresh` call did.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// The partial pass found nothing and a full pass was run instead.
    pub escalated: bool,
    /// The staleness check short-circuited; nothing was read or written.
    pub skipped: bool,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.deleted > 0
    }
}

/// Bring the index up to date with the source. Returns `true` if any
/// record was inserted, updated or deleted.
pub async fn refresh(index: &Index, zotero: &Zotero, force: bool) -> Result<bool> {
    Ok(refresh_report(index, zotero, force).await?.changed())
}

/// [`refresh`] with per-operation counts.
pub async fn refresh_report(index: &Index, zotero: &Zotero, force: bool) -> Result<SyncReport> {
    // Cheap short-circuit: nothing to diff when the source file hasn't
    // changed since the index was last written.
    if !force && !index.is_empty().await? && zotero.last_updated() <= index.last_updated() {
        debug!("index up to date");
        return Ok(SyncReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = sync_pass(index, zotero, force).await?;

    if !force && !report.changed() {
        // The source file changed but no timestamp the candidate query
        // inspects did (a note body edit, say). A partial no-op here would
        // leave the index stale, so run the full pass.
        report = sync_pass(index, zotero, true).await?;
        report.escalated = true;
    }

    Ok(report)
}

async fn sync_pass(index: &Index, zotero: &Zotero, force: bool) -> Result<SyncReport> {
    let known = index.known_ids().await?;

    let candidates = if force || known.is_empty() {
        debug!("full re-index");
        zotero.all_entries().await?
    } else {
        let since = DateTime::from_timestamp(index.last_updated() as i64, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or_default();
        zotero.modified_since(since).await?
    };

    let mut report = SyncReport::default();
    for record in &candidates {
        index.upsert_record(record).await?;
        if known.contains(&record.id) {
            report.updated += 1;
        } else {
            report.added += 1;
        }
    }

    // Deletions can't be read off a timestamp feed; diff the id sets.
    let live = zotero.ids().await?;
    let gone: Vec<i64> = known.difference(&live).copied().collect();
    index.delete_records(&gone).await?;
    report.deleted = gone.len();

    debug!(
        updated = report.updated,
        new = report.added,
        deleted = report.deleted,
        "sync pass"
    );
    Ok(report)
}

/// CLI entry point for `refdex sync`.
pub async fn run_sync(config: &Config, force: bool) -> Result<()> {
    let zotero = app::open_zotero(config).await?;
    let index = app::open_index(config).await?;

    let report = refresh_report(&index, &zotero, force).await?;

    println!("sync");
    if report.skipped {
        println!("  index up to date");
    } else {
        println!("  new: {}", report.added);
        println!("  updated: {}", report.updated);
        println!("  deleted: {}", report.deleted);
        if report.escalated {
            println!("  (escalated to full re-index)");
        }
    }
    println!("ok");

    index.close().await;
    Ok(())
}
