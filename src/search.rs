//! CLI search: refresh the index if stale, then query it.

use anyhow::Result;

use crate::app;
use crate::config::Config;
use crate::sync;

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let zotero = app::open_zotero(config).await?;
    let index = app::open_index(config).await?;
    sync::refresh(&index, &zotero, false).await?;

    let hits = index.search(query).await?;
    if hits.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.record);
        println!(
            "    key: {}  type: {}  id: {}",
            hit.record.key, hit.record.kind, hit.id
        );
    }

    index.close().await;
    Ok(())
}
