//! Construction of the worker objects from configuration.
//!
//! Everything is opened explicitly and up front: commands build the source
//! adapter, index and style catalog here and pass them by reference into
//! the sync and query paths.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::index::Index;
use crate::styles::Styles;
use crate::util::copy_if_newer;
use crate::zotero::Zotero;

/// Open the source database.
///
/// The application owning the source keeps it locked, so reads go through
/// a private copy under the cache directory, refreshed whenever the
/// original is newer.
pub async fn open_zotero(config: &Config) -> Result<Zotero> {
    let datadir = config.zotero.resolved_data_dir()?;
    if !datadir.exists() {
        anyhow::bail!("Zotero directory does not exist: {}", datadir.display());
    }

    let original = config
        .zotero
        .db_path
        .clone()
        .unwrap_or_else(|| datadir.join("zotero.sqlite"));
    if !original.exists() {
        anyhow::bail!("Zotero database not found: {}", original.display());
    }

    let copy = copy_if_newer(&original, &config.cache.dir.join("zotero.sqlite"))
        .with_context(|| "Failed to copy Zotero database")?;

    Zotero::open(&datadir, Some(copy), config.zotero.attachments_dir.clone()).await
}

/// Open (creating or resetting as needed) the search index.
pub async fn open_index(config: &Config) -> Result<Index> {
    Index::open(&config.cache.dir.join("search.sqlite"), config.search.weights).await
}

/// Open the style catalog for the given source.
pub async fn open_styles(config: &Config, zotero: &Zotero) -> Result<Styles> {
    Styles::open(&zotero.styles_dir()?, &config.cache.dir).await
}
