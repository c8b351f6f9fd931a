//! # refdex CLI
//!
//! The `refdex` binary keeps a full-text search index in sync with a
//! Zotero library and answers queries and citation requests from it.
//!
//! ## Usage
//!
//! ```bash
//! refdex --config ./refdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `refdex sync` | Bring the search index up to date with the library |
//! | `refdex search "<query>"` | Ranked full-text search over the index |
//! | `refdex get <id>` | Show one indexed record |
//! | `refdex cite <id> --style <key>` | Render a citation for a record |
//! | `refdex styles` | List installed citation styles |
//! | `refdex locales` | List locales supported for rendering |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use refdex::{app, cite, config, get, locales, search, sync};

/// refdex: an incremental full-text search index and citation resolver
/// for a Zotero reference library.
#[derive(Parser)]
#[command(
    name = "refdex",
    about = "Incremental full-text search and citations for a Zotero library",
    version,
    long_about = "refdex mirrors a Zotero library into a local SQLite full-text index, \
    keeps the index fresh with an incremental diff against the library's timestamps, \
    and renders CSL citations for indexed records via an external citeproc program."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./refdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Update the search index from the Zotero database.
    ///
    /// Skips all work when the library hasn't changed since the last sync.
    /// Otherwise loads only records whose timestamps moved, detects
    /// deletions, and falls back to a full re-index when a change is
    /// invisible to the timestamp diff.
    Sync {
        /// Re-index every record, even if nothing looks stale.
        #[arg(long)]
        force: bool,
    },

    /// Search indexed records.
    ///
    /// Runs a ranked full-text query across the weighted document fields
    /// (title, creators, tags, ...). Sparse results are topped up with a
    /// prefix-wildcard pass. The index is refreshed first if stale.
    Search {
        /// The query string. FTS5 syntax is passed through.
        query: String,
    },

    /// Show one indexed record by its database id.
    Get {
        /// Record id (as shown by `search`).
        id: i64,
    },

    /// Render a citation for an indexed record.
    ///
    /// Looks up the record's cached CSL data, resolves the style (following
    /// dependent styles to their independent parent) and runs the external
    /// citeproc program. Prints HTML, text and RTF renditions.
    Cite {
        /// Record id.
        id: i64,

        /// Style key, e.g. `apa` (lowercase stylesheet file stem).
        #[arg(long)]
        style: String,

        /// Generate a bibliography-style citation instead of a note-style one.
        #[arg(long)]
        bibliography: bool,

        /// Locale for the citation, e.g. `en-GB` or `de`. Must be one of
        /// the supported locales (`refdex locales`); there is no fallback.
        #[arg(long)]
        locale: Option<String>,
    },

    /// List citation styles installed in the Zotero styles directory.
    Styles {
        /// Also list hidden (parent) styles.
        #[arg(long)]
        hidden: bool,
    },

    /// List the locales supported for citation rendering.
    Locales,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refdex=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // No config needed to list the locale table.
    if let Commands::Locales = cli.command {
        for (code, name) in locales::all() {
            println!("{code:8} {name}");
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync { force } => {
            sync::run_sync(&cfg, force).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Cite {
            id,
            style,
            bibliography,
            locale,
        } => {
            cite::run_cite(&cfg, id, &style, bibliography, locale.as_deref()).await?;
        }
        Commands::Styles { hidden } => {
            let zotero = app::open_zotero(&cfg).await?;
            let styles = app::open_styles(&cfg, &zotero).await?;
            for style in styles.all(hidden).await? {
                println!("{style}");
            }
        }
        Commands::Locales => unreachable!(),
    }

    Ok(())
}
