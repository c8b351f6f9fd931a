//! CSL style catalog.
//!
//! Scans the source's styles directory for `.csl` stylesheets, extracts
//! their title and link metadata, and caches the results keyed by style.
//! Dependent stylesheets name an independent parent by URL; missing
//! parents are fetched once and kept under the cache directory. Parent
//! styles are cached keyed by that URL so chains resolve offline.

use std::path::{Path, PathBuf};

use anyhow::Result;
use quick_xml::events::Event;
use tracing::{debug, error, info, warn};

use crate::cache::{Cache, Store};
use crate::cite::{self, Rendition};
use crate::locales;
use crate::models::{CslStyle, Record};
use crate::util::file_mtime;

/// Dependent-style chains longer than this are treated as unresolvable.
const MAX_PARENT_HOPS: usize = 8;

/// Style catalog backed by the styles directory and a metadata cache.
pub struct Styles {
    dirpath: PathBuf,
    dldir: PathBuf,
    store: Store,
    mtimes: Store,
}

impl Styles {
    /// Open the catalog over `stylesdir`, refreshing the cache from disk.
    pub async fn open(stylesdir: &Path, cachedir: &Path) -> Result<Self> {
        if !stylesdir.exists() {
            anyhow::bail!("styles directory does not exist: {}", stylesdir.display());
        }

        let dldir = cachedir.join("styles");
        std::fs::create_dir_all(&dldir)?;

        let cache = Cache::open(&cachedir.join("styles.sqlite")).await?;
        let store = cache.store("styles").await?;
        let mtimes = cache.store("modtimes").await?;

        let styles = Self {
            dirpath: stylesdir.to_path_buf(),
            dldir,
            store,
            mtimes,
        };
        styles.update().await?;
        Ok(styles)
    }

    /// Style for `key`, or `None`.
    pub async fn get(&self, key: &str) -> Result<Option<CslStyle>> {
        self.store.get(key).await
    }

    /// Resolve dependent styles and return the root (independent) style.
    ///
    /// `None` when the key is unknown or a link in the parent chain is
    /// missing from the cache.
    pub async fn canonical(&self, key: &str) -> Result<Option<CslStyle>> {
        let mut lookup = key.to_string();
        for _ in 0..MAX_PARENT_HOPS {
            let Some(style) = self.store.get::<CslStyle>(&lookup).await? else {
                return Ok(None);
            };
            match &style.parent_url {
                Some(parent) => lookup = parent.clone(),
                None => {
                    if style.key() != key {
                        debug!(key, canonical = %style, "resolved dependent style");
                    }
                    return Ok(Some(style));
                }
            }
        }
        warn!(key, "parent style chain too deep");
        Ok(None)
    }

    /// All styles, sorted by name. Parent styles are hidden unless asked for.
    pub async fn all(&self, include_hidden: bool) -> Result<Vec<CslStyle>> {
        let mut styles = Vec::new();
        for key in self.store.keys().await? {
            if let Some(style) = self.store.get::<CslStyle>(&key).await? {
                if style.hidden && !include_hidden {
                    continue;
                }
                styles.push(style);
            }
        }
        styles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(styles)
    }

    /// Render a citation for `record` with the style under `style_key`.
    ///
    /// The locale, if given, must be in the supported table; there is no
    /// fallback locale.
    pub async fn cite(
        &self,
        record: &Record,
        style_key: &str,
        bibliography: bool,
        locale: Option<&str>,
        command: &str,
    ) -> Result<Rendition> {
        let style = self
            .canonical(style_key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("could not resolve style: {style_key}"))?;

        let locale = match locale {
            Some(code) => Some(
                locales::lookup(code)
                    .ok_or_else(|| anyhow::anyhow!("unsupported locale: {code}"))?,
            ),
            None => None,
        };

        debug!(style = %style, ?locale, "rendering citation");
        cite::generate(
            std::slice::from_ref(&record.csl),
            &style.path,
            bibliography,
            locale,
            command,
        )
    }

    /// Re-read style definitions from disk.
    ///
    /// Unchanged files (by mtime) are skipped. After the scan, missing
    /// parents of dependent styles are fetched, and cache entries whose
    /// files disappeared are purged.
    async fn update(&self) -> Result<()> {
        let mut parent_urls = Vec::new();

        // The application keeps parent stylesheets in a "hidden" subdir.
        let hidden = self.dirpath.join("hidden");
        if hidden.exists() {
            parent_urls.extend(self.read_styles_dir(&hidden, true).await?);
        }
        parent_urls.extend(self.read_styles_dir(&self.dirpath, false).await?);

        for url in parent_urls {
            if self.store.get::<CslStyle>(&url).await?.is_some() {
                continue;
            }
            if let Some(mut style) = self.fetch_style(&url).await {
                style.hidden = true;
                self.mtimes
                    .set(&style.path.to_string_lossy(), &file_mtime(&style.path))
                    .await?;
                self.store.set(&url, &style).await?;
                info!(%style, "loaded parent style");
            }
        }

        for key in self.store.keys().await? {
            let Some(style) = self.store.get::<CslStyle>(&key).await? else {
                continue;
            };
            if !style.path.exists() {
                self.mtimes.delete(&style.path.to_string_lossy()).await?;
                if self.store.delete(&key).await? {
                    debug!(%style, "removed deleted style");
                }
            }
        }

        Ok(())
    }

    /// Load `.csl` files from one directory (non-recursive). Returns the
    /// parent URLs of any dependent styles found.
    async fn read_styles_dir(&self, dirpath: &Path, hidden: bool) -> Result<Vec<String>> {
        let mut parent_urls = Vec::new();

        for entry in std::fs::read_dir(dirpath)? {
            let path = entry?.path();
            let is_csl = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("csl"))
                .unwrap_or(false);
            if !path.is_file() || !is_csl {
                continue;
            }

            let mtime = file_mtime(&path);
            let path_key = path.to_string_lossy().to_string();
            if mtime <= self.mtimes.get::<f64>(&path_key).await?.unwrap_or(0.0) {
                continue;
            }
            self.mtimes.set(&path_key, &mtime).await?;

            debug!(path = %path.display(), "reading style");
            let Some(mut style) = load_style(&path) else {
                warn!(path = %path.display(), "could not read style");
                continue;
            };

            if let Some(url) = &style.parent_url {
                parent_urls.push(url.clone());
            }
            style.hidden = hidden;
            self.store.set(&style.key(), &style).await?;
            info!(%style, "loaded style");
        }

        Ok(parent_urls)
    }

    /// Fetch a parent stylesheet by URL into the download directory and
    /// parse it. `None` on retrieval or parse failure.
    async fn fetch_style(&self, url: &str) -> Option<CslStyle> {
        let path = self.dldir.join(format!("{}.csl", safe_name(url)));

        if !path.exists() {
            debug!(url, path = %path.display(), "downloading style");
            let body = match fetch(url).await {
                Ok(body) => body,
                Err(err) => {
                    error!(url, %err, "error retrieving style");
                    return None;
                }
            };
            if let Err(err) = std::fs::write(&path, body) {
                error!(path = %path.display(), %err, "error writing style");
                return None;
            }
        }

        load_style(&path)
    }
}

async fn fetch(url: &str) -> Result<String> {
    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
    Ok(body)
}

/// Filesystem-safe name for a URL.
fn safe_name(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Extract style metadata from a `.csl` file: the title, the style's own
/// URL (`link rel="self"`) and the parent URL for dependent styles
/// (`link rel="independent-parent"`). `None` if the file has no title or
/// is not well-formed XML.
fn load_style(path: &Path) -> Option<CslStyle> {
    let xml = std::fs::read(path).ok()?;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);

    let mut name: Option<String> = None;
    let mut url: Option<String> = None;
    let mut parent_url: Option<String> = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = e.local_name().as_ref().to_vec();
                if tag.as_slice() == b"link" {
                    read_link(&e, &mut url, &mut parent_url);
                } else if tag.as_slice() == b"title" && name.is_none() {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        name = Some(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    read_link(&e, &mut url, &mut parent_url);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some(CslStyle {
        name: name?,
        path: path.to_path_buf(),
        url,
        parent_url,
        hidden: false,
    })
}

fn read_link(
    e: &quick_xml::events::BytesStart<'_>,
    url: &mut Option<String>,
    parent_url: &mut Option<String>,
) {
    let mut rel: Option<String> = None;
    let mut href: Option<String> = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().unwrap_or_default().into_owned();
        match attr.key.as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        Some("self") => *url = href,
        Some("independent-parent") => *parent_url = href,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0">
  <info>
    <title>American Psychological Association 7th edition</title>
    <link href="http://www.zotero.org/styles/apa" rel="self"/>
    <link href="http://example.org/doc" rel="documentation"/>
  </info>
</style>
"#;

    const DEPENDENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0">
  <info>
    <title>Journal of Examples</title>
    <link href="http://www.zotero.org/styles/journal-of-examples" rel="self"/>
    <link href="http://www.zotero.org/styles/apa" rel="independent-parent"/>
  </info>
</style>
"#;

    #[test]
    fn load_style_extracts_title_and_links() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("apa.csl");
        std::fs::write(&path, APA).unwrap();

        let style = load_style(&path).unwrap();
        assert_eq!(style.name, "American Psychological Association 7th edition");
        assert_eq!(style.key(), "apa");
        assert_eq!(style.url.as_deref(), Some("http://www.zotero.org/styles/apa"));
        assert!(style.parent_url.is_none());
    }

    #[test]
    fn load_style_finds_parent_link() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("journal-of-examples.csl");
        std::fs::write(&path, DEPENDENT).unwrap();

        let style = load_style(&path).unwrap();
        assert_eq!(
            style.parent_url.as_deref(),
            Some("http://www.zotero.org/styles/apa")
        );
    }

    #[test]
    fn load_style_without_title_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.csl");
        std::fs::write(&path, "<style><info></info></style>").unwrap();
        assert!(load_style(&path).is_none());
    }

    #[tokio::test]
    async fn catalog_lists_and_resolves_styles() {
        let tmp = tempfile::TempDir::new().unwrap();
        let stylesdir = tmp.path().join("styles");
        let cachedir = tmp.path().join("cache");
        std::fs::create_dir_all(&stylesdir).unwrap();
        std::fs::write(stylesdir.join("apa.csl"), APA).unwrap();

        let styles = Styles::open(&stylesdir, &cachedir).await.unwrap();
        let listed = styles.all(false).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key(), "apa");

        let canonical = styles.canonical("apa").await.unwrap().unwrap();
        assert_eq!(canonical.key(), "apa");
        assert!(styles.canonical("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_style_is_purged_on_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let stylesdir = tmp.path().join("styles");
        let cachedir = tmp.path().join("cache");
        std::fs::create_dir_all(&stylesdir).unwrap();
        let path = stylesdir.join("apa.csl");
        std::fs::write(&path, APA).unwrap();

        {
            let styles = Styles::open(&stylesdir, &cachedir).await.unwrap();
            assert!(styles.get("apa").await.unwrap().is_some());
        }

        std::fs::remove_file(&path).unwrap();
        let styles = Styles::open(&stylesdir, &cachedir).await.unwrap();
        assert!(styles.get("apa").await.unwrap().is_none());
    }
}
