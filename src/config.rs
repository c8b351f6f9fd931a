use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::index::FieldWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub zotero: ZoteroConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cite: CiteConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ZoteroConfig {
    /// Zotero data directory (the one holding `zotero.sqlite`, `storage/`
    /// and `styles/`). Defaults to `~/Zotero`.
    pub data_dir: Option<PathBuf>,
    /// Explicit path to `zotero.sqlite`, if not inside `data_dir`.
    pub db_path: Option<PathBuf>,
    /// Linked-attachment base directory, matching the same preference in
    /// the Zotero application. Unset means linked attachments outside the
    /// managed storage cannot be resolved.
    pub attachments_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory for the search index, the styles cache, and the working
    /// copy of the source database.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SearchConfig {
    /// Per-field ranking weights. Every field defaults to the built-in
    /// table; override individual entries under `[search.weights]`.
    #[serde(default)]
    pub weights: FieldWeights,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CiteConfig {
    /// External citeproc program. Receives CSL-JSON on stdin plus style and
    /// locale arguments, and writes HTML to stdout.
    #[serde(default = "default_cite_command")]
    pub command: String,
}

impl Default for CiteConfig {
    fn default() -> Self {
        Self {
            command: default_cite_command(),
        }
    }
}

fn default_cite_command() -> String {
    "citeproc".to_string()
}

impl ZoteroConfig {
    /// Resolved data directory: the configured one, or `~/Zotero`.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join("Zotero"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.cache.dir.as_os_str().is_empty() {
        anyhow::bail!("cache.dir must not be empty");
    }

    if config.cite.command.trim().is_empty() {
        anyhow::bail!("cite.command must not be empty");
    }

    for (field, w) in config.search.weights.entries() {
        if !(0.0..=100.0).contains(&w) {
            anyhow::bail!("search.weights.{} must be in [0.0, 100.0]", field);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg: Config = toml::from_str("[cache]\ndir = \"/tmp/refdex\"\n").unwrap();
        assert_eq!(cfg.cite.command, "citeproc");
        assert!(cfg.zotero.data_dir.is_none());
        assert_eq!(cfg.search.weights, FieldWeights::default());
    }

    #[test]
    fn weight_override_applies() {
        let cfg: Config = toml::from_str(
            "[cache]\ndir = \"/tmp/refdex\"\n\n[search.weights]\nnotes = 0.9\n",
        )
        .unwrap();
        assert_eq!(cfg.search.weights.notes, 0.9);
        assert_eq!(cfg.search.weights.title, FieldWeights::default().title);
    }
}
