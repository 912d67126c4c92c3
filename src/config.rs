use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub files: FilesConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Directory of documents to keep indexed.
    pub documents_dir: PathBuf,
    /// Where the sync state (fingerprints or last commit) is persisted.
    pub state_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Change-tracking method: `mtime` or `git`.
    #[serde(default = "default_method")]
    pub method: String,
    /// File extensions (without dot) that mark a file as a document.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            extensions: default_extensions(),
        }
    }
}

impl TrackingConfig {
    /// Case-insensitive extension check against the configured set.
    pub fn is_eligible(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|eligible| ext.eq_ignore_ascii_case(eligible)),
            None => false,
        }
    }
}

fn default_method() -> String {
    "mtime".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "markdown".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Path of the SQLite database backing the vector index.
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // An unrecognized tracking.method is not rejected here: the sync facade
    // degrades it to mtime with a warning.

    if config.tracking.extensions.is_empty() {
        anyhow::bail!("tracking.extensions must list at least one extension");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_is_case_insensitive() {
        let tracking = TrackingConfig::default();
        assert!(tracking.is_eligible(Path::new("notes/a.md")));
        assert!(tracking.is_eligible(Path::new("notes/a.MD")));
        assert!(tracking.is_eligible(Path::new("b.Markdown")));
        assert!(!tracking.is_eligible(Path::new("notes/a.txt")));
        assert!(!tracking.is_eligible(Path::new("Makefile")));
    }

    #[test]
    fn dotfile_without_extension_is_not_eligible() {
        let tracking = TrackingConfig::default();
        assert!(!tracking.is_eligible(Path::new(".gitignore")));
    }
}
