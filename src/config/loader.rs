//! Config file discovery and loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::Config;

/// File name looked for in the working directory.
pub const CONFIG_FILENAME: &str = "docreview.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Name `prefer` discovers config files under (`docreview.toml`, etc).
pub const APP_NAME: &str = "docreview";

/// Options for loading the config.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery, must exist).
    pub config_path: Option<PathBuf>,
    /// Only look for `docreview.toml` in this directory instead of the
    /// standard locations.
    pub search_dir: Option<PathBuf>,
}

/// Find the config file to use, in priority order:
/// 1. explicit `--config` path
/// 2. `docreview.toml` in `search_dir`, when one is given
/// 3. whatever `prefer` discovers in the standard locations
pub async fn discover_config_path(options: &LoadOptions) -> Option<PathBuf> {
    if let Some(ref path) = options.config_path {
        return Some(path.clone());
    }

    if let Some(ref dir) = options.search_dir {
        let local = dir.join(CONFIG_FILENAME);
        return local.is_file().then_some(local);
    }

    match prefer::load(APP_NAME).await {
        Ok(found) => found.source_path().map(|p| p.to_path_buf()),
        Err(e) => {
            tracing::debug!("prefer found no config file: {}", e);
            None
        }
    }
}

/// Load and validate a config file. `.json` files are parsed as JSON,
/// everything else as TOML.
pub async fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let mut config: Config = match ext {
        "json" => serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
    };
    config.source_path = Some(path.to_path_buf());
    config.validate()?;
    Ok(config)
}

/// Load the discovered config, or defaults when there is no file.
pub async fn load_config(options: &LoadOptions) -> Result<Config, ConfigError> {
    match discover_config_path(options).await {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_from_path(&path).await
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> LoadOptions {
        LoadOptions {
            config_path: None,
            search_dir: Some(dir.path().to_path_buf()),
        }
    }

    #[tokio::test]
    async fn test_missing_file_means_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&options(&dir)).await.unwrap();
        assert!(config.source_path.is_none());
        assert_eq!(config.analysis.max_concurrency, 4);
    }

    #[tokio::test]
    async fn test_discovers_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[analysis]\nmax_chunk_chars = 500\n").unwrap();

        let config = load_config(&options(&dir)).await.unwrap();
        assert_eq!(config.analysis.max_chunk_chars, 500);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "[analysis]\nmax_chunk_chars = 500\n").unwrap();
        let explicit = dir.path().join("other.toml");
        fs::write(&explicit, "[analysis]\nmax_chunk_chars = 900\n").unwrap();

        let mut opts = options(&dir);
        opts.config_path = Some(explicit);
        let config = load_config(&opts).await.unwrap();
        assert_eq!(config.analysis.max_chunk_chars, 900);
    }

    #[tokio::test]
    async fn test_search_dir_ignores_other_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "[analysis]\nmax_chunk_chars = 500\n").unwrap();
        assert!(discover_config_path(&options(&dir)).await.is_none());
    }

    #[tokio::test]
    async fn test_json_config_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docreview.json");
        fs::write(&path, r#"{"analysis": {"max_chunk_chars": 700}}"#).unwrap();

        let config = load_from_path(&path).await.unwrap();
        assert_eq!(config.analysis.max_chunk_chars, 700);

        fs::write(&path, "{").unwrap();
        assert!(matches!(load_from_path(&path).await, Err(ConfigError::Json { .. })));
    }

    #[tokio::test]
    async fn test_errors() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.config_path = Some(dir.path().join("missing.toml"));
        assert!(matches!(load_config(&opts).await, Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[analysis\n").unwrap();
        opts.config_path = Some(bad);
        assert!(matches!(load_config(&opts).await, Err(ConfigError::Parse { .. })));

        let invalid = dir.path().join("invalid.toml");
        fs::write(&invalid, "[analysis]\nmax_concurrency = 0\n").unwrap();
        opts.config_path = Some(invalid);
        assert!(matches!(load_config(&opts).await, Err(ConfigError::Invalid(_))));
    }
}
