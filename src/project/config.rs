use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project-local settings, stored as JSON next to the project root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Tags file location, relative to the config file's directory
    #[serde(default = "default_tags_file")]
    pub tags_file: String,
    /// Extra directories to index, relative to the config file's directory
    #[serde(default)]
    pub include_dirs: Vec<String>,
    /// Glob patterns selecting the files handed to the indexer
    #[serde(default = "default_file_patterns")]
    pub file_patterns: Vec<String>,
    /// Also build and query a GNU Global cross-reference database
    #[serde(default)]
    pub xref_enabled: bool,
}

fn default_tags_file() -> String {
    "tags".to_string()
}

fn default_file_patterns() -> Vec<String> {
    vec!["*.py".to_string()]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            tags_file: default_tags_file(),
            include_dirs: Vec::new(),
            file_patterns: default_file_patterns(),
            xref_enabled: false,
        }
    }
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the default config into `dir` and return the new file's path
    pub fn write_default(dir: &Path, filename: &str) -> Result<PathBuf, ConfigError> {
        let path = dir.join(filename);
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.clone(),
            source,
        };

        let data = serde_json::to_string_pretty(&Self::default()).map_err(|source| {
            ConfigError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        fs::create_dir_all(dir).map_err(io_err)?;
        fs::write(&path, data + "\n").map_err(io_err)?;

        tracing::info!("Wrote default project config to {}", path.display());
        Ok(path)
    }
}

/// Directory a lookup starts from: files are replaced by their parent
pub fn lookup_dir(path: &Path) -> PathBuf {
    let path = crate::tags::normalize_path(path);
    if path.is_file() {
        path.parent().map(Path::to_path_buf).unwrap_or(path)
    } else {
        path
    }
}

/// Walk from `start` up to the filesystem root looking for `filename`
pub fn find_config_file(start: &Path, filename: &str) -> Option<PathBuf> {
    lookup_dir(start)
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_upward() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let nested = root.join("pkg/sub");
        fs::create_dir_all(&nested).unwrap();
        let source = nested.join("mod.py");
        fs::write(&source, "x = 1\n").unwrap();

        assert!(find_config_file(&source, ".tagnav.json").is_none());

        let written = ProjectConfig::write_default(root, ".tagnav.json").unwrap();
        assert_eq!(find_config_file(&source, ".tagnav.json"), Some(written.clone()));
        assert_eq!(find_config_file(&nested, ".tagnav.json"), Some(written));
    }

    #[test]
    fn test_default_round_trips_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = ProjectConfig::write_default(temp_dir.path(), "cfg.json").unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cfg.json");
        fs::write(&path, r#"{"tags_file": ".cache/tags", "include_dirs": ["../lib"]}"#).unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.tags_file, ".cache/tags");
        assert_eq!(config.include_dirs, vec!["../lib".to_string()]);
        assert_eq!(config.file_patterns, vec!["*.py".to_string()]);
        assert!(!config.xref_enabled);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cfg.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ProjectConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
