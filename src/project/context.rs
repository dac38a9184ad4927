use super::config::{find_config_file, lookup_dir, ProjectConfig};
use crate::error::{ConfigError, IndexFormatError};
use crate::navigation::NavigationStack;
use crate::tags::{normalize_path, parser, TagIndex};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Identifies one on-disk version of the tags file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

struct CachedIndex {
    index: Arc<TagIndex>,
    stamp: FileStamp,
}

/// Everything that belongs to one open project: its config, the loaded tags
/// index and the jump-back history.
pub struct ProjectContext {
    config_file: PathBuf,
    root: PathBuf,
    config: ProjectConfig,
    cached: Option<CachedIndex>,
    history: NavigationStack,
}

impl ProjectContext {
    pub fn open(config_file: PathBuf) -> Result<Self, ConfigError> {
        let config = ProjectConfig::load(&config_file)?;
        let root = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            config_file,
            root,
            config,
            cached: None,
            history: NavigationStack::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Re-read the config file, dropping the cached index
    pub fn reload_config(&mut self) -> Result<(), ConfigError> {
        self.config = ProjectConfig::load(&self.config_file)?;
        self.invalidate();
        Ok(())
    }

    /// Absolute path of the tags file
    pub fn tags_file(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.config.tags_file))
    }

    /// Directories handed to the indexer, existing include dirs only
    pub fn index_dirs(&self, requested: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![lookup_dir(requested), self.root.clone()];
        for dir in &self.config.include_dirs {
            let path = normalize_path(&self.root.join(dir));
            if path.is_dir() {
                dirs.push(path);
            } else {
                tracing::warn!("Include directory '{}' is not found", path.display());
            }
        }
        dirs.dedup();
        dirs
    }

    /// The tags index, parsed lazily and re-parsed whenever the tags file changes
    pub fn index(&mut self) -> Result<Arc<TagIndex>, IndexFormatError> {
        let tags_file = self.tags_file();
        let stamp = FileStamp::of(&tags_file);

        if let (Some(cached), Some(stamp)) = (&self.cached, stamp) {
            if cached.stamp == stamp {
                return Ok(Arc::clone(&cached.index));
            }
            tracing::debug!("Tags file {} changed, reloading", tags_file.display());
        }

        self.cached = None;
        let index = Arc::new(parser::parse(&tags_file)?);
        if let Some(stamp) = stamp {
            self.cached = Some(CachedIndex {
                index: Arc::clone(&index),
                stamp,
            });
        }
        Ok(index)
    }

    pub fn is_index_loaded(&self) -> bool {
        self.cached.is_some()
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn history(&mut self) -> &mut NavigationStack {
        &mut self.history
    }

    /// Path relative to the project root, for display
    pub fn prettify_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// All open projects, keyed by their config file
pub struct ProjectRegistry {
    config_filename: String,
    projects: HashMap<PathBuf, ProjectContext>,
    config_lookups: HashMap<PathBuf, PathBuf>,
}

impl ProjectRegistry {
    pub fn new(config_filename: impl Into<String>) -> Self {
        Self {
            config_filename: config_filename.into(),
            projects: HashMap::new(),
            config_lookups: HashMap::new(),
        }
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Config file governing `path`, if any
    pub fn find_config(&mut self, path: &Path) -> Option<PathBuf> {
        let dir = lookup_dir(path);
        if let Some(found) = self.config_lookups.get(&dir) {
            if found.is_file() {
                return Some(found.clone());
            }
            self.config_lookups.remove(&dir);
        }

        let found = find_config_file(&dir, &self.config_filename)?;
        self.config_lookups.insert(dir, found.clone());
        Some(found)
    }

    /// Context of the project containing `path`, opening it on first use
    pub fn project_for(&mut self, path: &Path) -> Result<&mut ProjectContext, ConfigError> {
        let config_file = self.find_config(path).ok_or_else(|| ConfigError::NotFound {
            filename: self.config_filename.clone(),
            start: path.to_path_buf(),
        })?;

        match self.projects.entry(config_file) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::info!("Opening project {}", entry.key().display());
                let context = ProjectContext::open(entry.key().clone())?;
                Ok(entry.insert(context))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
