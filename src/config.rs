use crate::error::BuildError;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILENAME: &str = ".tagnav.json";

/// Process-wide settings, read once from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub ctags_cmd: String,
    pub ctags_args: Vec<String>,
    pub gtags_cmd: String,
    pub gtags_args: Vec<String>,
    pub global_cmd: String,
    pub global_args: Vec<String>,
    pub config_filename: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ctags_cmd: "ctags".to_string(),
            ctags_args: Vec::new(),
            gtags_cmd: "gtags".to_string(),
            gtags_args: Vec::new(),
            global_cmd: "global".to_string(),
            global_args: Vec::new(),
            config_filename: DEFAULT_CONFIG_FILENAME.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        Self {
            ctags_cmd: var("TAGNAV_CTAGS_CMD", defaults.ctags_cmd),
            ctags_args: args_var("TAGNAV_CTAGS_ARGS"),
            gtags_cmd: var("TAGNAV_GTAGS_CMD", defaults.gtags_cmd),
            gtags_args: args_var("TAGNAV_GTAGS_ARGS"),
            global_cmd: var("TAGNAV_GLOBAL_CMD", defaults.global_cmd),
            global_args: args_var("TAGNAV_GLOBAL_ARGS"),
            config_filename: var("TAGNAV_CONFIG_FILENAME", defaults.config_filename),
        }
    }

    /// Make sure the configured ctags binary can actually be run
    pub fn check_ctags(&self) -> Result<PathBuf, BuildError> {
        find_executable(&self.ctags_cmd).ok_or_else(|| BuildError::CtagsNotFound(self.ctags_cmd.clone()))
    }
}

/// Extra arguments placed before the ones the server adds, split on whitespace
fn args_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|args| args.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Resolve a command the way a shell would: explicit paths must exist, bare
/// names are looked up on `PATH`.
pub fn find_executable(cmd: &str) -> Option<PathBuf> {
    let path = Path::new(cmd);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(cmd))
            .find(|candidate| candidate.is_file())
    })
}
