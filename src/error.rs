use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load a tags index. The caller is expected to suggest a rebuild.
#[derive(Debug, Error)]
pub enum IndexFormatError {
    #[error("tags file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read tags file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl IndexFormatError {
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// Project configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project config '{filename}' found above {}", start.display())]
    NotFound { filename: String, start: PathBuf },

    #[error("error parsing config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from running the external indexers
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build process is running already")]
    AlreadyRunning,

    #[error("ctags is not found in '{0}'. Please, install ctags.")]
    CtagsNotFound(String),

    #[error("`{command}` exited with {status}: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] ignore::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
