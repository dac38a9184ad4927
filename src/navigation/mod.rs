use std::fmt;
use std::path::PathBuf;

/// Cursor position saved before a jump. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationFrame {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl NavigationFrame {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Renders as the `file:line:column` form editors accept for encoded positions
impl fmt::Display for NavigationFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Jump-back history. Grows without bound for the lifetime of the session.
#[derive(Debug, Default)]
pub struct NavigationStack {
    frames: Vec<NavigationFrame>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: NavigationFrame) {
        tracing::debug!("Pushing navigation frame {}", frame);
        self.frames.push(frame);
    }

    /// Remove the most recent frame. An empty stack yields `None`.
    pub fn pop(&mut self) -> Option<NavigationFrame> {
        let frame = self.frames.pop();
        if frame.is_none() {
            tracing::debug!("Jump history is empty");
        }
        frame
    }

    pub fn peek(&self) -> Option<&NavigationFrame> {
        self.frames.last()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &NavigationFrame> {
        self.frames.iter()
    }
}
