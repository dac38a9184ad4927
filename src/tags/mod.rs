pub mod address;
pub mod parser;
pub mod resolver;

pub use address::TagAddress;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Keys that ctags uses to record the enclosing scope of a tag
const SCOPE_KINDS: &[&str] = &[
    "class",
    "struct",
    "function",
    "method",
    "member",
    "namespace",
    "module",
    "enum",
    "union",
    "interface",
    "package",
];

/// Enclosing scope recorded for a tag, e.g. `class:Foo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagScope {
    pub kind: String,
    pub name: String,
}

impl TagScope {
    /// Build a scope from an extension field, if the field names one.
    ///
    /// Accepts both `class:Foo` and universal-ctags `scope:class:Foo`.
    pub fn from_field(key: &str, value: &str) -> Option<Self> {
        let (kind, name) = if key == "scope" {
            value.split_once(':')?
        } else if SCOPE_KINDS.contains(&key) {
            (key, value)
        } else {
            return None;
        };

        if name.is_empty() {
            return None;
        }

        Some(Self {
            kind: kind.to_string(),
            name: name.replace("::", "."),
        })
    }

    /// Whether this scope encloses a dotted cursor scope such as `Foo.bar`
    pub fn encloses(&self, cursor_scope: &str) -> bool {
        let cursor = cursor_scope.replace("::", ".");
        cursor == self.name
            || cursor
                .strip_prefix(self.name.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// One definition record from a tags file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    pub file: String,
    pub address: TagAddress,
    pub kind: Option<String>,
    pub scope: Option<TagScope>,
    /// Value of the `line:` extension field
    pub line: Option<u32>,
    /// Set by an empty `file:` field (static / file-local definitions)
    pub file_scoped: bool,
    pub fields: BTreeMap<String, String>,
}

impl TagEntry {
    /// Best line number known without reading the target file
    pub fn line_hint(&self) -> Option<u32> {
        match self.address {
            TagAddress::Line(line) => Some(line),
            TagAddress::Pattern(_) => self.line,
        }
    }

    /// Find the definition line in the current contents of the target file.
    ///
    /// Patterns are searched first; the `line:` hint is used when the file
    /// has shifted so far that the pattern no longer matches.
    pub fn locate(&self, contents: &str) -> Option<u32> {
        self.address.locate(contents).or(self.line)
    }

    /// Absolute path of the target, resolving relative entries against `base_dir`
    pub fn path_in(&self, base_dir: Option<&Path>) -> PathBuf {
        let path = Path::new(&self.file);
        match base_dir {
            Some(base) if path.is_relative() => normalize_path(&base.join(path)),
            _ => normalize_path(path),
        }
    }
}

/// In-memory lookup built from one load of a tags file
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    base_dir: Option<PathBuf>,
    entries: Vec<TagEntry>,
    by_name: HashMap<String, Vec<usize>>,
}

impl TagIndex {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            ..Self::default()
        }
    }

    pub fn from_entries(base_dir: Option<PathBuf>, entries: Vec<TagEntry>) -> Self {
        let mut index = Self::new(base_dir);
        for entry in entries {
            index.push(entry);
        }
        index
    }

    pub fn push(&mut self, entry: TagEntry) {
        let position = self.entries.len();
        self.by_name
            .entry(entry.name.clone())
            .or_default()
            .push(position);
        self.entries.push(entry);
    }

    /// Directory relative entry paths are resolved against
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Entries for `symbol` in file order, or every entry when `symbol` is `None`
    pub fn definitions(&self, symbol: Option<&str>) -> Vec<&TagEntry> {
        match symbol {
            None => self.entries.iter().collect(),
            Some(name) => self
                .by_name
                .get(name)
                .map(|positions| positions.iter().map(|&i| &self.entries[i]).collect())
                .unwrap_or_default(),
        }
    }

    /// Sorted, de-duplicated symbol names starting with `prefix`
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_name
            .keys()
            .map(String::as_str)
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.by_name.len()
    }
}

/// Lexically normalize a path: drop `.` and fold `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
pub(crate) fn entry(name: &str, file: &str, line: u32) -> TagEntry {
    TagEntry {
        name: name.to_string(),
        file: file.to_string(),
        address: TagAddress::Line(line),
        kind: None,
        scope: None,
        line: Some(line),
        file_scoped: false,
        fields: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_field() {
        let scope = TagScope::from_field("class", "Outer::Inner").unwrap();
        assert_eq!(scope.kind, "class");
        assert_eq!(scope.name, "Outer.Inner");

        let scope = TagScope::from_field("scope", "function:run").unwrap();
        assert_eq!(scope.kind, "function");
        assert_eq!(scope.name, "run");

        assert!(TagScope::from_field("signature", "(self)").is_none());
        assert!(TagScope::from_field("class", "").is_none());
    }

    #[test]
    fn test_scope_encloses() {
        let scope = TagScope::from_field("class", "Foo").unwrap();
        assert!(scope.encloses("Foo"));
        assert!(scope.encloses("Foo.bar"));
        assert!(!scope.encloses("Foobar"));
        assert!(!scope.encloses("Bar.Foo"));
    }

    #[test]
    fn test_index_keeps_file_order_per_symbol() {
        let index = TagIndex::from_entries(
            None,
            vec![
                entry("foo", "b.py", 20),
                entry("bar", "a.py", 1),
                entry("foo", "a.py", 10),
            ],
        );

        let foos = index.definitions(Some("foo"));
        assert_eq!(foos.len(), 2);
        assert_eq!(foos[0].file, "b.py");
        assert_eq!(foos[1].file, "a.py");
        assert_eq!(index.definitions(None).len(), 3);
        assert!(index.definitions(Some("baz")).is_empty());
        assert_eq!(index.symbol_count(), 2);
    }

    #[test]
    fn test_complete_is_sorted_and_unique() {
        let index = TagIndex::from_entries(
            None,
            vec![
                entry("get_path", "a.py", 1),
                entry("get_config", "a.py", 2),
                entry("get_path", "b.py", 3),
                entry("goto_file", "a.py", 4),
            ],
        );

        assert_eq!(index.complete("get_"), vec!["get_config", "get_path"]);
        assert!(index.complete("zzz").is_empty());
    }

    #[test]
    fn test_path_in_resolves_relative_entries() {
        let tag = entry("foo", "./src/../pkg/a.py", 1);
        assert_eq!(
            tag.path_in(Some(Path::new("/proj"))),
            PathBuf::from("/proj/pkg/a.py")
        );

        let tag = entry("foo", "/abs/a.py", 1);
        assert_eq!(tag.path_in(Some(Path::new("/proj"))), PathBuf::from("/abs/a.py"));
    }
}
