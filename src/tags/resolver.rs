use super::{normalize_path, TagEntry, TagIndex};
use std::path::Path;

/// Picks one definition for a symbol out of a [`TagIndex`].
///
/// Tie-break order when a symbol has several definitions:
/// 1. definitions in the current file
/// 2. among those, the definition whose recorded scope most specifically
///    encloses the cursor scope
/// 3. the first definition in index order
pub struct SymbolResolver<'a> {
    index: &'a TagIndex,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(index: &'a TagIndex) -> Self {
        Self { index }
    }

    /// `None` means the symbol is not in the index
    pub fn resolve(&self, symbol: &str, current_file: Option<&Path>) -> Option<&'a TagEntry> {
        self.resolve_in_scope(symbol, current_file, None)
    }

    pub fn resolve_in_scope(
        &self,
        symbol: &str,
        current_file: Option<&Path>,
        cursor_scope: Option<&str>,
    ) -> Option<&'a TagEntry> {
        let candidates = self.index.definitions(Some(symbol));
        if candidates.len() <= 1 {
            return candidates.into_iter().next();
        }

        let base_dir = self.index.base_dir();
        let in_file: Vec<&'a TagEntry> = match current_file {
            Some(current) => candidates
                .iter()
                .copied()
                .filter(|entry| same_file(entry, current, base_dir))
                .collect(),
            None => Vec::new(),
        };
        let narrowed = if in_file.is_empty() { candidates } else { in_file };

        if let Some(scope) = cursor_scope.filter(|s| !s.is_empty()) {
            // max_by_key keeps the last maximum, so reverse to favour index order on ties
            let best = narrowed
                .iter()
                .rev()
                .filter_map(|entry| {
                    let recorded = entry.scope.as_ref()?;
                    recorded.encloses(scope).then_some((recorded.name.len(), *entry))
                })
                .max_by_key(|(specificity, _)| *specificity);
            if let Some((_, entry)) = best {
                return Some(entry);
            }
        }

        narrowed.into_iter().next()
    }
}

fn same_file(entry: &TagEntry, current: &Path, base_dir: Option<&Path>) -> bool {
    if Path::new(&entry.file) == current {
        return true;
    }

    let current = match base_dir {
        Some(base) if current.is_relative() => normalize_path(&base.join(current)),
        _ => normalize_path(current),
    };
    entry.path_in(base_dir) == current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::parser::parse_str;
    use crate::tags::{entry, TagAddress, TagScope};
    use std::path::PathBuf;

    fn foo_index() -> TagIndex {
        TagIndex::from_entries(None, vec![entry("foo", "a.py", 10), entry("foo", "b.py", 20)])
    }

    fn scoped(name: &str, file: &str, line: u32, class: &str) -> TagEntry {
        let mut tag = entry(name, file, line);
        tag.scope = TagScope::from_field("class", class);
        tag
    }

    #[test]
    fn test_prefers_current_file() {
        let index = foo_index();
        let resolver = SymbolResolver::new(&index);

        let found = resolver.resolve("foo", Some(Path::new("a.py"))).unwrap();
        assert_eq!((found.file.as_str(), found.line_hint()), ("a.py", Some(10)));

        let found = resolver.resolve("foo", Some(Path::new("b.py"))).unwrap();
        assert_eq!((found.file.as_str(), found.line_hint()), ("b.py", Some(20)));
    }

    #[test]
    fn test_falls_back_to_index_order() {
        let index = foo_index();
        let resolver = SymbolResolver::new(&index);

        let found = resolver.resolve("foo", Some(Path::new("c.py"))).unwrap();
        assert_eq!(found.file, "a.py");
        assert_eq!(found.address, TagAddress::Line(10));

        let found = resolver.resolve("foo", None).unwrap();
        assert_eq!(found.file, "a.py");
    }

    #[test]
    fn test_unknown_symbol_is_none() {
        let index = foo_index();
        assert!(SymbolResolver::new(&index).resolve("bar", None).is_none());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let index = foo_index();
        let resolver = SymbolResolver::new(&index);
        let first = resolver.resolve("foo", Some(Path::new("c.py")));
        let second = resolver.resolve("foo", Some(Path::new("c.py")));
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_absolute_current_file_against_relative_entry() {
        let index = TagIndex::from_entries(
            Some(PathBuf::from("/proj")),
            vec![entry("foo", "pkg/a.py", 10), entry("foo", "pkg/b.py", 20)],
        );
        let found = SymbolResolver::new(&index)
            .resolve("foo", Some(Path::new("/proj/pkg/b.py")))
            .unwrap();
        assert_eq!(found.file, "pkg/b.py");
    }

    #[test]
    fn test_scope_breaks_ties_within_file() {
        let index = TagIndex::from_entries(
            None,
            vec![
                scoped("run", "m.py", 5, "Base"),
                scoped("run", "m.py", 15, "Worker"),
                scoped("run", "m.py", 25, "Worker.Inner"),
                entry("run", "other.py", 1),
            ],
        );
        let resolver = SymbolResolver::new(&index);
        let file = Some(Path::new("m.py"));

        let found = resolver.resolve_in_scope("run", file, Some("Worker.start")).unwrap();
        assert_eq!(found.line_hint(), Some(15));

        let found = resolver.resolve_in_scope("run", file, Some("Worker.Inner.go")).unwrap();
        assert_eq!(found.line_hint(), Some(25));

        // No recorded scope encloses the cursor: first in index order
        let found = resolver.resolve_in_scope("run", file, Some("Unrelated")).unwrap();
        assert_eq!(found.line_hint(), Some(5));
    }

    #[test]
    fn test_scope_ties_keep_index_order() {
        let index = TagIndex::from_entries(
            None,
            vec![scoped("run", "m.py", 5, "A"), scoped("run", "m.py", 9, "A")],
        );
        let found = SymbolResolver::new(&index)
            .resolve_in_scope("run", None, Some("A.f"))
            .unwrap();
        assert_eq!(found.line_hint(), Some(5));
    }

    #[test]
    fn test_every_parsed_symbol_resolves_to_its_record() {
        let contents = "alpha\tx.py\t3;\"\tf\nbeta\ty.py\t/^beta = 1$/;\"\tv\tline:7\ngamma\tz.py\t11\n";
        let index = parse_str(contents, Path::new("tags"), None).unwrap();
        let resolver = SymbolResolver::new(&index);

        for (name, file, line) in [("alpha", "x.py", 3), ("beta", "y.py", 7), ("gamma", "z.py", 11)] {
            let found = resolver.resolve(name, None).unwrap();
            assert_eq!(found.file, file);
            assert_eq!(found.line_hint(), Some(line));
        }
    }
}
