use super::{TagAddress, TagEntry, TagIndex, TagScope};
use crate::error::IndexFormatError;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

/// Marks comment and pseudo-tag lines (`!_TAG_FILE_FORMAT ...`)
const COMMENT_MARKER: char = '!';
/// Terminates the address when extension fields follow
const ADDRESS_TERMINATOR: &str = ";\"";

/// Load a tags file into a fresh index.
///
/// Relative paths in the file are later resolved against the directory the
/// tags file lives in.
pub fn parse(path: &Path) -> Result<TagIndex, IndexFormatError> {
    let started = Instant::now();

    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => IndexFormatError::Missing(path.to_path_buf()),
        _ => IndexFormatError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let base_dir = path.parent().map(Path::to_path_buf);
    let index = parse_str(&contents, path, base_dir)?;

    tracing::debug!(
        "Loaded {} tags ({} symbols) from {} in {:.2}ms",
        index.len(),
        index.symbol_count(),
        path.display(),
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(index)
}

/// Parse tags file contents. `source` is only used in error messages.
pub fn parse_str(
    contents: &str,
    source: &Path,
    base_dir: Option<std::path::PathBuf>,
) -> Result<TagIndex, IndexFormatError> {
    let mut index = TagIndex::new(base_dir);

    for (i, raw) in contents.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        let entry = parse_line(line)
            .map_err(|reason| IndexFormatError::malformed(source, i + 1, reason))?;
        index.push(entry);
    }

    Ok(index)
}

/// Parse a single record: `name<TAB>file<TAB>address[;"<TAB>field...]`
pub fn parse_line(line: &str) -> Result<TagEntry, String> {
    let mut parts = line.splitn(3, '\t');
    let name = parts.next().unwrap_or_default();
    let file = parts.next().ok_or("missing file field")?;
    let rest = parts.next().ok_or("missing address field")?;

    if name.is_empty() {
        return Err("empty symbol name".to_string());
    }
    if file.is_empty() {
        return Err("empty file field".to_string());
    }

    let (raw_address, raw_fields) = split_address(rest);

    let address = TagAddress::parse(raw_address)
        .ok_or_else(|| format!("unrecognised address '{raw_address}'"))?;

    let mut entry = TagEntry {
        name: name.to_string(),
        file: file.to_string(),
        address,
        kind: None,
        scope: None,
        line: None,
        file_scoped: false,
        fields: BTreeMap::new(),
    };

    if let Some(raw_fields) = raw_fields {
        for field in raw_fields.split('\t').filter(|f| !f.is_empty()) {
            apply_field(&mut entry, field)?;
        }
    }

    Ok(entry)
}

/// Split the address from the extension fields.
///
/// A search pattern may contain tabs and even `;"`, so the terminator is only
/// looked for after the pattern's closing delimiter.
fn split_address(rest: &str) -> (&str, Option<&str>) {
    let terminated = format!("{ADDRESS_TERMINATOR}\t");
    let address_end = pattern_end(rest).unwrap_or(0);

    match rest[address_end..].find(&terminated) {
        Some(at) => {
            let at = address_end + at;
            (&rest[..at], Some(&rest[at + terminated.len()..]))
        }
        None => (rest.strip_suffix(ADDRESS_TERMINATOR).unwrap_or(rest), None),
    }
}

/// Byte offset just past the closing delimiter of a `/…/` or `?…?` pattern
fn pattern_end(rest: &str) -> Option<usize> {
    let delimiter = rest.chars().next().filter(|c| *c == '/' || *c == '?')?;
    let mut escaped = false;

    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delimiter {
            return Some(i + c.len_utf8());
        }
    }
    None
}

fn apply_field(entry: &mut TagEntry, field: &str) -> Result<(), String> {
    let (key, value) = match field.split_once(':') {
        Some(pair) => pair,
        // A bare single character is the kind letter
        None if field.chars().count() == 1 => ("kind", field),
        None => return Err(format!("can't parse extension field '{field}'")),
    };

    match key {
        "file" => {
            entry.file_scoped = true;
            let value = if value.is_empty() { entry.file.as_str() } else { value };
            entry.fields.insert(key.to_string(), value.to_string());
            return Ok(());
        }
        "line" if !value.is_empty() => {
            let line = value
                .parse()
                .map_err(|_| format!("invalid line field '{value}'"))?;
            entry.line = Some(line);
        }
        "kind" if !value.is_empty() => entry.kind = Some(value.to_string()),
        _ => {}
    }

    if value.is_empty() {
        return Ok(());
    }

    if entry.scope.is_none() {
        entry.scope = TagScope::from_field(key, value);
    }
    entry.fields.insert(key.to_string(), value.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SAMPLE: &str = "!_TAG_FILE_FORMAT\t2\t/extended format/\n\
!_TAG_FILE_SORTED\t1\t/0=unsorted, 1=sorted/\n\
Config\tsrc/config.py\t/^class Config(object):$/;\"\tc\tline:12\n\
foo\ta.py\t10;\"\tf\n\
foo\tb.py\t20;\"\tf\n\
load\tsrc/config.py\t/^    def load(self, path):$/;\"\tm\tline:30\tclass:Config\n\
helper\tsrc/util.py\t/^def helper():$/;\"\tkind:function\tline:3\tfile:\n";

    fn parse_sample() -> TagIndex {
        parse_str(SAMPLE, Path::new("tags"), Some(PathBuf::from("/proj"))).unwrap()
    }

    #[test]
    fn test_skips_comment_lines() {
        let index = parse_sample();
        assert_eq!(index.len(), 5);
        assert!(index.definitions(Some("!_TAG_FILE_FORMAT")).is_empty());
    }

    #[test]
    fn test_numeric_and_pattern_addresses() {
        let index = parse_sample();

        let foo = index.definitions(Some("foo"));
        assert_eq!(foo[0].address, TagAddress::Line(10));
        assert_eq!(foo[0].file, "a.py");
        assert_eq!(foo[1].address, TagAddress::Line(20));

        let config = index.definitions(Some("Config"))[0];
        assert_eq!(
            config.address,
            TagAddress::Pattern("/^class Config(object):$/".to_string())
        );
        assert_eq!(config.line, Some(12));
        assert_eq!(config.kind.as_deref(), Some("c"));
    }

    #[test]
    fn test_extension_fields() {
        let index = parse_sample();

        let load = index.definitions(Some("load"))[0];
        let scope = load.scope.as_ref().unwrap();
        assert_eq!(scope.kind, "class");
        assert_eq!(scope.name, "Config");
        assert_eq!(load.kind.as_deref(), Some("m"));

        let helper = index.definitions(Some("helper"))[0];
        assert!(helper.file_scoped);
        assert_eq!(helper.fields.get("file").map(String::as_str), Some("src/util.py"));
        assert_eq!(helper.kind.as_deref(), Some("function"));
    }

    #[test]
    fn test_pattern_containing_tab() {
        let entry = parse_line("x\tm.py\t/^x =\t1$/;\"\tv").unwrap();
        assert_eq!(entry.address, TagAddress::Pattern("/^x =\t1$/".to_string()));
        assert_eq!(entry.kind.as_deref(), Some("v"));
    }

    #[test]
    fn test_pattern_containing_terminator() {
        let entry = parse_line("SEP\tconf.py\t/^SEP = ';\"\t'$/;\"\tv\tline:4").unwrap();
        assert_eq!(entry.address, TagAddress::Pattern("/^SEP = ';\"\t'$/".to_string()));
        assert_eq!(entry.kind.as_deref(), Some("v"));
        assert_eq!(entry.line, Some(4));

        let entry = parse_line("url\tweb.py\t/^url = 'a\\/b;\"\t'$/").unwrap();
        assert_eq!(entry.address, TagAddress::Pattern("/^url = 'a\\/b;\"\t'$/".to_string()));
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_record_without_extension_fields() {
        let entry = parse_line("main\tmain.c\t3").unwrap();
        assert_eq!(entry.address, TagAddress::Line(3));
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_malformed_line_fails_with_position() {
        let contents = "foo\ta.py\t10;\"\tf\nbroken line without tabs\n";
        let err = parse_str(contents, Path::new("tags"), None).unwrap_err();
        match err {
            IndexFormatError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_bad_fields_and_addresses() {
        assert!(parse_line("foo\ta.py\tsomewhere").is_err());
        assert!(parse_line("foo\ta.py\t10;\"\tnonsense").is_err());
        assert!(parse_line("foo\ta.py\t10;\"\tline:ten").is_err());
        assert!(parse_line("\ta.py\t10").is_err());
        assert!(parse_line("foo\t\t10").is_err());
    }

    #[test]
    fn test_missing_file_is_index_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = parse(&temp_dir.path().join("tags")).unwrap_err();
        assert!(matches!(err, IndexFormatError::Missing(_)));
    }

    #[test]
    fn test_invalid_utf8_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let tags_path = temp_dir.path().join("tags");
        fs::write(&tags_path, b"foo\ta\xffb.py\t1\n").unwrap();

        let err = parse(&tags_path).unwrap_err();
        assert!(matches!(err, IndexFormatError::Unreadable { .. }));
    }

    #[test]
    fn test_parse_file_sets_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let tags_path = temp_dir.path().join("tags");
        fs::write(&tags_path, SAMPLE).unwrap();

        let index = parse(&tags_path).unwrap();
        assert_eq!(index.base_dir(), Some(temp_dir.path()));
        assert_eq!(index.len(), 5);
    }
}
