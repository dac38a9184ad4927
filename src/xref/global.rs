use super::DefinitionSource;
use crate::config::Settings;
use crate::error::IndexFormatError;
use crate::tags::{TagAddress, TagEntry, TagIndex};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// GNU Global cross-reference database (`GTAGS`) of one project
pub struct GlobalXref {
    command: String,
    args: Vec<String>,
    root: PathBuf,
}

impl GlobalXref {
    pub fn new(settings: &Settings, root: &Path) -> Self {
        Self {
            command: settings.global_cmd.clone(),
            args: settings.global_args.clone(),
            root: root.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl DefinitionSource for GlobalXref {
    async fn definitions(&self, symbol: &str) -> Result<TagIndex> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg("-x")
            .arg("--")
            .arg(symbol)
            .current_dir(&self.root)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.command))?;

        // global exits with 1 when nothing matches; anything else is a real failure
        match output.status.code() {
            Some(0) | Some(1) => {}
            _ => anyhow::bail!(
                "{} failed with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let index = parse_global_output(&stdout, Some(self.root.clone()))?;
        tracing::debug!("{} found {} definitions of '{}'", self.command, index.len(), symbol);
        Ok(index)
    }

    fn name(&self) -> &str {
        "global"
    }
}

/// Parse `global -x` output: `<name> <line> <path> <source text>` per line
pub fn parse_global_output(
    output: &str,
    base_dir: Option<PathBuf>,
) -> Result<TagIndex, IndexFormatError> {
    let mut index = TagIndex::new(base_dir);

    for (i, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: &str| IndexFormatError::malformed("global -x", i + 1, reason);

        let (name, rest) = split_field(line);
        let (line_field, rest) = split_field(rest);
        let (file, rest) = split_field(rest);
        if name.is_empty() || file.is_empty() {
            return Err(malformed("expected '<name> <line> <path> <text>'"));
        }
        let line_number: u32 = line_field
            .parse()
            .map_err(|_| malformed("line number is not an integer"))?;

        let text = rest.trim();
        let mut fields = BTreeMap::new();
        if !text.is_empty() {
            fields.insert("pattern".to_string(), text.to_string());
        }

        index.push(TagEntry {
            name: name.to_string(),
            file: file.to_string(),
            address: TagAddress::Line(line_number),
            kind: None,
            scope: None,
            line: Some(line_number),
            file_scoped: false,
            fields,
        });
    }

    Ok(index)
}

fn split_field(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::resolver::SymbolResolver;
    use std::fs;
    use tempfile::TempDir;

    /// Stands in for `global -x`: knows `load`, exits 1 for anything else and
    /// fails outright for `crash`
    const FAKE_GLOBAL: &str = r#"
[ "$1" = -x ] && [ "$2" = -- ] || exit 3
case "$3" in
  load) printf 'load             12 src/config.py   def load(self, path):\n' ;;
  crash) echo 'global: GTAGS not found.' >&2; exit 3 ;;
  *) exit 1 ;;
esac
"#;

    fn fake_global() -> (TempDir, GlobalXref) {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-global.sh");
        fs::write(&script, FAKE_GLOBAL).unwrap();

        let settings = Settings {
            global_cmd: "sh".to_string(),
            global_args: vec![script.to_string_lossy().to_string()],
            ..Settings::default()
        };
        let xref = GlobalXref::new(&settings, temp_dir.path());
        (temp_dir, xref)
    }

    #[tokio::test]
    async fn test_definitions_from_command() {
        let (temp_dir, xref) = fake_global();

        let index = xref.definitions("load").await.unwrap();
        assert_eq!(index.base_dir(), Some(temp_dir.path()));
        let load = index.definitions(Some("load"))[0];
        assert_eq!(load.line_hint(), Some(12));
        assert_eq!(
            load.path_in(index.base_dir()),
            temp_dir.path().join("src/config.py")
        );
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let (_temp_dir, xref) = fake_global();
        assert!(xref.definitions("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_is_error() {
        let (_temp_dir, xref) = fake_global();
        let err = xref.definitions("crash").await.unwrap_err();
        assert!(err.to_string().contains("GTAGS not found"));
    }

    #[test]
    fn test_parse_global_output() {
        let output = "\
load              12 src/config.py    def load(self, path):
load              40 src/cache.py     def load(self):
";
        let index = parse_global_output(output, Some(PathBuf::from("/proj"))).unwrap();
        let loads = index.definitions(Some("load"));
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0].file, "src/config.py");
        assert_eq!(loads[0].address, TagAddress::Line(12));
        assert_eq!(
            loads[0].fields.get("pattern").map(String::as_str),
            Some("def load(self, path):")
        );

        let found = SymbolResolver::new(&index)
            .resolve("load", Some(Path::new("/proj/src/cache.py")))
            .unwrap();
        assert_eq!(found.line_hint(), Some(40));
    }

    #[test]
    fn test_empty_output_is_empty_index() {
        assert!(parse_global_output("\n", None).unwrap().is_empty());
    }

    #[test]
    fn test_bad_line_number_is_malformed() {
        let err = parse_global_output("load  twelve src/a.py  def load():\n", None).unwrap_err();
        assert!(matches!(err, IndexFormatError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        assert!(parse_global_output("load 12\n", None).is_err());
    }
}
