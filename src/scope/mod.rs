use regex::Regex;
use std::sync::OnceLock;

/// A line that opens a block enclosing the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLine {
    /// 1-based
    pub line: usize,
    pub indent: usize,
    pub text: String,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^\s*(?:async\s+)?(?:class|def)\s+([A-Za-z_][A-Za-z0-9_]*)")
            .expect("scope header regex is valid")
    })
}

fn indent_of(line: &str) -> Option<usize> {
    let trimmed = line.trim_start_matches([' ', '\t']);
    if trimmed.trim().is_empty() {
        return None;
    }
    Some(line.len() - trimmed.len())
}

/// Lines of the blocks enclosing 1-based `line`, outermost first.
///
/// Walks upward recording every non-blank line indented less than the last
/// one recorded, stopping at the first unindented line. The cursor line itself
/// is not part of the result, and a line past the end of the source has no
/// parents.
pub fn parent_lines(source: &str, line: usize) -> Vec<ParentLine> {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut last_indent: Option<usize> = None;

    for row in (0..line).rev() {
        let Some(indent) = indent_of(lines[row]) else {
            continue;
        };

        if last_indent.map_or(true, |last| indent < last) {
            found.push(ParentLine {
                line: row + 1,
                indent,
                text: lines[row].trim().to_string(),
            });
            last_indent = Some(indent);
        }

        if indent == 0 {
            break;
        }
    }

    // The first recorded line is the block the cursor sits in, not a parent
    if !found.is_empty() {
        found.remove(0);
    }
    found.reverse();
    found
}

/// Dotted name of the class/def blocks enclosing `line`, e.g. `Config.load`
pub fn enclosing_scope(source: &str, line: usize) -> Option<String> {
    let names: Vec<String> = parent_lines(source, line)
        .iter()
        .filter_map(|parent| {
            header_regex()
                .captures(&parent.text)
                .map(|caps| caps[1].to_string())
        })
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = concat!(
        "import os\n",
        "\n",
        "class Config(object):\n",
        "    path = None\n",
        "\n",
        "    def load(self, path):\n",
        "        if path:\n",
        "            self.path = path\n",
        "        return self\n",
        "\n",
        "def main():\n",
        "    Config().load('x')\n",
    );

    #[test]
    fn test_parent_lines_outermost_first() {
        let parents = parent_lines(SOURCE, 8);
        let lines: Vec<usize> = parents.iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![3, 6, 7]);
        assert_eq!(parents[0].text, "class Config(object):");
        assert_eq!(parents[1].indent, 4);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let parents = parent_lines(SOURCE, 12);
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].text, "def main():");
    }

    #[test]
    fn test_top_level_line_has_no_parents() {
        assert!(parent_lines(SOURCE, 1).is_empty());
        assert!(parent_lines(SOURCE, 0).is_empty());
        assert!(parent_lines("", 3).is_empty());
    }

    #[test]
    fn test_line_past_end_has_no_parents() {
        let source = "def main():\n    if True:\n        run()\n";
        assert_eq!(parent_lines(source, 3).len(), 2);
        assert!(parent_lines(source, 4).is_empty());
        assert!(parent_lines(source, 40).is_empty());
        assert_eq!(enclosing_scope(source, 4), None);
    }

    #[test]
    fn test_enclosing_scope_joins_headers() {
        assert_eq!(enclosing_scope(SOURCE, 8).as_deref(), Some("Config.load"));
        assert_eq!(enclosing_scope(SOURCE, 4).as_deref(), Some("Config"));
        assert_eq!(enclosing_scope(SOURCE, 12).as_deref(), Some("main"));
        assert_eq!(enclosing_scope(SOURCE, 11), None);
    }
}
