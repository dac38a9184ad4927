/// Location part of a tag record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAddress {
    /// 1-based line number
    Line(u32),
    /// Ex search command, stored verbatim including delimiters (`/^def foo():$/`)
    Pattern(String),
}

impl TagAddress {
    /// Parse the raw address field. Returns `None` for anything that is
    /// neither a line number nor a delimited search pattern.
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse().ok().map(TagAddress::Line);
        }

        let mut chars = raw.chars();
        let open = chars.next()?;
        let close = chars.next_back()?;
        if (open == '/' || open == '?') && open == close {
            return Some(TagAddress::Pattern(raw.to_string()));
        }

        None
    }

    /// Text shown to the user in candidate lists
    pub fn display_text(&self) -> String {
        match self {
            TagAddress::Line(line) => line.to_string(),
            TagAddress::Pattern(_) => self
                .search_pattern()
                .map(|p| p.text.trim().to_string())
                .unwrap_or_default(),
        }
    }

    /// Resolve the address against the current contents of the target file
    pub fn locate(&self, contents: &str) -> Option<u32> {
        match self {
            TagAddress::Line(line) => Some(*line),
            TagAddress::Pattern(_) => {
                let pattern = self.search_pattern()?;
                contents
                    .lines()
                    .position(|line| pattern.matches(line))
                    .map(|i| i as u32 + 1)
            }
        }
    }

    fn search_pattern(&self) -> Option<SearchPattern> {
        match self {
            TagAddress::Line(_) => None,
            TagAddress::Pattern(raw) => SearchPattern::parse(raw),
        }
    }
}

#[derive(Debug)]
struct SearchPattern {
    text: String,
    anchored_start: bool,
    anchored_end: bool,
}

impl SearchPattern {
    fn parse(raw: &str) -> Option<Self> {
        let delimiter = raw.chars().next()?;
        let body = raw.get(1..raw.len().checked_sub(1)?)?;

        let (body, anchored_start) = match body.strip_prefix('^') {
            Some(rest) => (rest, true),
            None => (body, false),
        };
        // A trailing `\$` is a literal dollar, not an anchor
        let (body, anchored_end) = match body.strip_suffix('$') {
            Some(rest) if !rest.ends_with('\\') => (rest, true),
            _ => (body, false),
        };

        let mut text = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(next) if next == delimiter || next == '\\' || next == '$' => {
                        text.push(next)
                    }
                    Some(next) => {
                        text.push(c);
                        text.push(next);
                    }
                    None => text.push(c),
                }
            } else {
                text.push(c);
            }
        }

        Some(Self {
            text,
            anchored_start,
            anchored_end,
        })
    }

    fn matches(&self, line: &str) -> bool {
        match (self.anchored_start, self.anchored_end) {
            (true, true) => line == self.text,
            (true, false) => line.starts_with(&self.text),
            (false, true) => line.ends_with(&self.text),
            (false, false) => line.contains(&self.text),
        }
    }
}
