use crate::config::Settings;
use crate::indexer::{BuildRequest, TagBuilder};
use crate::mcp::types::Content;
use crate::navigation::NavigationFrame;
use crate::project::config::{lookup_dir, ProjectConfig};
use crate::project::{ProjectContext, ProjectRegistry};
use crate::scope;
use crate::tags::resolver::SymbolResolver;
use crate::tags::{TagEntry, TagIndex};
use crate::xref::global::GlobalXref;
use crate::xref::DefinitionSource;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const DEFAULT_LIMIT: usize = 100;

/// Tool handlers for MCP server
pub struct ToolHandlers {
    settings: Settings,
    projects: Mutex<ProjectRegistry>,
    builder: TagBuilder,
}

impl ToolHandlers {
    pub fn new(settings: Settings) -> Self {
        Self {
            projects: Mutex::new(ProjectRegistry::new(settings.config_filename.clone())),
            builder: TagBuilder::new(settings.clone()),
            settings,
        }
    }

    /// Handle setup_project tool
    pub async fn handle_setup_project(&self, args: &Value) -> Result<Vec<Content>> {
        let path = PathBuf::from(required_str(args, "path")?);
        let dir = lookup_dir(&path);
        if !dir.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir.display());
        }

        let mut projects = self.projects.lock().await;
        let mut text = match projects.find_config(&dir) {
            Some(existing) => {
                projects.project_for(&dir)?.reload_config()?;
                format!("Project already configured: {}", existing.display())
            }
            None => {
                let written = ProjectConfig::write_default(&dir, projects.config_filename())?;
                format!("Created project config: {}", written.display())
            }
        };

        if let Err(e) = self.settings.check_ctags() {
            tracing::warn!("{}", e);
            text.push_str(&format!("\nWarning: {}", e));
        }

        Ok(vec![Content::Text { text }])
    }

    /// Handle rebuild_tags tool
    pub async fn handle_rebuild_tags(&self, args: &Value) -> Result<Vec<Content>> {
        let path = PathBuf::from(required_str(args, "path")?);
        self.settings.check_ctags()?;

        let request = {
            let mut projects = self.projects.lock().await;
            let project = projects.project_for(&path)?;
            BuildRequest {
                dirs: project.index_dirs(&path),
                file_patterns: project.config().file_patterns.clone(),
                tags_file: project.tags_file(),
                project_root: project.root().to_path_buf(),
                xref_enabled: project.config().xref_enabled,
            }
        };

        // The registry stays unlocked while the indexer runs so lookups keep working
        let report = self.builder.rebuild(&request).await?;

        self.projects.lock().await.project_for(&path)?.invalidate();

        let mut text = format!(
            "Tags rebuilt: {} files in {:.2}ms\nTags file: {}",
            report.files,
            report.elapsed.as_secs_f64() * 1000.0,
            request.tags_file.display()
        );
        if report.xref_built {
            text.push_str("\nCross-reference database rebuilt");
        }
        Ok(vec![Content::Text { text }])
    }

    /// Handle jump_to_definition tool
    pub async fn handle_jump_to_definition(&self, args: &Value) -> Result<Vec<Content>> {
        let file = PathBuf::from(required_str(args, "file")?);
        let symbol = required_str(args, "symbol")?;
        let line = optional_u32(args, "line").unwrap_or(1);
        let column = optional_u32(args, "column").unwrap_or(1);

        let cursor_scope = match args.get("scope").and_then(|v| v.as_str()) {
            Some(scope) => Some(scope.to_string()),
            None => fs::read_to_string(&file)
                .await
                .ok()
                .and_then(|source| scope::enclosing_scope(&source, line as usize)),
        };

        let mut projects = self.projects.lock().await;
        let project = projects.project_for(&file)?;
        let index = load_index(project)?;

        let mut resolved = Resolved::from_index(project, &index, symbol, &file, cursor_scope.as_deref());

        if resolved.entry.is_none() && project.config().xref_enabled {
            let xref = GlobalXref::new(&self.settings, project.root());
            match xref.definitions(symbol).await {
                Ok(xref_index) => {
                    resolved = Resolved::from_index(
                        project,
                        &xref_index,
                        symbol,
                        &file,
                        cursor_scope.as_deref(),
                    );
                }
                Err(e) => tracing::warn!("{} lookup for '{}' failed: {}", xref.name(), symbol, e),
            }
        }

        let Some(entry) = resolved.entry else {
            return Ok(vec![Content::Text {
                text: format!("Can't find '{}'", symbol),
            }]);
        };

        let target = entry.path_in(resolved.base_dir.as_deref());
        let target_line = match fs::read_to_string(&target).await {
            Ok(contents) => entry.locate(&contents),
            Err(e) => {
                tracing::debug!("Can't read {}: {}", target.display(), e);
                entry.line_hint()
            }
        }
        .unwrap_or(1);

        project
            .history()
            .push(NavigationFrame::new(file.clone(), line, column));
        let destination = NavigationFrame::new(target, target_line, 1);
        tracing::info!(
            "Jump to '{}' -> {} ({} candidates)",
            symbol,
            destination,
            resolved.listing.len()
        );

        let mut content = vec![Content::Text {
            text: destination.to_string(),
        }];
        if resolved.listing.len() > 1 {
            content.push(Content::Text {
                text: format!(
                    "{} definitions of '{}':\n{}",
                    resolved.listing.len(),
                    symbol,
                    resolved.listing.join("\n")
                ),
            });
        }
        Ok(content)
    }

    /// Handle jump_back tool
    pub async fn handle_jump_back(&self, args: &Value) -> Result<Vec<Content>> {
        let path = PathBuf::from(required_str(args, "path")?);

        let mut projects = self.projects.lock().await;
        let text = match projects.project_for(&path)?.history().pop() {
            Some(frame) => frame.to_string(),
            None => "Jump history is empty".to_string(),
        };

        Ok(vec![Content::Text { text }])
    }

    /// Handle search_definitions tool
    pub async fn handle_search_definitions(&self, args: &Value) -> Result<Vec<Content>> {
        let path = PathBuf::from(required_str(args, "path")?);
        let symbol = args.get("symbol").and_then(|v| v.as_str());
        let limit = optional_limit(args);

        let mut projects = self.projects.lock().await;
        let project = projects.project_for(&path)?;
        let index = load_index(project)?;

        let definitions = index.definitions(symbol);
        if definitions.is_empty() {
            return Ok(vec![Content::Text {
                text: match symbol {
                    Some(symbol) => format!("Can't find '{}'", symbol),
                    None => "No definitions found.".to_string(),
                },
            }]);
        }

        let mut formatted = format!("{} definitions:\n", definitions.len());
        for entry in definitions.iter().take(limit) {
            formatted.push_str(&describe(project, index.base_dir(), entry));
            formatted.push('\n');
        }
        if definitions.len() > limit {
            formatted.push_str(&format!("... {} more\n", definitions.len() - limit));
        }

        Ok(vec![Content::Text { text: formatted }])
    }

    /// Handle complete_symbol tool
    pub async fn handle_complete_symbol(&self, args: &Value) -> Result<Vec<Content>> {
        let path = PathBuf::from(required_str(args, "path")?);
        let prefix = required_str(args, "prefix")?;
        let limit = optional_limit(args);

        let mut projects = self.projects.lock().await;
        let index = load_index(projects.project_for(&path)?)?;

        let names = index.complete(prefix);
        let text = if names.is_empty() {
            format!("No symbols start with '{}'", prefix)
        } else {
            names.into_iter().take(limit).collect::<Vec<_>>().join("\n")
        };

        Ok(vec![Content::Text { text }])
    }

    /// Handle parent_scopes tool
    pub async fn handle_parent_scopes(&self, args: &Value) -> Result<Vec<Content>> {
        let file = PathBuf::from(required_str(args, "file")?);
        let line = optional_u32(args, "line").context("Missing 'line' argument")?;

        let source = fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let parents = scope::parent_lines(&source, line as usize);
        if parents.is_empty() {
            return Ok(vec![Content::Text {
                text: "No enclosing blocks".to_string(),
            }]);
        }

        let text = parents
            .iter()
            .enumerate()
            .map(|(depth, parent)| format!("{}: {}{}", parent.line, " ".repeat(depth), parent.text))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(vec![Content::Text { text }])
    }
}

/// Outcome of resolving a symbol against one index
struct Resolved {
    entry: Option<TagEntry>,
    base_dir: Option<PathBuf>,
    listing: Vec<String>,
}

impl Resolved {
    fn from_index(
        project: &ProjectContext,
        index: &TagIndex,
        symbol: &str,
        file: &Path,
        cursor_scope: Option<&str>,
    ) -> Self {
        let entry = SymbolResolver::new(index)
            .resolve_in_scope(symbol, Some(file), cursor_scope)
            .cloned();
        let listing = index
            .definitions(Some(symbol))
            .into_iter()
            .map(|candidate| describe(project, index.base_dir(), candidate))
            .collect();

        Self {
            entry,
            base_dir: index.base_dir().map(Path::to_path_buf),
            listing,
        }
    }
}

fn load_index(project: &mut ProjectContext) -> Result<std::sync::Arc<TagIndex>> {
    project
        .index()
        .map_err(|e| anyhow::anyhow!("{}. Run rebuild_tags to build the tags index.", e))
}

/// One candidate line: `path:line  text`, flagged when only visible in its own file
fn describe(project: &ProjectContext, base_dir: Option<&Path>, entry: &TagEntry) -> String {
    let path = project.prettify_path(&entry.path_in(base_dir));
    let line = entry
        .line_hint()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "?".to_string());
    let text = entry
        .fields
        .get("pattern")
        .cloned()
        .unwrap_or_else(|| entry.address.display_text());

    let mut described = match &entry.scope {
        Some(scope) => format!("{}:{}  {}  [{} {}]", path, line, text, scope.kind, scope.name),
        None => format!("{}:{}  {}", path, line, text),
    };
    if entry.file_scoped {
        described.push_str("  (file-local)");
    }
    described
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing '{}' argument", key))
}

fn optional_u32(args: &Value, key: &str) -> Option<u32> {
    args.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

fn optional_limit(args: &Value) -> usize {
    args.get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_LIMIT)
}
