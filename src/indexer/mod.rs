use crate::config::Settings;
use crate::error::BuildError;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;

/// What to index and where the result goes
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub dirs: Vec<PathBuf>,
    pub file_patterns: Vec<String>,
    pub tags_file: PathBuf,
    pub project_root: PathBuf,
    pub xref_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub files: usize,
    pub elapsed: Duration,
    pub xref_built: bool,
}

/// Collect the files under `dirs` whose names match `patterns`, sorted and
/// without duplicates (the directories may overlap).
pub fn collect_files(dirs: &[PathBuf], patterns: &[String]) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = BTreeSet::new();

    for dir in dirs {
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in patterns {
            overrides.add(pattern)?;
        }

        let walker = WalkBuilder::new(dir)
            .standard_filters(true)
            .hidden(true)
            .overrides(overrides.build()?)
            .build();

        for entry in walker.flatten() {
            if entry.file_type().map_or(false, |ft| ft.is_file()) {
                files.insert(entry.into_path());
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// Runs ctags (and optionally gtags) over a project
pub struct TagBuilder {
    settings: Settings,
    running: AtomicBool,
}

struct BuildGuard<'a>(&'a AtomicBool);

impl<'a> BuildGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, BuildError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(BuildError::AlreadyRunning);
        }
        Ok(Self(flag))
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TagBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Rebuild the tags file.
    ///
    /// ctags writes into a temporary file next to the target which is then
    /// renamed over it, so readers only ever see a complete tags file.
    pub async fn rebuild(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let _guard = BuildGuard::acquire(&self.running)?;
        let started = Instant::now();

        let files = collect_files(&request.dirs, &request.file_patterns)?;
        tracing::info!(
            "Indexing {} files into {}",
            files.len(),
            request.tags_file.display()
        );

        let mut list = tempfile::NamedTempFile::new()?;
        for file in &files {
            writeln!(list, "{}", file.display())?;
        }
        list.flush()?;

        let tags_dir = request
            .tags_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| request.project_root.clone());
        std::fs::create_dir_all(&tags_dir)?;
        let output = tempfile::Builder::new()
            .prefix(".tags-")
            .tempfile_in(&tags_dir)?;

        let mut ctags = Command::new(&self.settings.ctags_cmd);
        ctags
            .args(&self.settings.ctags_args)
            .arg("--fields=+nz")
            .arg("-L")
            .arg(list.path())
            .arg("-f")
            .arg(output.path())
            .current_dir(&request.project_root);
        run(ctags).await?;

        output
            .persist(&request.tags_file)
            .map_err(|err| BuildError::Io(err.error))?;

        let mut xref_built = false;
        if request.xref_enabled {
            let mut gtags = Command::new(&self.settings.gtags_cmd);
            gtags
                .args(&self.settings.gtags_args)
                .arg("-f")
                .arg(list.path())
                .current_dir(&request.project_root);
            run(gtags).await?;
            xref_built = true;
        }

        let report = BuildReport {
            files: files.len(),
            elapsed: started.elapsed(),
            xref_built,
        };
        tracing::debug!("Rebuild finished in {:.2}ms", report.elapsed.as_secs_f64() * 1000.0);
        Ok(report)
    }
}

async fn run(mut command: Command) -> Result<(), BuildError> {
    let label = format!("{:?}", command.as_std());
    tracing::debug!("Running {}", label);

    let output = command.output().await.map_err(|source| BuildError::Spawn {
        command: label.clone(),
        source,
    })?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(BuildError::CommandFailed {
            command: label,
            status: output.status.to_string(),
            output: text.trim().to_string(),
        });
    }

    Ok(())
}
