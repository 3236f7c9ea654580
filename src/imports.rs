//! Import Graph Collection
//!
//! Given an entry workflow, find every local file it depends on: the entry
//! itself, its freshly compiled lock file, and the transitive closure of
//! its frontmatter `imports:`.
//!
//! ## Resolution Rules
//!
//! - `#Section` suffixes are ignored
//! - entries containing `@` are remote workflowspecs and are skipped
//! - `/shared/x.md` is relative to the git repository root
//! - anything else is relative to the importing file's directory
//! - missing files are logged and skipped
//!
//! Collected paths are the ones the import graph names, made absolute and
//! lexically normalized. Symlinks are not followed for output, so a linked
//! file stays at its in-repository path.
//!
//! Cycles and diamonds are handled by the visited set in
//! [`ResolutionContext`], keyed by the real path; each file is read at most
//! once however it is spelled or linked.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::compiler::{check_staleness, LockCompiler, Staleness};
use crate::config::WfrefConfig;
use crate::error::{Result, WfrefError};
use crate::frontmatter::{import_entries, parse_frontmatter, strip_section};
use crate::process::ProcessCommand;
use crate::spec::is_workflow_spec_format;

/// Traversal state, owned by the caller for the duration of one collection
#[derive(Debug, Default)]
pub struct ResolutionContext {
    files: BTreeSet<PathBuf>,
    visited: HashSet<PathBuf>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected files so far, sorted
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn is_visited(&self, path: &Path) -> bool {
        self.visited.contains(&visit_key(path))
    }

    pub fn into_files(self) -> Vec<PathBuf> {
        self.files.into_iter().collect()
    }

    fn add(&mut self, path: PathBuf) {
        self.files.insert(path);
    }
}

/// Walks import graphs, compiling entry workflows on the way
pub struct ImportCollector<'a> {
    compiler: &'a dyn LockCompiler,
    repo_root: OnceCell<PathBuf>,
    git: String,
    git_timeout: Duration,
    cancel: CancellationToken,
}

impl<'a> ImportCollector<'a> {
    pub fn new(compiler: &'a dyn LockCompiler) -> Self {
        Self {
            compiler,
            repo_root: OnceCell::new(),
            git: "git".to_string(),
            git_timeout: Duration::from_secs(120),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(compiler: &'a dyn LockCompiler, config: &WfrefConfig) -> Self {
        Self::new(compiler).with_git(config.tools.git.clone(), config.timeouts.git())
    }

    /// Root for `/`-prefixed imports. Without it, `git rev-parse
    /// --show-toplevel` is asked on first use.
    pub fn with_repo_root(self, root: impl Into<PathBuf>) -> Self {
        let _ = self.repo_root.set(root.into());
        self
    }

    pub fn with_git(mut self, git: impl Into<String>, timeout: Duration) -> Self {
        self.git = git.into();
        self.git_timeout = timeout;
        self
    }

    /// Checked between files; a cancelled collection returns `Cancelled`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Entry, its recompiled lock file, and every transitively imported
    /// local file; absolute, deduplicated and sorted.
    pub fn collect_workflow_files(&self, entry: &Path) -> Result<Vec<PathBuf>> {
        let mut ctx = ResolutionContext::new();
        self.collect_entry(entry, &mut ctx)?;
        Ok(ctx.into_files())
    }

    /// Union of the closures of every `*.md` directly inside `dir`
    pub fn collect_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for item in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                WfrefError::io(path, e.into())
            })?;
            let is_markdown = item.path().extension().is_some_and(|ext| ext == "md");
            if item.file_type().is_file() && is_markdown {
                entries.push(item.into_path());
            }
        }
        entries.sort();
        info!(dir = %dir.display(), workflows = entries.len(), "collecting directory");

        let mut ctx = ResolutionContext::new();
        for entry in &entries {
            self.collect_entry(entry, &mut ctx)?;
        }
        Ok(ctx.into_files())
    }

    fn collect_entry(&self, entry: &Path, ctx: &mut ResolutionContext) -> Result<()> {
        self.check_cancelled()?;
        let entry = absolute(entry)?;
        fs::metadata(&entry).map_err(|e| WfrefError::io(&entry, e))?;

        // The compiler runs regardless; staleness is informational
        match check_staleness(&entry) {
            Ok(Staleness::Stale) => warn!(workflow = %entry.display(), "lock file is stale"),
            Ok(state) => debug!(workflow = %entry.display(), ?state, "lock file state"),
            Err(e) => warn!(workflow = %entry.display(), error = %e, "staleness check failed"),
        }
        let lock = absolute(&self.compiler.compile(&entry)?)?;

        ctx.add(entry.clone());
        ctx.add(lock);
        self.collect_imports(&entry, ctx)
    }

    /// Add everything `path` imports (transitively) to `ctx`.
    ///
    /// `path` itself is not added; callers decide whether it belongs.
    pub fn collect_imports(&self, path: &Path, ctx: &mut ResolutionContext) -> Result<()> {
        self.check_cancelled()?;
        if !ctx.visited.insert(visit_key(path)) {
            return Ok(());
        }

        let content = fs::read_to_string(path).map_err(|e| WfrefError::io(path, e))?;
        let Some(frontmatter) = parse_frontmatter(path, &content)? else {
            return Ok(());
        };

        for entry in import_entries(path, &frontmatter) {
            let import = strip_section(entry.path()).trim();
            if import.is_empty() {
                continue;
            }
            if is_workflow_spec_format(import) {
                debug!(file = %path.display(), import, "remote import, skipping");
                continue;
            }

            let Some(target) = self.resolve_import(path, import) else {
                continue;
            };
            let target = normalize(&target);
            if !target.is_file() {
                warn!(
                    file = %path.display(),
                    import,
                    resolved = %target.display(),
                    "import not found, skipping"
                );
                continue;
            }
            ctx.add(target.clone());
            self.collect_imports(&target, ctx)?;
        }
        Ok(())
    }

    fn resolve_import(&self, importer: &Path, import: &str) -> Option<PathBuf> {
        let base = importer.parent().unwrap_or(Path::new("/"));
        match import.strip_prefix('/') {
            Some(rooted) => match self.repo_root(base) {
                Ok(root) => Some(root.join(rooted)),
                Err(e) => {
                    warn!(import, error = %e, "repository root unknown, skipping rooted import");
                    None
                }
            },
            None => Some(base.join(import)),
        }
    }

    fn repo_root(&self, near: &Path) -> Result<&PathBuf> {
        self.repo_root.get_or_try_init(|| {
            let out = ProcessCommand::new(&self.git, self.git_timeout)
                .args(["rev-parse", "--show-toplevel"])
                .current_dir(near)
                .run()?;
            let root = PathBuf::from(out.stdout_text());
            debug!(root = %root.display(), "repository root");
            Ok(root)
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(WfrefError::Cancelled);
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path).map_err(|e| WfrefError::io(path, e))?;
    Ok(normalize(&abs))
}

/// Drop `.` and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Real path when it exists, so links and aliases share one visit
fn visit_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}
