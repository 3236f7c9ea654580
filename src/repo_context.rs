//! Current repository lookup
//!
//! Local specs (`./path.md`) take their `owner/repo` from the repository the
//! caller is standing in. The lookup shells out to git once and caches the
//! answer inside the lookup object.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;
use url::Url;

use crate::error::{Result, WfrefError};
use crate::process::ProcessCommand;

const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the current repository's `owner/repo` slug
pub trait CurrentRepository: Send + Sync {
    fn repo_slug(&self) -> Result<String>;
}

/// Reads the `origin` remote via `git remote get-url`
pub struct GitCurrentRepository {
    git: String,
    dir: Option<PathBuf>,
    timeout: Duration,
    slug: OnceCell<String>,
}

impl GitCurrentRepository {
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
            dir: None,
            timeout: DEFAULT_GIT_TIMEOUT,
            slug: OnceCell::new(),
        }
    }

    /// Set a custom git binary
    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    /// Look up the repository containing `dir` instead of the process cwd
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lookup(&self) -> Result<String> {
        let mut cmd = ProcessCommand::new(&self.git, self.timeout).args(["remote", "get-url", "origin"]);
        if let Some(ref dir) = self.dir {
            cmd = cmd.current_dir(dir);
        }
        let url = cmd
            .run()
            .map_err(|e| WfrefError::CurrentRepositoryUnknown {
                reason: e.to_string(),
            })?
            .stdout_text();

        let slug = slug_from_remote_url(&url).ok_or_else(|| WfrefError::CurrentRepositoryUnknown {
            reason: format!("origin remote '{}' is not a GitHub repository", url),
        })?;
        debug!(remote = %url, slug = %slug, "current repository");
        Ok(slug)
    }
}

impl Default for GitCurrentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentRepository for GitCurrentRepository {
    fn repo_slug(&self) -> Result<String> {
        self.slug.get_or_try_init(|| self.lookup()).cloned()
    }
}

/// Fixed slug, for tests and callers that already know the repository
pub struct StaticRepository(pub String);

impl CurrentRepository for StaticRepository {
    fn repo_slug(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

static PROCESS_REPOSITORY: Lazy<GitCurrentRepository> = Lazy::new(GitCurrentRepository::new);

/// Shared lookup for the process working directory
pub fn current_repository() -> &'static GitCurrentRepository {
    &PROCESS_REPOSITORY
}

/// Extract `owner/repo` from an https, ssh or scp-style GitHub remote URL
pub fn slug_from_remote_url(remote: &str) -> Option<String> {
    let remote = remote.trim();

    // scp-like syntax: git@github.com:owner/repo.git
    let path = if let Some(rest) = remote.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        if !is_github_host(host) {
            return None;
        }
        path.to_string()
    } else {
        let url = Url::parse(remote).ok()?;
        if !is_github_host(url.host_str()?) {
            return None;
        }
        url.path().to_string()
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{}/{}", owner, repo))
        }
        _ => None,
    }
}

fn is_github_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("github.com") || host.eq_ignore_ascii_case("www.github.com")
}
