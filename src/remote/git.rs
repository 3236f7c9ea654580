//! Git plumbing remote
//!
//! Needs only `git` (and `tar` for archives) plus whatever credentials git
//! itself has.
//!
//! File retrieval has two tiers:
//! 1. `git archive --remote` piped through `tar -xO` (no working tree)
//! 2. A throwaway shallow clone with sparse checkout limited to the file,
//!    for servers that disable remote archive (github.com among them)

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use super::{BranchHead, RemoteRepository};
use crate::config::WfrefConfig;
use crate::error::{Result, WfrefError};
use crate::process::ProcessCommand;
use crate::resolver::is_commit_sha;

const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);
const PEELED_SUFFIX: &str = "^{}";

/// Remote backed by git plumbing commands
pub struct GitRemote {
    git: String,
    tar: String,
    base_url: String,
    timeout: Duration,
}

impl GitRemote {
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
            tar: "tar".to_string(),
            base_url: "https://github.com".to_string(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn from_config(config: &WfrefConfig) -> Self {
        Self {
            git: config.tools.git.clone(),
            tar: config.tools.tar.clone(),
            base_url: config.github.git_base_url.clone(),
            timeout: config.timeouts.git(),
        }
    }

    /// Clone URLs become `<base_url>/<owner>/<repo>.git`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_url(&self, repo: &str) -> String {
        format!("{}/{}.git", self.base_url.trim_end_matches('/'), repo)
    }

    fn git(&self) -> ProcessCommand {
        ProcessCommand::new(&self.git, self.timeout)
    }

    fn ls_remote(&self, args: &[&str]) -> Result<String> {
        let out = self.git().arg("ls-remote").args(args.iter().copied()).run()?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Tier 1: `git archive --remote=<url> <ref> <path> | tar -xO <path>`
    pub fn fetch_via_archive(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let archive = self
            .git()
            .arg("archive")
            .arg(format!("--remote={}", self.repo_url(repo)))
            .args(["--format=tar", git_ref, path])
            .run()?;

        let extracted = ProcessCommand::new(&self.tar, self.timeout)
            .args(["-xOf", "-", path])
            .stdin(archive.stdout)
            .run()?;
        Ok(extracted.stdout)
    }

    /// Tier 2: shallow fetch of one commit into a temp dir, sparse checkout of `path`
    pub fn fetch_via_sparse_checkout(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let tmp = tempfile::Builder::new()
            .prefix("wfref-")
            .tempdir()
            .map_err(|e| WfrefError::io(std::env::temp_dir(), e))?;
        let dir = tmp.path();

        self.git().args(["init", "-q"]).current_dir(dir).run()?;
        self.git()
            .args(["remote", "add", "origin"])
            .arg(self.repo_url(repo))
            .current_dir(dir)
            .run()?;
        self.git()
            .args(["config", "core.sparseCheckout", "true"])
            .current_dir(dir)
            .run()?;
        write_sparse_pattern(dir, path)?;

        self.git()
            .args(["fetch", "-q", "--depth", "1", "origin", git_ref])
            .current_dir(dir)
            .run()?;

        // A SHA is checked out by name; a branch or tag through FETCH_HEAD
        let target = if is_commit_sha(git_ref) {
            git_ref
        } else {
            "FETCH_HEAD"
        };
        self.git()
            .args(["checkout", "-q", target])
            .current_dir(dir)
            .run()?;

        let file = dir.join(path);
        fs::read(&file).map_err(|e| WfrefError::InvalidContent {
            path: path.to_string(),
            details: format!("not present at {}: {}", git_ref, e),
        })
    }
}

impl Default for GitRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteRepository for GitRemote {
    fn name(&self) -> &str {
        "git"
    }

    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        match self.fetch_via_archive(repo, path, git_ref) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!(repo, path, git_ref, error = %e, "git archive failed, using sparse checkout");
                self.fetch_via_sparse_checkout(repo, path, git_ref)
            }
        }
    }

    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let wanted = format!("refs/heads/{}", branch);
        let output = self.ls_remote(&["--heads", &self.repo_url(repo), &wanted])?;
        output
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .find(|(_, name)| *name == wanted)
            .map(|(sha, _)| sha.to_string())
            .ok_or_else(|| WfrefError::BranchNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })
    }

    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        let output = self.ls_remote(&["--symref", &self.repo_url(repo), "HEAD"])?;
        let (branch, sha) = parse_symref_head(&output).ok_or_else(|| WfrefError::DefaultBranchUnknown {
            repo: repo.to_string(),
        })?;
        debug!(repo, branch = %branch, "default branch");

        let sha = match sha {
            Some(sha) => sha,
            None => self.resolve_branch_head(repo, &branch)?,
        };
        Ok(BranchHead { branch, sha })
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        let output = self.ls_remote(&["--tags", &self.repo_url(repo)])?;
        Ok(parse_tag_list(&output))
    }
}

/// Only `path` is materialized on checkout
fn write_sparse_pattern(dir: &Path, path: &str) -> Result<()> {
    let info = dir.join(".git").join("info");
    fs::create_dir_all(&info).map_err(|e| WfrefError::io(&info, e))?;
    let file = info.join("sparse-checkout");
    fs::write(&file, format!("/{}\n", path.trim_start_matches('/'))).map_err(|e| WfrefError::io(&file, e))
}

/// Tag names from `git ls-remote --tags`, peeled duplicates removed
pub fn parse_tag_list(output: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some((_, name)) = line.split_once('\t') else {
            continue;
        };
        let Some(tag) = name.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        let tag = tag.strip_suffix(PEELED_SUFFIX).unwrap_or(tag);
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Default branch (and its SHA when listed) from `git ls-remote --symref <url> HEAD`
///
/// ```text
/// ref: refs/heads/main	HEAD
/// 3f1c...	HEAD
/// ```
pub fn parse_symref_head(output: &str) -> Option<(String, Option<String>)> {
    let mut branch = None;
    let mut sha = None;
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("ref: ") {
            let (target, name) = rest.split_once('\t')?;
            if name.trim() == "HEAD" {
                branch = target.strip_prefix("refs/heads/").map(String::from);
            }
        } else if let Some((hash, name)) = line.split_once('\t') {
            if name.trim() == "HEAD" {
                sha = Some(hash.trim().to_string());
            }
        }
    }
    branch.map(|b| (b, sha))
}
