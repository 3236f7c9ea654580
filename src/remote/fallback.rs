//! Fallback decorator: primary remote, secondary on auth failure

use tracing::warn;

use super::{BranchHead, RemoteRepository};
use crate::error::Result;

/// Tries `primary`; retries on `secondary` only when the primary's error is
/// an authentication failure. Every other error is returned as-is.
pub struct FallbackRemote<P, S> {
    primary: P,
    secondary: S,
}

impl<P: RemoteRepository, S: RemoteRepository> FallbackRemote<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    fn run<T>(
        &self,
        operation: &str,
        repo: &str,
        primary: impl FnOnce(&P) -> Result<T>,
        secondary: impl FnOnce(&S) -> Result<T>,
    ) -> Result<T> {
        match primary(&self.primary) {
            Err(e) if e.is_auth_failure() => {
                warn!(
                    operation,
                    repo,
                    from = self.primary.name(),
                    to = self.secondary.name(),
                    error = %e,
                    "authentication failed, falling back"
                );
                secondary(&self.secondary)
            }
            other => other,
        }
    }
}

impl<P: RemoteRepository, S: RemoteRepository> RemoteRepository for FallbackRemote<P, S> {
    fn name(&self) -> &str {
        "fallback"
    }

    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        self.run(
            "fetch",
            repo,
            |p| p.fetch(repo, path, git_ref),
            |s| s.fetch(repo, path, git_ref),
        )
    }

    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        self.run(
            "resolve_branch_head",
            repo,
            |p| p.resolve_branch_head(repo, branch),
            |s| s.resolve_branch_head(repo, branch),
        )
    }

    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        self.run(
            "resolve_default_branch_head",
            repo,
            |p| p.resolve_default_branch_head(repo),
            |s| s.resolve_default_branch_head(repo),
        )
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        self.run(
            "list_tags",
            repo,
            |p| p.list_tags(repo),
            |s| s.list_tags(repo),
        )
    }
}
