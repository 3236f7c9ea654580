//! # Remote Repository Access
//!
//! Everything this crate needs from GitHub goes through [`RemoteRepository`]:
//!
//! - [`GhApiRemote`] - GitHub REST API via `gh api` (auth handled by `gh`)
//! - [`GitRemote`] - plain git plumbing (`ls-remote`, `archive`, sparse clone)
//! - [`FallbackRemote`] - tries one, falls back to the other on auth failures
//! - [`MockRemote`] - scripted responses for tests
//!
//! ## Fallback Policy
//!
//! Only failures classified by [`WfrefError::is_auth_failure`] reach the
//! secondary. A 404 from the API is an answer, not a reason to retry.
//!
//! ```rust
//! use wfref::remote::{FallbackRemote, MockRemote, RemoteRepository};
//!
//! let api = MockRemote::new().failing_with("gh: Bad credentials (HTTP 401)");
//! let git = MockRemote::new().with_file("octo/tools", "workflows/a.md", "v1", "# A");
//! let remote = FallbackRemote::new(api, git);
//!
//! let bytes = remote.fetch("octo/tools", "workflows/a.md", "v1").unwrap();
//! assert_eq!(bytes, b"# A");
//! ```
//!
//! [`WfrefError::is_auth_failure`]: crate::error::WfrefError::is_auth_failure

mod api;
mod fallback;
mod git;
mod mock;

pub use api::GhApiRemote;
pub use fallback::FallbackRemote;
pub use git::{parse_symref_head, parse_tag_list, GitRemote};
pub use mock::MockRemote;

use crate::config::WfrefConfig;
use crate::error::Result;

/// Head commit of a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub branch: String,
    pub sha: String,
}

/// Read-only access to a GitHub repository
pub trait RemoteRepository: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Raw bytes of `path` at `git_ref` (tag, branch or commit SHA)
    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>>;

    /// Commit SHA at the head of `branch`
    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String>;

    /// Name and head commit SHA of the default branch
    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead>;

    /// Release tag names, in the order the remote lists them
    fn list_tags(&self, repo: &str) -> Result<Vec<String>>;
}

impl<T: RemoteRepository + ?Sized> RemoteRepository for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        (**self).fetch(repo, path, git_ref)
    }

    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        (**self).resolve_branch_head(repo, branch)
    }

    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        (**self).resolve_default_branch_head(repo)
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        (**self).list_tags(repo)
    }
}

/// API first, git plumbing when the API rejects our credentials
pub fn default_remote(config: &WfrefConfig) -> FallbackRemote<GhApiRemote, GitRemote> {
    FallbackRemote::new(GhApiRemote::from_config(config), GitRemote::from_config(config))
}
