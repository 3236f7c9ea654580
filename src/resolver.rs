//! Version Resolution
//!
//! Turns what a user wrote after `@` (or nothing at all) into a concrete
//! git ref the remote can serve: a release tag, or a commit SHA for branch
//! heads.
//!
//! Release selection only ever looks at tags that parse as
//! [`SemanticVersion`]; pre-release tags are never chosen automatically.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Result, WfrefError};
use crate::remote::{BranchHead, RemoteRepository};
use crate::semver::SemanticVersion;
use crate::spec::RepoSpec;

const COMMIT_SHA_LEN: usize = 40;

/// Exactly 40 hex characters, either case
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == COMMIT_SHA_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Pick the release to move to from `current_ref`.
///
/// If `current_ref` is not a version there is nothing to be compatible
/// with; the first listed tag is returned as-is.
pub fn select_latest_release(repo: &str, tags: &[String], current_ref: &str, allow_major: bool) -> Result<String> {
    if tags.is_empty() {
        return Err(WfrefError::NoReleasesFound {
            repo: repo.to_string(),
        });
    }

    let Some(current) = SemanticVersion::parse(current_ref) else {
        debug!(repo, current_ref, "current ref is not a version, taking first tag");
        return Ok(tags[0].clone());
    };

    tags.iter()
        .filter_map(|tag| SemanticVersion::parse(tag).map(|v| (v, tag)))
        .filter(|(v, _)| allow_major || v.is_compatible_with(&current))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.clone())
        .ok_or_else(|| WfrefError::NoCompatibleRelease {
            repo: repo.to_string(),
            current: current_ref.to_string(),
        })
}

/// How a [`ResolvedRef`] was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// The user pinned a full commit SHA
    Commit,
    /// Latest release compatible with the requested version
    Release,
    /// Head of a named branch
    Branch,
    /// Head of the default branch (nothing was requested)
    DefaultBranch,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefKind::Commit => "commit",
            RefKind::Release => "release",
            RefKind::Branch => "branch",
            RefKind::DefaultBranch => "default-branch",
        };
        f.write_str(s)
    }
}

/// A concrete ref ready to hand to [`RemoteRepository::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub kind: RefKind,
    pub git_ref: String,
}

/// Resolves version hints against a remote
pub struct VersionResolver<'a> {
    remote: &'a dyn RemoteRepository,
}

impl<'a> VersionResolver<'a> {
    pub fn new(remote: &'a dyn RemoteRepository) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &'a dyn RemoteRepository {
        self.remote
    }

    pub fn resolve_latest_release(&self, repo: &str, current_ref: &str, allow_major: bool) -> Result<String> {
        let tags = self.remote.list_tags(repo)?;
        debug!(repo, count = tags.len(), "listed release tags");
        let tag = select_latest_release(repo, &tags, current_ref, allow_major)?;
        info!(repo, current_ref, tag = %tag, "resolved release");
        Ok(tag)
    }

    pub fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let sha = self.remote.resolve_branch_head(repo, branch)?;
        info!(repo, branch, sha = %sha, "resolved branch head");
        Ok(sha)
    }

    pub fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        let head = self.remote.resolve_default_branch_head(repo)?;
        info!(repo, branch = %head.branch, sha = %head.sha, "resolved default branch head");
        Ok(head)
    }

    /// Resolve the version carried by `spec`:
    ///
    /// | version | result |
    /// |---------|--------|
    /// | empty | default branch head SHA |
    /// | 40-hex | that commit |
    /// | `vX.Y.Z` | latest compatible release |
    /// | anything else | branch head SHA |
    pub fn resolve(&self, spec: &RepoSpec, allow_major: bool) -> Result<ResolvedRef> {
        let repo = spec.repo_slug();
        let version = spec.version();

        if version.is_empty() {
            let head = self.resolve_default_branch_head(repo)?;
            return Ok(ResolvedRef {
                kind: RefKind::DefaultBranch,
                git_ref: head.sha,
            });
        }
        if is_commit_sha(version) {
            return Ok(ResolvedRef {
                kind: RefKind::Commit,
                git_ref: version.to_string(),
            });
        }
        if SemanticVersion::parse(version).is_some() {
            return Ok(ResolvedRef {
                kind: RefKind::Release,
                git_ref: self.resolve_latest_release(repo, version, allow_major)?,
            });
        }
        Ok(ResolvedRef {
            kind: RefKind::Branch,
            git_ref: self.resolve_branch_head(repo, version)?,
        })
    }
}
