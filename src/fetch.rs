//! Workflow content retrieval

use std::fs;

use tracing::{debug, info};

use crate::error::{Result, WfrefError};
use crate::remote::RemoteRepository;
use crate::resolver::VersionResolver;
use crate::spec::WorkflowSpec;

/// Bytes of a workflow file plus the ref they were read at.
///
/// `git_ref` is empty for local files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    bytes: Vec<u8>,
    git_ref: String,
}

impl ResolvedContent {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub struct ContentFetcher<'a> {
    remote: &'a dyn RemoteRepository,
}

impl<'a> ContentFetcher<'a> {
    pub fn new(remote: &'a dyn RemoteRepository) -> Self {
        Self { remote }
    }

    /// Fetch `path` at exactly `git_ref`. No resolution happens here.
    pub fn download_workflow_content(&self, repo: &str, path: &str, git_ref: &str) -> Result<ResolvedContent> {
        debug!(repo, path, git_ref, remote = self.remote.name(), "downloading workflow");
        let bytes = self.remote.fetch(repo, path, git_ref)?;
        info!(repo, path, git_ref, size = bytes.len(), "downloaded workflow");
        Ok(ResolvedContent {
            bytes,
            git_ref: git_ref.to_string(),
        })
    }

    /// Fetch the file a spec names.
    ///
    /// Local specs are read from disk relative to the working directory.
    /// Remote specs go through `resolver` first, so `@v1.0.0` becomes the
    /// latest compatible release and an unpinned spec the default branch
    /// head.
    pub fn fetch_workflow(
        &self,
        spec: &WorkflowSpec,
        resolver: &VersionResolver<'_>,
        allow_major: bool,
    ) -> Result<ResolvedContent> {
        if spec.is_local() {
            let path = spec.workflow_path();
            let bytes = fs::read(path).map_err(|e| WfrefError::io(path, e))?;
            return Ok(ResolvedContent {
                bytes,
                git_ref: String::new(),
            });
        }

        let resolved = resolver.resolve(spec.repo(), allow_major)?;
        debug!(spec = %spec, kind = %resolved.kind, git_ref = %resolved.git_ref, "resolved spec");
        self.download_workflow_content(spec.repo_slug(), spec.workflow_path(), &resolved.git_ref)
    }
}
