//! Mock remote for testing
//!
//! Serves scripted files, branches and tags without touching the network.
//! Unknown lookups fail the way `gh` does for a missing resource.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{BranchHead, RemoteRepository};
use crate::error::{Result, WfrefError};

/// Remote that answers from in-memory tables
#[derive(Default)]
pub struct MockRemote {
    files: HashMap<(String, String, String), Vec<u8>>,
    branches: HashMap<(String, String), String>,
    default_branches: HashMap<String, String>,
    tags: HashMap<String, Vec<String>>,
    /// When set, every call fails with this output
    failure: Option<String>,
    /// Track all calls made (for assertions)
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, repo: &str, path: &str, git_ref: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(
            (repo.to_string(), path.to_string(), git_ref.to_string()),
            content.into(),
        );
        self
    }

    pub fn with_branch(mut self, repo: &str, branch: &str, sha: &str) -> Self {
        self.branches
            .insert((repo.to_string(), branch.to_string()), sha.to_string());
        self
    }

    /// Mark `branch` as the default; it should also be added with [`with_branch`](Self::with_branch)
    pub fn with_default_branch(mut self, repo: &str, branch: &str) -> Self {
        self.default_branches.insert(repo.to_string(), branch.to_string());
        self
    }

    pub fn with_tags(mut self, repo: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(repo.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Fail every call as a process that printed `output`
    pub fn failing_with(mut self, output: impl Into<String>) -> Self {
        self.failure = Some(output.into());
        self
    }

    /// Get all calls made to this remote
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        match self.failure {
            Some(ref output) => Err(WfrefError::CommandFailed {
                command: format!("mock {}", call),
                exit_code: Some(1),
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(call: &str) -> WfrefError {
        WfrefError::CommandFailed {
            command: format!("mock {}", call),
            exit_code: Some(1),
            output: "gh: Not Found (HTTP 404)".to_string(),
        }
    }
}

impl RemoteRepository for MockRemote {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let call = format!("fetch {} {} {}", repo, path, git_ref);
        self.record(call.clone())?;
        self.files
            .get(&(repo.to_string(), path.to_string(), git_ref.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found(&call))
    }

    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        self.record(format!("branch {} {}", repo, branch))?;
        self.branches
            .get(&(repo.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| WfrefError::BranchNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })
    }

    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        self.record(format!("default-branch {}", repo))?;
        let branch = self
            .default_branches
            .get(repo)
            .cloned()
            .ok_or_else(|| WfrefError::DefaultBranchUnknown {
                repo: repo.to_string(),
            })?;
        let sha = self
            .branches
            .get(&(repo.to_string(), branch.clone()))
            .cloned()
            .ok_or_else(|| WfrefError::BranchNotFound {
                repo: repo.to_string(),
                branch: branch.clone(),
            })?;
        Ok(BranchHead { branch, sha })
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        self.record(format!("tags {}", repo))?;
        Ok(self.tags.get(repo).cloned().unwrap_or_default())
    }
}
