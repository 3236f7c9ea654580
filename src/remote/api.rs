//! GitHub REST API access through the `gh` CLI
//!
//! `gh api` carries the user's credentials, so this crate never touches a
//! token. Errors keep `gh`'s own message, including its `(HTTP nnn)` suffix,
//! which the fallback classifier reads.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{BranchHead, RemoteRepository};
use crate::config::WfrefConfig;
use crate::error::{Result, WfrefError};
use crate::process::{ProcessCommand, ProcessOutput};

/// Placeholder base for building percent-encoded endpoint paths
static ENDPOINT_BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://api.github.invalid/").unwrap());

const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Contents API accepts this to return the file body as-is
const RAW_MEDIA_TYPE: &str = "Accept: application/vnd.github.raw";

/// Subset of the contents API response for a file
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// GitHub API remote backed by `gh api`
pub struct GhApiRemote {
    gh: String,
    timeout: Duration,
}

impl GhApiRemote {
    pub fn new() -> Self {
        Self {
            gh: "gh".to_string(),
            timeout: DEFAULT_API_TIMEOUT,
        }
    }

    pub fn from_config(config: &WfrefConfig) -> Self {
        Self {
            gh: config.tools.gh.clone(),
            timeout: config.timeouts.api(),
        }
    }

    /// Set a custom gh binary
    pub fn with_cli_path(mut self, gh: impl Into<String>) -> Self {
        self.gh = gh.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api(&self, endpoint: &str, extra: &[&str]) -> Result<ProcessOutput> {
        ProcessCommand::new(&self.gh, self.timeout)
            .arg("api")
            .args(extra.iter().copied())
            .arg(endpoint)
            .run()
    }

    /// `gh api <endpoint> --jq <filter>`, returning trimmed text
    fn api_jq(&self, endpoint: &str, filter: &str) -> Result<String> {
        Ok(self.api(endpoint, &["--jq", filter])?.stdout_text())
    }

    fn unexpected(&self, endpoint: &str, details: impl Into<String>) -> WfrefError {
        WfrefError::UnexpectedResponse {
            command: format!("{} api {}", self.gh, endpoint),
            details: details.into(),
        }
    }
}

impl Default for GhApiRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteRepository for GhApiRemote {
    fn name(&self) -> &str {
        "api"
    }

    fn fetch(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let endpoint = contents_endpoint(repo, path, git_ref);
        let output = self.api(&endpoint, &[])?;

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        if value.is_array() {
            return Err(WfrefError::InvalidContent {
                path: path.to_string(),
                details: "path is a directory".to_string(),
            });
        }
        let response: ContentsResponse = serde_json::from_value(value)?;
        if response.kind != "file" {
            return Err(WfrefError::InvalidContent {
                path: path.to_string(),
                details: format!("expected a file, found {}", response.kind),
            });
        }

        match (response.encoding.as_deref(), response.content) {
            (Some("base64"), Some(content)) => decode_contents(path, &content),
            // Files over 1 MB come back with encoding "none"; ask for the raw body
            _ => {
                debug!(repo, path, "contents not inlined, requesting raw media type");
                Ok(self.api(&endpoint, &["-H", RAW_MEDIA_TYPE])?.stdout)
            }
        }
    }

    fn resolve_branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let endpoint = endpoint(&["repos", repo, "branches"], &[branch], None);
        let sha = self.api_jq(&endpoint, ".commit.sha")?;
        if sha.is_empty() {
            return Err(self.unexpected(&endpoint, "missing commit.sha"));
        }
        Ok(sha)
    }

    fn resolve_default_branch_head(&self, repo: &str) -> Result<BranchHead> {
        let endpoint = endpoint(&["repos", repo], &[], None);
        let branch = self.api_jq(&endpoint, ".default_branch")?;
        if branch.is_empty() {
            return Err(WfrefError::DefaultBranchUnknown {
                repo: repo.to_string(),
            });
        }
        let sha = self.resolve_branch_head(repo, &branch)?;
        Ok(BranchHead { branch, sha })
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        let endpoint = endpoint(&["repos", repo, "releases"], &[], None);
        let output = self.api(&endpoint, &["--paginate", "--jq", ".[].tag_name"])?;
        Ok(output
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// `repos/{repo}/contents/{path}?ref={ref}`
fn contents_endpoint(repo: &str, path: &str, git_ref: &str) -> String {
    endpoint(&["repos", repo, "contents", path], &[], Some(("ref", git_ref)))
}

/// Build an endpoint path for `gh api`.
///
/// `slash_segments` may contain `/` separators (slugs, file paths);
/// `opaque_segments` are encoded whole, so a branch named `feature/x`
/// stays one segment.
fn endpoint(slash_segments: &[&str], opaque_segments: &[&str], query: Option<(&str, &str)>) -> String {
    let mut url = ENDPOINT_BASE.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear();
        for part in slash_segments {
            segments.extend(part.split('/').filter(|s| !s.is_empty()));
        }
        segments.extend(opaque_segments.iter().copied());
    }
    if let Some((key, value)) = query {
        url.query_pairs_mut().append_pair(key, value);
    }

    let path = url.path().trim_start_matches('/');
    match url.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    }
}

/// Contents API base64 is wrapped at 60 columns
fn decode_contents(path: &str, content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| WfrefError::InvalidContent {
            path: path.to_string(),
            details: format!("base64 decode failed: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_endpoint_encodes_ref() {
        assert_eq!(
            contents_endpoint("octo/tools", "workflows/triage.md", "main"),
            "repos/octo/tools/contents/workflows/triage.md?ref=main"
        );
        assert_eq!(
            contents_endpoint("octo/tools", "a b/x.md", "feature/x"),
            "repos/octo/tools/contents/a%20b/x.md?ref=feature%2Fx"
        );
    }

    #[test]
    fn branch_names_stay_one_segment() {
        assert_eq!(
            endpoint(&["repos", "octo/tools", "branches"], &["release/v1"], None),
            "repos/octo/tools/branches/release%2Fv1"
        );
    }

    #[test]
    fn decode_wrapped_base64() {
        let encoded = "IyBUcmlh\nZ2UKCkhl\nbGxvLgo=\n";
        assert_eq!(decode_contents("x.md", encoded).unwrap(), b"# Triage\n\nHello.\n");
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_contents("x.md", "!!!not base64!!!").unwrap_err();
        assert!(matches!(err, WfrefError::InvalidContent { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn fetch_decodes_gh_response() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in gh that prints a contents API payload
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("gh");
        std::fs::write(
            &fake,
            "#!/bin/sh\necho '{\"type\":\"file\",\"encoding\":\"base64\",\"content\":\"aGVsbG8=\"}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let remote = GhApiRemote::new().with_cli_path(fake.to_string_lossy());
        assert_eq!(remote.fetch("o/r", "x.md", "main").unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn gh_errors_keep_http_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("gh");
        std::fs::write(&fake, "#!/bin/sh\necho 'gh: Bad credentials (HTTP 401)' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let remote = GhApiRemote::new().with_cli_path(fake.to_string_lossy());
        let err = remote.list_tags("o/r").unwrap_err();
        assert!(err.is_auth_failure());
    }
}
