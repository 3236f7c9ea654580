//! Error types with fix suggestions
//!
//! Error code ranges:
//! - WFREF-001-019: Spec parsing errors
//! - WFREF-020-029: Version resolution errors
//! - WFREF-030-039: Remote access errors (gh, git, tar)
//! - WFREF-040-049: Import collection errors
//! - WFREF-090-099: Config/IO errors

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WfrefError>;

/// Format a process exit code for display (signals have no code)
fn format_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum WfrefError {
    // ─────────────────────────────────────────────────────────────
    // Spec parsing (WFREF-001 to WFREF-019)
    // ─────────────────────────────────────────────────────────────
    #[error("WFREF-001: Invalid spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("WFREF-002: '{slug}' does not look like a valid GitHub repository")]
    InvalidRepository { slug: String },

    #[error("WFREF-003: URL '{url}' must be from github.com")]
    NotGitHubUrl { url: String },

    #[error("WFREF-004: URL '{url}' has type '/{kind}/', expected /blob/, /tree/, or /raw/")]
    UnsupportedUrlType { url: String, kind: String },

    #[error("WFREF-005: URL '{url}' path too short: expected <ref>/<path> after /{kind}/")]
    UrlPathTooShort { url: String, kind: String },

    #[error("WFREF-006: Workflow path '{path}' must end with '.md' extension")]
    MissingMdExtension { path: String },

    #[error("WFREF-007: Version after '@' is empty in '{spec}'")]
    EmptyVersion { spec: String },

    #[error("WFREF-008: '{spec}' names a repository, not a workflow file")]
    NotAWorkflow { spec: String },

    // ─────────────────────────────────────────────────────────────
    // Version resolution (WFREF-020 to WFREF-029)
    // ─────────────────────────────────────────────────────────────
    #[error("WFREF-020: No releases found for {repo}")]
    NoReleasesFound { repo: String },

    #[error("WFREF-021: No compatible release found for {repo} (current: {current})")]
    NoCompatibleRelease { repo: String, current: String },

    #[error("WFREF-022: Branch '{branch}' not found in {repo}")]
    BranchNotFound { repo: String, branch: String },

    #[error("WFREF-023: Could not determine default branch of {repo}")]
    DefaultBranchUnknown { repo: String },

    // ─────────────────────────────────────────────────────────────
    // Remote access (WFREF-030 to WFREF-039)
    // ─────────────────────────────────────────────────────────────
    #[error("WFREF-030: Failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WFREF-031: `{command}` failed ({}):\n{output}", format_exit_code(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("WFREF-032: `{command}` timed out after {timeout_secs}s")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error("WFREF-033: Invalid content for {path}: {details}")]
    InvalidContent { path: String, details: String },

    #[error("WFREF-034: Unexpected response from `{command}`: {details}")]
    UnexpectedResponse { command: String, details: String },

    #[error("WFREF-035: Could not determine current repository: {reason}")]
    CurrentRepositoryUnknown { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Import collection (WFREF-040 to WFREF-049)
    // ─────────────────────────────────────────────────────────────
    #[error("WFREF-040: Invalid frontmatter in {path}: {details}")]
    FrontmatterParse { path: String, details: String },

    #[error("WFREF-041: Failed to compile {path}: {details}")]
    CompileFailed { path: String, details: String },

    #[error("WFREF-042: Compiler did not produce lock file {path}")]
    LockFileMissing { path: String },

    #[error("WFREF-043: Operation cancelled")]
    Cancelled,

    // ─────────────────────────────────────────────────────────────
    // Config/IO (WFREF-090 to WFREF-099)
    // ─────────────────────────────────────────────────────────────
    #[error("WFREF-090: Config error: {reason}")]
    Config { reason: String },

    #[error("WFREF-091: IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WFREF-092: YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("WFREF-093: JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Phrases `gh` and `git` print when credentials are missing or rejected
const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "authentication required",
    "bad credentials",
    "requires authentication",
    "gh auth login",
    "gh_token",
    "github_token",
    "not logged into",
    "could not read username",
    "terminal prompts disabled",
    "saml enforcement",
    "resource not accessible by integration",
];

static HTTP_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(HTTP (\d{3})\)").unwrap());

impl WfrefError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        WfrefError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn invalid_spec(spec: &str, reason: impl Into<String>) -> Self {
        WfrefError::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this failure looks like a missing or rejected credential.
    ///
    /// Only these failures send a remote operation down the git fallback.
    /// `gh` reports the HTTP status as `(HTTP nnn)`; when present it decides
    /// (401 and 403 are auth, anything else is not). Otherwise the captured
    /// output is matched against known auth phrases.
    pub fn is_auth_failure(&self) -> bool {
        let output = match self {
            WfrefError::CommandFailed { output, .. } => output,
            _ => return false,
        };

        if let Some(caps) = HTTP_STATUS.captures(output) {
            return matches!(&caps[1], "401" | "403");
        }

        let lower = output.to_lowercase();
        AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
    }

    /// Whether this is a spec grammar violation
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            WfrefError::InvalidSpec { .. }
                | WfrefError::InvalidRepository { .. }
                | WfrefError::NotGitHubUrl { .. }
                | WfrefError::UnsupportedUrlType { .. }
                | WfrefError::UrlPathTooShort { .. }
                | WfrefError::MissingMdExtension { .. }
                | WfrefError::EmptyVersion { .. }
                | WfrefError::NotAWorkflow { .. }
        )
    }
}

impl FixSuggestion for WfrefError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WfrefError::InvalidSpec { .. } => {
                Some("Use owner/repo/workflow[@ref], owner/repo/path/to/file.md[@ref], or ./local.md")
            }
            WfrefError::InvalidRepository { .. } => {
                Some("Owner and repository names cannot be empty or start/end with '-'")
            }
            WfrefError::NotGitHubUrl { .. } => Some("Only https://github.com/... URLs are supported"),
            WfrefError::UnsupportedUrlType { .. } => {
                Some("Copy the URL from the file view: https://github.com/owner/repo/blob/<ref>/<path>.md")
            }
            WfrefError::UrlPathTooShort { .. } => Some("Include both the ref and the file path in the URL"),
            WfrefError::MissingMdExtension { .. } => Some("Point at the workflow's .md source file"),
            WfrefError::EmptyVersion { .. } => Some("Remove the trailing '@' or add a tag, branch or SHA"),
            WfrefError::NotAWorkflow { .. } => Some("Append the workflow name: owner/repo/<workflow>"),
            WfrefError::NoReleasesFound { .. } => Some("Pin a branch or commit SHA with @<ref>"),
            WfrefError::NoCompatibleRelease { .. } => {
                Some("Allow major version upgrades or pin the version explicitly")
            }
            WfrefError::BranchNotFound { .. } => Some("Check the branch name with `git ls-remote --heads`"),
            WfrefError::DefaultBranchUnknown { .. } => Some("Pin an explicit ref with @<ref>"),
            WfrefError::CommandSpawn { .. } => Some("Ensure git and gh are installed and on PATH"),
            WfrefError::CommandFailed { .. } => Some("Run `gh auth status` and check repository access"),
            WfrefError::CommandTimeout { .. } => Some("Raise the timeout in config.toml or check connectivity"),
            WfrefError::InvalidContent { .. } => Some("Verify the path points at a file, not a directory"),
            WfrefError::UnexpectedResponse { .. } => Some("Upgrade gh and git to a recent version"),
            WfrefError::CurrentRepositoryUnknown { .. } => {
                Some("Run inside a git repository with an 'origin' remote on GitHub")
            }
            WfrefError::FrontmatterParse { .. } => Some("Check YAML syntax between the --- fences"),
            WfrefError::CompileFailed { .. } => Some("Run the compiler manually to see the full error"),
            WfrefError::LockFileMissing { .. } => Some("Check compiler.command in config.toml"),
            WfrefError::Cancelled => None,
            WfrefError::Config { .. } => Some("Fix or remove the config file"),
            WfrefError::Io { .. } => Some("Check file path and permissions"),
            WfrefError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            WfrefError::Json(_) => Some("Upgrade gh to a recent version"),
        }
    }
}
