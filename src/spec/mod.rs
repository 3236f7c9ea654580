//! # Workflow Spec Parsing
//!
//! Turns a human-typed reference into a typed [`RepoSpec`] or [`WorkflowSpec`].
//!
//! ## Accepted forms (priority order)
//!
//! ```text
//! https://github.com/<owner>/<repo>[@<ref>]
//! https://github.com/<owner>/<repo>/{blob|tree|raw}/<ref>/<path>.md
//! <owner>/<repo>/files/<ref>/<path>
//! <owner>/<repo>@<ref>
//! <owner>/<repo>
//! <owner>/<repo>/<name>[@<ref>]                       (→ workflows/<name>.md)
//! <owner>/<repo>/<path...>.md[@<ref>]
//! ./<path>.md                                          (local; version forced empty)
//! ```
//!
//! Workflow specs are matched by an ordered list of matchers. Each one either
//! claims the input (returning a spec or the error for that form) or passes.
//!
//! ```rust
//! use wfref::spec::parse_workflow_spec;
//!
//! let spec = parse_workflow_spec("octo/tools/triage@v1.0.0").unwrap();
//! assert_eq!(spec.workflow_path(), "workflows/triage.md");
//! assert_eq!(spec.to_string(), "octo/tools/workflows/triage.md@v1.0.0");
//! ```

mod github_url;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{Result, WfrefError};
use crate::repo_context::{current_repository, CurrentRepository};
use github_url::{parse_github_url, GitHubUrl, MIN_PATH_SEGMENTS};

/// GitHub user/org names: alphanumerics, `_` and inner hyphens
static OWNER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_](?:[A-Za-z0-9_-]*[A-Za-z0-9_])?$").unwrap());

/// Repository names additionally allow dots
static REPO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._](?:[A-Za-z0-9._-]*[A-Za-z0-9._])?$").unwrap());

const LOCAL_PREFIX: &str = "./";
const MD_EXTENSION: &str = ".md";

// ============================================================================
// TYPES
// ============================================================================

/// A repository at an optional version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    repo_slug: String,
    version: String,
}

impl RepoSpec {
    pub(crate) fn new(repo_slug: String, version: String) -> Self {
        Self { repo_slug, version }
    }

    /// `owner/repo`
    pub fn repo_slug(&self) -> &str {
        &self.repo_slug
    }

    /// Tag, branch or SHA; empty when unpinned
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn owner(&self) -> &str {
        self.repo_slug.split_once('/').map(|(o, _)| o).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.repo_slug.split_once('/').map(|(_, r)| r).unwrap_or_default()
    }

    pub fn is_pinned(&self) -> bool {
        !self.version.is_empty()
    }

    /// Same repository at another version
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self::new(self.repo_slug.clone(), version.into())
    }
}

impl fmt::Display for RepoSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repo_slug)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}

/// A workflow file inside a repository (or the current checkout)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowSpec {
    repo: RepoSpec,
    workflow_path: String,
    workflow_name: String,
}

impl WorkflowSpec {
    /// Remote workflow at `path` (must end in `.md`)
    pub(crate) fn remote(repo: RepoSpec, path: String) -> Result<Self> {
        if path.split('/').any(str::is_empty) {
            return Err(WfrefError::invalid_spec(&path, "path has an empty segment"));
        }
        Self::build(repo, path)
    }

    fn build(repo: RepoSpec, path: String) -> Result<Self> {
        let file_name = path.rsplit('/').next().unwrap_or_default();
        let workflow_name = match file_name.strip_suffix(MD_EXTENSION) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(WfrefError::MissingMdExtension { path }),
        };
        Ok(Self {
            repo,
            workflow_path: path,
            workflow_name,
        })
    }

    pub fn repo(&self) -> &RepoSpec {
        &self.repo
    }

    pub fn repo_slug(&self) -> &str {
        self.repo.repo_slug()
    }

    pub fn version(&self) -> &str {
        self.repo.version()
    }

    /// Path inside the repository; local specs keep their `./` prefix
    pub fn workflow_path(&self) -> &str {
        &self.workflow_path
    }

    /// File name without `.md`
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn is_local(&self) -> bool {
        self.workflow_path.starts_with(LOCAL_PREFIX)
    }

    /// Same workflow at another version. Local specs stay unversioned.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        let version = if self.is_local() {
            String::new()
        } else {
            version.into()
        };
        Self {
            repo: self.repo.with_version(version),
            workflow_path: self.workflow_path.clone(),
            workflow_name: self.workflow_name.clone(),
        }
    }

    /// Path as written into `owner/repo/<path>`, without the local `./`
    fn rendered_path(&self) -> &str {
        self.workflow_path
            .strip_prefix(LOCAL_PREFIX)
            .unwrap_or(&self.workflow_path)
    }

    /// Fetchable `owner/repo/path[@ref]` for a `source:` field.
    ///
    /// Local specs render against the current repository; `None` when that
    /// repository is unknown.
    pub fn build_source_string(&self) -> Option<String> {
        if self.repo_slug().is_empty() {
            return None;
        }
        Some(self.to_string())
    }

    /// Like [`build_source_string`](Self::build_source_string) but pinned to `sha`
    pub fn build_source_string_with_commit_sha(&self, sha: &str) -> Option<String> {
        if self.repo_slug().is_empty() {
            return None;
        }
        Some(format!("{}/{}@{}", self.repo_slug(), self.rendered_path(), sha))
    }
}

impl fmt::Display for WorkflowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo_slug(), self.rendered_path())?;
        if !self.version().is_empty() {
            write!(f, "@{}", self.version())?;
        }
        Ok(())
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse `owner/repo[@ref]` or a repository URL
pub fn parse_repo_spec(input: &str) -> Result<RepoSpec> {
    let input = input.trim();

    if let Some(parsed) = parse_github_url(input) {
        return match parsed? {
            GitHubUrl::Repository(spec) => Ok(spec),
            GitHubUrl::File(_) => Err(WfrefError::invalid_spec(
                input,
                "expected a repository URL, got a file URL",
            )),
        };
    }

    if input.starts_with(LOCAL_PREFIX) {
        return Err(WfrefError::invalid_spec(input, "local paths do not name a repository"));
    }

    let (base, version) = split_version(input, input)?;
    match base.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] => Ok(RepoSpec::new(validate_slug(owner, repo)?, version)),
        _ => Err(WfrefError::invalid_spec(input, "expected owner/repo[@ref]")),
    }
}

/// Parse any workflow reference, resolving local specs against the
/// repository of the process working directory
pub fn parse_workflow_spec(input: &str) -> Result<WorkflowSpec> {
    parse_workflow_spec_with(input, current_repository())
}

/// Parse any workflow reference with an explicit current-repository lookup
pub fn parse_workflow_spec_with(input: &str, current: &dyn CurrentRepository) -> Result<WorkflowSpec> {
    let input = input.trim();
    if input.is_empty() {
        return Err(WfrefError::invalid_spec(input, "empty spec"));
    }

    for matcher in WORKFLOW_MATCHERS {
        if let Some(result) = matcher(input, current) {
            return result;
        }
    }

    Err(WfrefError::invalid_spec(
        input,
        "expected owner/repo/workflow[@ref], owner/repo/path.md[@ref], a GitHub URL, or ./path.md",
    ))
}

/// Whether an import entry is a remote workflowspec rather than a local path.
///
/// The only signal is an `@` anywhere in the string, so a local file name
/// containing `@` is classified as remote.
pub fn is_workflow_spec_format(path: &str) -> bool {
    path.contains('@')
}

type Matcher = fn(&str, &dyn CurrentRepository) -> Option<Result<WorkflowSpec>>;

/// Evaluated top to bottom; the first matcher returning `Some` wins
const WORKFLOW_MATCHERS: &[Matcher] = &[
    match_github_url,
    match_local_path,
    match_files_shorthand,
    match_repository_only,
    match_workflow_shorthand,
    match_explicit_path,
];

fn match_github_url(input: &str, _: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    let parsed = parse_github_url(input)?;
    Some(parsed.and_then(|url| match url {
        GitHubUrl::File(spec) => Ok(spec),
        GitHubUrl::Repository(_) => Err(WfrefError::NotAWorkflow {
            spec: input.to_string(),
        }),
    }))
}

fn match_local_path(input: &str, current: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    if !input.starts_with(LOCAL_PREFIX) {
        return None;
    }

    let slug = match current.repo_slug() {
        Ok(slug) => slug,
        Err(e) => {
            warn!(spec = %input, error = %e, "local spec has no repository");
            String::new()
        }
    };
    Some(WorkflowSpec::build(RepoSpec::new(slug, String::new()), input.to_string()))
}

/// `owner/repo/files/<ref>/<path>`
fn match_files_shorthand(input: &str, _: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    if input.contains('@') {
        return None;
    }
    let parts: Vec<&str> = input.split('/').collect();
    if parts.len() < 5 || parts[2] != "files" {
        return None;
    }
    if parts.len() < 4 + MIN_PATH_SEGMENTS {
        return Some(Err(WfrefError::UrlPathTooShort {
            url: input.to_string(),
            kind: "files".to_string(),
        }));
    }
    Some(validate_slug(parts[0], parts[1]).and_then(|slug| {
        WorkflowSpec::remote(RepoSpec::new(slug, parts[3].to_string()), parts[4..].join("/"))
    }))
}

/// `owner/repo[@ref]` is a repository, not a workflow
fn match_repository_only(input: &str, _: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    let (base, _) = input.split_once('@').unwrap_or((input, ""));
    if base.split('/').count() != 2 {
        return None;
    }
    Some(split_version(input, input).and_then(|(base, _)| {
        let (owner, repo) = base.split_once('/').unwrap_or_default();
        validate_slug(owner, repo)?;
        Err(WfrefError::NotAWorkflow {
            spec: input.to_string(),
        })
    }))
}

/// `owner/repo/name[@ref]` → `workflows/name.md`
fn match_workflow_shorthand(input: &str, _: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    let (base, _) = input.split_once('@').unwrap_or((input, ""));
    if base.split('/').count() != 3 {
        return None;
    }
    Some(split_version(input, input).and_then(|(base, version)| {
        let parts: Vec<&str> = base.split('/').collect();
        let slug = validate_slug(parts[0], parts[1])?;
        let name = parts[2].strip_suffix(MD_EXTENSION).unwrap_or(parts[2]);
        if name.is_empty() {
            return Err(WfrefError::invalid_spec(input, "workflow name is empty"));
        }
        WorkflowSpec::remote(RepoSpec::new(slug, version), format!("workflows/{}.md", name))
    }))
}

/// `owner/repo/<path...>.md[@ref]`
fn match_explicit_path(input: &str, _: &dyn CurrentRepository) -> Option<Result<WorkflowSpec>> {
    let (base, _) = input.split_once('@').unwrap_or((input, ""));
    if base.split('/').count() < 4 {
        return None;
    }
    Some(split_version(input, input).and_then(|(base, version)| {
        let parts: Vec<&str> = base.split('/').collect();
        let slug = validate_slug(parts[0], parts[1])?;
        WorkflowSpec::remote(RepoSpec::new(slug, version), parts[2..].join("/"))
    }))
}

/// Split `s` at its first `@`; an `@` with nothing after it is an error
pub(crate) fn split_version<'a>(spec: &str, s: &'a str) -> Result<(&'a str, String)> {
    match s.split_once('@') {
        None => Ok((s, String::new())),
        Some((_, version)) if version.is_empty() => Err(WfrefError::EmptyVersion {
            spec: spec.to_string(),
        }),
        Some((base, version)) => Ok((base, version.to_string())),
    }
}

/// Validate owner and repo identifiers, returning `owner/repo`
pub(crate) fn validate_slug(owner: &str, repo: &str) -> Result<String> {
    let slug = format!("{}/{}", owner, repo);
    let repo_ok = REPO_RE.is_match(repo) && repo != "." && repo != "..";
    if !OWNER_RE.is_match(owner) || !repo_ok {
        return Err(WfrefError::InvalidRepository { slug });
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_context::StaticRepository;

    fn current() -> StaticRepository {
        StaticRepository("octo/home".to_string())
    }

    fn parse(input: &str) -> Result<WorkflowSpec> {
        parse_workflow_spec_with(input, &current())
    }

    #[test]
    fn shorthand_maps_to_workflows_dir() {
        let spec = parse("owner/repo/workflow@v1.0.0").unwrap();
        assert_eq!(spec.repo_slug(), "owner/repo");
        assert_eq!(spec.workflow_path(), "workflows/workflow.md");
        assert_eq!(spec.workflow_name(), "workflow");
        assert_eq!(spec.version(), "v1.0.0");
        assert!(!spec.is_local());
    }

    #[test]
    fn shorthand_tolerates_md_suffix() {
        let spec = parse("owner/repo/workflow.md").unwrap();
        assert_eq!(spec.workflow_path(), "workflows/workflow.md");
        assert_eq!(spec.version(), "");
    }

    #[test]
    fn explicit_path_keeps_directories() {
        let spec = parse("owner/repo/.github/workflows/shared/tools.md@main").unwrap();
        assert_eq!(spec.workflow_path(), ".github/workflows/shared/tools.md");
        assert_eq!(spec.workflow_name(), "tools");
        assert_eq!(spec.version(), "main");
    }

    #[test]
    fn explicit_path_requires_md() {
        let err = parse("owner/repo/docs/readme.txt@v1").unwrap_err();
        assert!(matches!(err, WfrefError::MissingMdExtension { .. }));
        assert!(err.to_string().contains("must end with '.md' extension"));
    }

    #[test]
    fn blob_url() {
        let spec = parse("https://github.com/o/r/blob/main/workflows/x.md").unwrap();
        assert_eq!(spec.version(), "main");
        assert_eq!(spec.workflow_path(), "workflows/x.md");
        assert_eq!(spec.repo_slug(), "o/r");
    }

    #[test]
    fn files_shorthand() {
        let spec = parse("o/r/files/v2.0.0/workflows/x.md").unwrap();
        assert_eq!(spec.version(), "v2.0.0");
        assert_eq!(spec.workflow_path(), "workflows/x.md");
    }

    #[test]
    fn files_shorthand_needs_a_directory() {
        let err = parse("o/r/files/main/x.md").unwrap_err();
        assert!(matches!(err, WfrefError::UrlPathTooShort { .. }), "{:?}", err);
    }

    #[test]
    fn repository_only_is_not_a_workflow() {
        assert!(matches!(parse("o/r@v1").unwrap_err(), WfrefError::NotAWorkflow { .. }));
        assert!(matches!(parse("o/r").unwrap_err(), WfrefError::NotAWorkflow { .. }));
        assert!(matches!(
            parse("https://github.com/o/r").unwrap_err(),
            WfrefError::NotAWorkflow { .. }
        ));
    }

    #[test]
    fn invalid_repository_identifiers() {
        for input in ["-o/r/x", "o-/r/x", "o/-r/x@v1", "/r/x", "o//x"] {
            let err = parse(input).unwrap_err();
            assert!(
                matches!(err, WfrefError::InvalidRepository { .. }),
                "{} gave {:?}",
                input,
                err
            );
            assert!(err.to_string().contains("does not look like a valid GitHub repository"));
        }
    }

    #[test]
    fn empty_version_rejected() {
        assert!(matches!(parse("o/r/x@").unwrap_err(), WfrefError::EmptyVersion { .. }));
    }

    #[test]
    fn single_segment_rejected() {
        assert!(matches!(parse("workflow").unwrap_err(), WfrefError::InvalidSpec { .. }));
        assert!(matches!(parse("   ").unwrap_err(), WfrefError::InvalidSpec { .. }));
    }

    #[test]
    fn local_spec_uses_current_repository() {
        let spec = parse("./.github/workflows/daily.md").unwrap();
        assert!(spec.is_local());
        assert_eq!(spec.repo_slug(), "octo/home");
        assert_eq!(spec.workflow_path(), "./.github/workflows/daily.md");
        assert_eq!(spec.workflow_name(), "daily");
        assert_eq!(spec.version(), "");
    }

    #[test]
    fn local_spec_requires_md() {
        assert!(matches!(
            parse("./notes.txt").unwrap_err(),
            WfrefError::MissingMdExtension { .. }
        ));
    }

    #[test]
    fn local_spec_never_versioned() {
        let spec = parse("./daily.md").unwrap().with_version("v9.9.9");
        assert_eq!(spec.version(), "");
    }

    #[test]
    fn display_omits_empty_version() {
        assert_eq!(parse("o/r/x").unwrap().to_string(), "o/r/workflows/x.md");
        assert_eq!(parse("o/r/x@v1").unwrap().to_string(), "o/r/workflows/x.md@v1");
    }

    #[test]
    fn source_strings_strip_local_prefix() {
        let spec = parse("./.github/workflows/daily.md").unwrap();
        assert_eq!(
            spec.build_source_string().as_deref(),
            Some("octo/home/.github/workflows/daily.md")
        );
        assert_eq!(
            spec.build_source_string_with_commit_sha("abc123").as_deref(),
            Some("octo/home/.github/workflows/daily.md@abc123")
        );
    }

    #[test]
    fn source_string_with_sha_replaces_version() {
        let spec = parse("o/r/x@v1.0.0").unwrap();
        assert_eq!(
            spec.build_source_string_with_commit_sha("deadbeef").as_deref(),
            Some("o/r/workflows/x.md@deadbeef")
        );
    }

    #[test]
    fn repo_spec_forms() {
        let spec = parse_repo_spec("octo/tools@v1.2.0").unwrap();
        assert_eq!(spec.repo_slug(), "octo/tools");
        assert_eq!(spec.owner(), "octo");
        assert_eq!(spec.name(), "tools");
        assert_eq!(spec.version(), "v1.2.0");
        assert!(spec.is_pinned());

        let spec = parse_repo_spec("https://github.com/octo/tools").unwrap();
        assert!(!spec.is_pinned());
        assert_eq!(spec.to_string(), "octo/tools");
    }

    #[test]
    fn repo_spec_rejections() {
        assert!(matches!(
            parse_repo_spec("octo@v1").unwrap_err(),
            WfrefError::InvalidSpec { .. }
        ));
        assert!(matches!(
            parse_repo_spec("octo/@v1").unwrap_err(),
            WfrefError::InvalidRepository { .. }
        ));
        assert!(matches!(
            parse_repo_spec("/tools@v1").unwrap_err(),
            WfrefError::InvalidRepository { .. }
        ));
        assert!(parse_repo_spec("./x.md").is_err());
        assert!(parse_repo_spec("https://github.com/o/r/blob/main/x.md").is_err());
    }

    #[test]
    fn workflow_spec_format_heuristic() {
        assert!(!is_workflow_spec_format("shared/mcp/arxiv.md"));
        assert!(is_workflow_spec_format("owner/repo/file.md@sha"));
        // Known ambiguity: a local name containing '@' reads as remote
        assert!(is_workflow_spec_format("shared/team@infra.md"));
    }
}
