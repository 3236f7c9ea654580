//! GitHub URL forms
//!
//! ```text
//! https://github.com/<owner>/<repo>[@<ref>]
//! https://github.com/<owner>/<repo>/{blob|tree|raw|files}/<ref>/<path>.md
//! ```

use url::Url;

use super::{split_version, validate_slug, RepoSpec, WorkflowSpec};
use crate::error::{Result, WfrefError};

/// Type keywords accepted between the repository and the ref
const FILE_URL_TYPES: &[&str] = &["blob", "tree", "raw", "files"];

/// A file path after the ref needs a directory, so the rendered
/// `owner/repo/<path>@<ref>` never reads back as the `<name>` shorthand
pub(crate) const MIN_PATH_SEGMENTS: usize = 2;

/// What a GitHub URL points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GitHubUrl {
    Repository(RepoSpec),
    File(WorkflowSpec),
}

/// `None` when `input` is not an http(s) URL at all
pub(crate) fn parse_github_url(input: &str) -> Option<Result<GitHubUrl>> {
    if !(input.starts_with("https://") || input.starts_with("http://")) {
        return None;
    }
    Some(parse_url(input))
}

fn parse_url(input: &str) -> Result<GitHubUrl> {
    let url = Url::parse(input).map_err(|e| WfrefError::invalid_spec(input, e.to_string()))?;

    let host = url.host_str().unwrap_or_default();
    if !(host.eq_ignore_ascii_case("github.com") || host.eq_ignore_ascii_case("www.github.com")) {
        return Err(WfrefError::NotGitHubUrl {
            url: input.to_string(),
        });
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [] | [_] => Err(WfrefError::invalid_spec(
            input,
            "expected https://github.com/<owner>/<repo>",
        )),
        [owner, repo] => {
            let (repo, version) = split_version(input, repo)?;
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            let slug = validate_slug(owner, repo)?;
            Ok(GitHubUrl::Repository(RepoSpec::new(slug, version)))
        }
        [owner, repo, kind, rest @ ..] => {
            if !FILE_URL_TYPES.contains(kind) {
                return Err(WfrefError::UnsupportedUrlType {
                    url: input.to_string(),
                    kind: kind.to_string(),
                });
            }
            let (git_ref, path) = match rest {
                [git_ref, path @ ..] if path.len() >= MIN_PATH_SEGMENTS => (git_ref, path.join("/")),
                _ => {
                    return Err(WfrefError::UrlPathTooShort {
                        url: input.to_string(),
                        kind: kind.to_string(),
                    })
                }
            };
            let slug = validate_slug(owner, repo)?;
            let spec = WorkflowSpec::remote(RepoSpec::new(slug, git_ref.to_string()), path)?;
            Ok(GitHubUrl::File(spec))
        }
    }
}
