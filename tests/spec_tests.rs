//! Workflow spec grammar, through the public API
//!
//! Example-based checks for each accepted form plus property tests for the
//! render/parse round trip and the commit SHA classifier.

use proptest::prelude::*;
use wfref::repo_context::StaticRepository;
use wfref::spec::parse_workflow_spec_with;
use wfref::{is_commit_sha, is_workflow_spec_format, parse_repo_spec, parse_workflow_spec, WfrefError};

fn here() -> StaticRepository {
    StaticRepository("octo/tools".to_string())
}

// =============================================================================
// Accepted forms
// =============================================================================

#[test]
fn test_three_part_shorthand() {
    let spec = parse_workflow_spec("owner/repo/workflow@v1.0.0").unwrap();
    assert_eq!(spec.repo_slug(), "owner/repo");
    assert_eq!(spec.workflow_path(), "workflows/workflow.md");
    assert_eq!(spec.workflow_name(), "workflow");
    assert_eq!(spec.version(), "v1.0.0");
}

#[test]
fn test_blob_url() {
    let spec = parse_workflow_spec("https://github.com/o/r/blob/main/workflows/x.md").unwrap();
    assert_eq!(spec.repo_slug(), "o/r");
    assert_eq!(spec.version(), "main");
    assert_eq!(spec.workflow_path(), "workflows/x.md");
    assert_eq!(spec.to_string(), "o/r/workflows/x.md@main");
}

#[test]
fn test_files_shorthand() {
    let spec = parse_workflow_spec("o/r/files/v2.1.0/agents/deep/review.md").unwrap();
    assert_eq!(spec.version(), "v2.1.0");
    assert_eq!(spec.workflow_path(), "agents/deep/review.md");
    assert_eq!(spec.workflow_name(), "review");
}

#[test]
fn test_local_spec_takes_current_repo() {
    let spec = parse_workflow_spec_with("./.github/workflows/triage.md", &here()).unwrap();
    assert!(spec.is_local());
    assert_eq!(spec.repo_slug(), "octo/tools");
    assert_eq!(spec.version(), "");
    assert_eq!(spec.workflow_path(), "./.github/workflows/triage.md");
    assert_eq!(
        spec.build_source_string().as_deref(),
        Some("octo/tools/.github/workflows/triage.md")
    );
    assert_eq!(
        spec.build_source_string_with_commit_sha("abc123").as_deref(),
        Some("octo/tools/.github/workflows/triage.md@abc123")
    );
}

#[test]
fn test_repo_specs() {
    let repo = parse_repo_spec("octo/tools@v3").unwrap();
    assert_eq!((repo.repo_slug(), repo.version()), ("octo/tools", "v3"));

    let repo = parse_repo_spec("https://github.com/octo/tools").unwrap();
    assert_eq!((repo.repo_slug(), repo.version()), ("octo/tools", ""));
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_rejections_name_the_rule() {
    let cases: &[(&str, &str)] = &[
        ("https://gitlab.com/o/r/blob/main/x.md", "must be from github.com"),
        ("https://github.com/o/r/commits/main/x.md", "expected /blob/, /tree/, or /raw/"),
        ("https://github.com/o/r/blob/main", "too short"),
        ("o/r/docs/readme.txt", "must end with '.md' extension"),
        ("-bad/r/x", "does not look like a valid GitHub repository"),
    ];
    for (input, needle) in cases {
        let err = parse_workflow_spec(input).unwrap_err();
        assert!(err.is_parse_error(), "{input}: {err}");
        assert!(err.to_string().contains(needle), "{input}: {err}");
    }
}

#[test]
fn test_repository_is_not_a_workflow() {
    assert!(matches!(
        parse_workflow_spec("octo/tools@v1").unwrap_err(),
        WfrefError::NotAWorkflow { .. }
    ));
}

#[test]
fn test_empty_owner_rejected() {
    assert!(parse_repo_spec("/tools@v1").is_err());
    assert!(parse_repo_spec("octo/@v1").is_err());
    assert!(matches!(
        parse_repo_spec("octo/tools@").unwrap_err(),
        WfrefError::EmptyVersion { .. }
    ));
}

// =============================================================================
// Import classification
// =============================================================================

#[test]
fn test_workflow_spec_format_is_at_sign_only() {
    assert!(!is_workflow_spec_format("shared/mcp/arxiv.md"));
    assert!(is_workflow_spec_format("owner/repo/file.md@sha"));
    // Known ambiguity: a local name with '@' reads as remote
    assert!(is_workflow_spec_format("shared/team@2024.md"));
}

// =============================================================================
// Properties
// =============================================================================

prop_compose! {
    fn arb_owner()(owner in "[a-z0-9]([a-z0-9-]{0,8}[a-z0-9])?") -> String {
        owner
    }
}

prop_compose! {
    fn arb_repo()(repo in "[a-z0-9][a-z0-9_]{0,10}") -> String {
        repo
    }
}

prop_compose! {
    /// Two to four directories deep, ending in a markdown file
    fn arb_path()(
        dirs in prop::collection::vec("[a-z][a-z0-9_-]{0,8}", 1..4),
        file in "[a-z][a-z0-9_-]{0,8}"
    ) -> String {
        format!("{}/{}.md", dirs.join("/"), file)
    }
}

fn arb_version() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        "[a-z][a-z0-9-]{0,10}",
        "[0-9a-f]{40}",
    ]
}

proptest! {
    #[test]
    fn prop_render_then_parse_is_identity(
        owner in arb_owner(),
        repo in arb_repo(),
        path in arb_path(),
        version in arb_version(),
    ) {
        let input = if version.is_empty() {
            format!("{}/{}/{}", owner, repo, path)
        } else {
            format!("{}/{}/{}@{}", owner, repo, path, version)
        };
        // Without a ref, a leading files/ directory is the files/<ref>/<path> form
        let files_form = version.is_empty() && path.starts_with("files/") && path.matches('/').count() >= 2;

        match parse_workflow_spec(&input) {
            Ok(spec) => {
                if !files_form {
                    prop_assert_eq!(spec.to_string(), input);
                }
                prop_assert_eq!(parse_workflow_spec(&spec.to_string()).unwrap(), spec);
            }
            Err(e) => {
                prop_assert!(files_form, "{} failed: {}", input, e);
                prop_assert!(matches!(e, WfrefError::UrlPathTooShort { .. }), "{} failed: {}", input, e);
            }
        }
    }

    #[test]
    fn prop_file_url_survives_render(
        owner in arb_owner(),
        repo in arb_repo(),
        path in arb_path(),
        kind in prop_oneof![Just("blob"), Just("tree"), Just("raw"), Just("files")],
        version in "[a-z][a-z0-9-]{0,10}",
    ) {
        let url = format!("https://github.com/{}/{}/{}/{}/{}", owner, repo, kind, version, path);
        let spec = parse_workflow_spec(&url).unwrap();
        prop_assert_eq!(spec.workflow_path(), path.as_str());
        prop_assert_eq!(parse_workflow_spec(&spec.to_string()).unwrap(), spec);
    }

    #[test]
    fn prop_any_40_hex_is_a_sha(sha in "[0-9a-fA-F]{40}") {
        prop_assert!(is_commit_sha(&sha));
    }

    #[test]
    fn prop_wrong_length_is_not_a_sha(sha in "[0-9a-f]{0,39}|[0-9a-f]{41,50}") {
        prop_assert!(!is_commit_sha(&sha));
    }

    #[test]
    fn prop_parser_never_panics(input in "\\PC{0,60}") {
        let _ = parse_workflow_spec_with(&input, &here());
        let _ = parse_repo_spec(&input);
    }
}
