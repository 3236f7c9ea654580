//! wfref - resolve, fetch and bundle agentic workflow references
//!
//! A workflow is referenced by a short spec such as `octo/tools/triage@v1.2.0`,
//! a GitHub URL, or a local `./path.md`. This crate parses those references,
//! resolves versions against GitHub, downloads the file, and collects the
//! local files a workflow imports.

pub mod compiler;
pub mod config;
pub mod error;
pub mod fetch;
pub mod frontmatter;
pub mod imports;
pub mod process;
pub mod remote;
pub mod repo_context;
pub mod resolver;
pub mod semver;
pub mod spec;

pub use compiler::{CommandCompiler, LockCompiler, Staleness};
pub use config::WfrefConfig;
pub use error::{FixSuggestion, Result, WfrefError};
pub use fetch::{ContentFetcher, ResolvedContent};
pub use imports::{ImportCollector, ResolutionContext};
pub use remote::{default_remote, RemoteRepository};
pub use resolver::{is_commit_sha, RefKind, ResolvedRef, VersionResolver};
pub use semver::SemanticVersion;
pub use spec::{is_workflow_spec_format, parse_repo_spec, parse_workflow_spec, RepoSpec, WorkflowSpec};
