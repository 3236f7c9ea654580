//! Lock file compilation
//!
//! Every workflow `x.md` has a compiled `x.lock.yml` next to it. The
//! compiler is an external command; this module only knows how to invoke
//! it and where its output lands.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::WfrefConfig;
use crate::error::{Result, WfrefError};
use crate::process::ProcessCommand;

const LOCK_SUFFIX: &str = ".lock.yml";
const SOURCE_HASH_HEADER: &str = "# source-hash:";

/// Produces the lock file for a workflow
pub trait LockCompiler: Send + Sync {
    /// Compile `workflow` and return the path of its lock file
    fn compile(&self, workflow: &Path) -> Result<PathBuf>;
}

/// `x.md` → `x.lock.yml`; other names get the suffix appended
pub fn lock_file_path(workflow: &Path) -> PathBuf {
    let name = workflow
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".md").unwrap_or(&name);
    workflow.with_file_name(format!("{}{}", stem, LOCK_SUFFIX))
}

/// Runs the configured compiler command with the workflow path appended
pub struct CommandCompiler {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandCompiler {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_config(config: &WfrefConfig) -> Self {
        Self::new(config.compiler.command.clone(), config.timeouts.compile())
    }
}

impl LockCompiler for CommandCompiler {
    fn compile(&self, workflow: &Path) -> Result<PathBuf> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(WfrefError::Config {
                reason: "compiler.command is empty".to_string(),
            });
        };

        let cmd = ProcessCommand::new(program, self.timeout)
            .args(args.iter())
            .arg(workflow.to_string_lossy());

        debug!(command = %cmd.display(), "compiling lock file");
        cmd.run().map_err(|e| match e {
            WfrefError::CommandFailed { output, .. } => WfrefError::CompileFailed {
                path: workflow.display().to_string(),
                details: output,
            },
            other => other,
        })?;

        let lock = lock_file_path(workflow);
        if !lock.is_file() {
            return Err(WfrefError::LockFileMissing {
                path: lock.display().to_string(),
            });
        }
        info!(lock = %lock.display(), "compiled");
        Ok(lock)
    }
}

/// Hex xxh3 of the markdown source, as recorded in lock headers
pub fn source_hash(content: &[u8]) -> String {
    format!("{:016x}", xxh3_64(content))
}

/// Whether a lock file was produced from the current markdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale,
    /// No lock file, or it carries no source hash
    Unknown,
}

/// Compare `workflow` against the `# source-hash:` header of its lock file
pub fn check_staleness(workflow: &Path) -> Result<Staleness> {
    let source = fs::read(workflow).map_err(|e| WfrefError::io(workflow, e))?;
    let lock = lock_file_path(workflow);
    let Ok(lock_text) = fs::read_to_string(&lock) else {
        return Ok(Staleness::Unknown);
    };

    let recorded = lock_text
        .lines()
        .take_while(|l| l.starts_with('#') || l.trim().is_empty())
        .find_map(|l| l.strip_prefix(SOURCE_HASH_HEADER))
        .map(str::trim);

    Ok(match recorded {
        None => Staleness::Unknown,
        Some(hash) if hash.eq_ignore_ascii_case(&source_hash(&source)) => Staleness::Fresh,
        Some(_) => Staleness::Stale,
    })
}
