//! Blocking subprocess execution with timeouts
//!
//! Every `git`, `gh`, `tar` and compiler invocation goes through
//! [`ProcessCommand`]. Output is drained on reader threads while the child
//! runs, so large payloads (tarballs, tag lists) cannot fill the pipe and
//! stall `wait_timeout`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{Result, WfrefError};

/// A subprocess invocation, built up then run once
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
}

/// Captured output of a successful process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Stdout as trimmed UTF-8 (lossy)
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Bytes written to the child's stdin
    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Human-readable command line for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion, failing on non-zero exit or timeout
    pub fn run(&self) -> Result<ProcessOutput> {
        let command_line = self.display();
        debug!(command = %command_line, timeout_secs = self.timeout.as_secs(), "running");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            // Never block on a credential prompt; a prompt means auth failed
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GH_PROMPT_DISABLED", "1")
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| WfrefError::CommandSpawn {
            program: self.program.clone(),
            source,
        })?;

        let writer = match (child.stdin.take(), self.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(thread::spawn(move || {
                // The child may exit without reading everything; that is its call
                let _ = pipe.write_all(&input);
            })),
            _ => None,
        };
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child
            .wait_timeout(self.timeout)
            .map_err(|source| WfrefError::CommandSpawn {
                program: self.program.clone(),
                source,
            })? {
            Some(status) => status,
            None => {
                // Timeout! Kill the process and reap the zombie. Reader threads
                // are left detached: a grandchild may still hold the pipes.
                let _ = child.kill();
                let _ = child.wait();
                return Err(WfrefError::CommandTimeout {
                    command: command_line,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let output = ProcessOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(WfrefError::CommandFailed {
                command: command_line,
                exit_code: status.code(),
                output: combined_output(&output),
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Stderr and stdout merged for diagnostics
fn combined_output(output: &ProcessOutput) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    [stderr.trim(), stdout.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_secs(10);

    #[test]
    fn captures_stdout() {
        let out = ProcessCommand::new("sh", SHORT)
            .args(["-c", "echo hello"])
            .run()
            .unwrap();
        assert_eq!(out.stdout_text(), "hello");
    }

    #[test]
    fn failure_carries_combined_output() {
        let err = ProcessCommand::new("sh", SHORT)
            .args(["-c", "echo partial; echo boom >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            WfrefError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(output.contains("boom"));
                assert!(output.contains("partial"));
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn timeout_kills_child() {
        let err = ProcessCommand::new("sleep", Duration::from_millis(200))
            .arg("5")
            .run()
            .unwrap_err();
        assert!(matches!(err, WfrefError::CommandTimeout { .. }));
    }

    #[test]
    fn stdin_is_forwarded() {
        let out = ProcessCommand::new("cat", SHORT)
            .stdin(b"piped bytes".to_vec())
            .run()
            .unwrap();
        assert_eq!(out.stdout, b"piped bytes");
    }

    #[test]
    fn large_output_does_not_deadlock() {
        // Well past the 64 KiB pipe buffer
        let out = ProcessCommand::new("sh", SHORT)
            .args(["-c", "head -c 1000000 /dev/zero"])
            .run()
            .unwrap();
        assert_eq!(out.stdout.len(), 1_000_000);
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let err = ProcessCommand::new("definitely-not-a-real-binary-wfref", SHORT)
            .run()
            .unwrap_err();
        assert!(matches!(err, WfrefError::CommandSpawn { .. }));
    }
}
