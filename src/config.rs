//! wfref Configuration Module
//!
//! Which binaries to run, where git remotes live, and how long to wait.
//! Config is stored in `~/.config/wfref/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`WFREF_GIT`, `WFREF_GH`, `WFREF_API_TIMEOUT`, ...)
//! 2. Config file (`~/.config/wfref/config.toml` or `--config <FILE>`)
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WfrefError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WfrefConfig {
    #[serde(default)]
    pub tools: Tools,

    #[serde(default)]
    pub github: GitHub,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub compiler: Compiler,
}

/// External binaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Tools {
    pub git: String,
    pub gh: String,
    pub tar: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            gh: "gh".to_string(),
            tar: "tar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHub {
    /// Prefix for git clone URLs (`<base>/<owner>/<repo>.git`)
    pub git_base_url: String,
}

impl Default for GitHub {
    fn default() -> Self {
        Self {
            git_base_url: "https://github.com".to_string(),
        }
    }
}

/// Per-subprocess timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub api_secs: u64,
    pub git_secs: u64,
    pub compile_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            api_secs: 30,
            git_secs: 120,
            compile_secs: 300,
        }
    }
}

impl Timeouts {
    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }

    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git_secs)
    }

    pub fn compile(&self) -> Duration {
        Duration::from_secs(self.compile_secs)
    }
}

/// Lock file compiler; the workflow path is appended as the last argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Compiler {
    pub command: Vec<String>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            command: vec!["gh".to_string(), "aw".to_string(), "compile".to_string()],
        }
    }
}

impl WfrefConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/wfref/` on Unix, `%APPDATA%/wfref/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wfref")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| WfrefError::Config {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| WfrefError::Config {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    /// Unparsable timeout values are an error rather than silently ignored.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WFREF_GIT") {
            self.tools.git = v;
        }
        if let Some(v) = get("WFREF_GH") {
            self.tools.gh = v;
        }
        if let Some(v) = get("WFREF_TAR") {
            self.tools.tar = v;
        }
        if let Some(v) = get("WFREF_GIT_BASE_URL") {
            self.github.git_base_url = v;
        }
        if let Some(v) = get("WFREF_API_TIMEOUT") {
            self.timeouts.api_secs = parse_secs("WFREF_API_TIMEOUT", &v)?;
        }
        if let Some(v) = get("WFREF_GIT_TIMEOUT") {
            self.timeouts.git_secs = parse_secs("WFREF_GIT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("WFREF_COMPILE_TIMEOUT") {
            self.timeouts.compile_secs = parse_secs("WFREF_COMPILE_TIMEOUT", &v)?;
        }
        if let Some(v) = get("WFREF_COMPILE_CMD") {
            self.compiler.command = v.split_whitespace().map(String::from).collect();
        }

        Ok(self)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| WfrefError::Config {
        reason: format!("{} must be a whole number of seconds, got '{}'", key, value),
    })
}
