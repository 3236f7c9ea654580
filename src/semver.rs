//! Semantic version parsing for release tags
//!
//! Accepts `1`, `1.2`, `1.2.3` with an optional `v` prefix. Missing minor or
//! patch components are zero. Anything else (pre-release suffixes, build
//! metadata, free text) is not a version.

use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` triple ordered lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a tag such as `v1.2.3`; `None` when it is not a version
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        if s.is_empty() {
            return None;
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for part in s.split('.') {
            if count == 3 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            parts[count] = part.parse().ok()?;
            count += 1;
        }

        Some(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Same major version (the upgrade boundary for release resolution)
    pub fn is_compatible_with(&self, other: &SemanticVersion) -> bool {
        self.major == other.major
    }
}

impl FromStr for SemanticVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{}' is not a semantic version", s))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}
