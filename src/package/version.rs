//! Strict `major.minor.patch` versions.
//!
//! No `v` prefix, pre-release tags or build metadata are accepted; callers
//! strip prefixes before parsing. Versions embedded in longer strings (such as
//! a dependency path in a consumer manifest) are pulled out with [`SemanticVersion::extract`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EmpError;

static STRICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)$").expect("valid regex"));

static EMBEDDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\.([0-9]+)\.([0-9]+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Which component a release increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

impl VersionBump {
    pub const ALL: [VersionBump; 3] = [VersionBump::Major, VersionBump::Minor, VersionBump::Patch];
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Major => write!(f, "major"),
            VersionBump::Minor => write!(f, "minor"),
            VersionBump::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for VersionBump {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(VersionBump::Major),
            "minor" => Ok(VersionBump::Minor),
            "patch" => Ok(VersionBump::Patch),
            _ => anyhow::bail!("Unknown release type: {}. Expected major, minor or patch.", s),
        }
    }
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a string that must be exactly `digits.digits.digits`.
    pub fn parse(s: &str) -> Result<Self, EmpError> {
        let captures = STRICT.captures(s).ok_or_else(|| EmpError::Format {
            input: s.to_string(),
        })?;
        Self::from_captures(s, &captures)
    }

    /// Find the first `digits.digits.digits` run inside `s`.
    ///
    /// `"./.dependencies/app-v1.4.0.tgz"` yields `1.4.0`.
    pub fn extract(s: &str) -> Result<Self, EmpError> {
        let captures = EMBEDDED.captures(s).ok_or_else(|| EmpError::Format {
            input: s.to_string(),
        })?;
        Self::from_captures(s, &captures)
    }

    fn from_captures(input: &str, captures: &regex::Captures<'_>) -> Result<Self, EmpError> {
        let component = |i: usize| -> Result<u64, EmpError> {
            captures[i].parse::<u64>().map_err(|_| EmpError::Format {
                input: input.to_string(),
            })
        };
        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Returns whichever version is greater. Ties return `b`, so a running
    /// maximum can be folded by passing the accumulator as `b`.
    pub fn largest<'v>(a: &'v SemanticVersion, b: &'v SemanticVersion) -> &'v SemanticVersion {
        if a > b { a } else { b }
    }

    /// True when both versions are known and `latest` has a higher major.
    /// No existing version means there is nothing to gate.
    pub fn has_new_major(latest: &SemanticVersion, existing: Option<&SemanticVersion>) -> bool {
        existing.is_some_and(|existing| latest.major > existing.major)
    }

    /// Next version for a release of type `kind`. Fails when the bumped
    /// component would overflow.
    pub fn bump(&self, kind: VersionBump) -> Result<SemanticVersion, EmpError> {
        let overflow = || EmpError::VersionOverflow {
            version: self.to_string(),
            kind: kind.to_string(),
        };
        Ok(match kind {
            VersionBump::Patch => {
                Self::new(self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?)
            }
            VersionBump::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            VersionBump::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
        })
    }

    /// Git tag name for this version, e.g. `v1.2.3`.
    pub fn tag(&self) -> String {
        format!("v{}", self)
    }

    /// A major release resets minor and patch, so `x.0.0` is the only shape one can have.
    pub fn is_major_release(&self) -> bool {
        self.minor == 0 && self.patch == 0
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = EmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = EmpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(v: SemanticVersion) -> Self {
        v.to_string()
    }
}
