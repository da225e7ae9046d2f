//! Lenient dotted-numeric version comparison
//!
//! Package headers rarely carry strict semver (`1.2`, `4.0.1.3`, `v2.1-beta1`
//! are all common). Versions are compared segment by segment with missing
//! trailing segments treated as zero; a pre-release suffix sorts before the
//! release it qualifies and is ordered with semver pre-release rules.

use crate::error::{Error, Result};
use semver::Prerelease;
use std::cmp::Ordering;
use std::fmt;

/// A parsed dotted version such as `1.4.2` or `2.0-rc.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedVersion {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl DottedVersion {
    /// Parse a version string, tolerating a leading `v` and build metadata
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        // Build metadata never participates in ordering
        let without_build = trimmed.split('+').next().unwrap_or_default();

        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some((core, _)) => (core, None),
            None => (without_build, None),
        };

        if core.is_empty() {
            return Err(Error::invalid_version(input));
        }

        let parts = core
            .split('.')
            .map(|segment| segment.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::invalid_version(input))?;

        Ok(Self { parts, pre })
    }

    fn part(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }

    fn compare_pre(a: &str, b: &str) -> Ordering {
        match (Prerelease::new(a), Prerelease::new(b)) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        }
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for idx in 0..len {
            match self.part(idx).cmp(&other.part(idx)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => Self::compare_pre(a, b),
        }
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", core.join("."))?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Compare two version strings; `None` when either cannot be parsed
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = DottedVersion::parse(a).ok()?;
    let b = DottedVersion::parse(b).ok()?;
    Some(a.cmp(&b))
}

/// Whether `installed` is strictly older than `minimum`
///
/// Returns `None` when the answer cannot be determined. Callers must not
/// read `None` as "older".
pub fn is_older_than(installed: &str, minimum: &str) -> Option<bool> {
    compare_versions(installed, minimum).map(|ord| ord == Ordering::Less)
}
