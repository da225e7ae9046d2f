//! Package header metadata
//!
//! Entry-point scripts declare their metadata in a leading comment block:
//!
//! ```text
//! <?php
//! /**
//!  * Plugin Name: Contact Forms
//!  * Version: 5.2.1
//!  */
//! ```
//!
//! Only the first 8 KiB of a file is scanned.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Bytes scanned for header fields
pub const HEADER_SCAN_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageHeader {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl PackageHeader {
    /// A file is a package entry point only when it names itself
    pub fn is_package(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| field_pattern("Plugin Name"));
static ALT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| field_pattern("Name"));
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| field_pattern("Version"));
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| field_pattern("Description"));
static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| field_pattern("Author"));

fn field_pattern(field: &str) -> Regex {
    Regex::new(&format!(
        r"(?mi)^(?:[ \t]*<\?php)?[ \t/*#@]*{}:(.*)$",
        regex::escape(field)
    ))
    .expect("header field regex is valid")
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| cleanup_value(m.as_str()))
        .filter(|v| !v.is_empty())
}

/// Strip a trailing comment terminator or closing tag from a field value
fn cleanup_value(raw: &str) -> String {
    let end = [raw.find("*/"), raw.find("?>")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(raw.len());
    raw[..end].trim().to_string()
}

/// Parse header fields from the leading text of a file
pub fn parse_header(text: &str) -> PackageHeader {
    PackageHeader {
        name: capture(&NAME_RE, text).or_else(|| capture(&ALT_NAME_RE, text)),
        version: capture(&VERSION_RE, text),
        description: capture(&DESCRIPTION_RE, text),
        author: capture(&AUTHOR_RE, text),
    }
}

/// Read and parse the header of `path`
pub fn read_header(path: &Path) -> Result<PackageHeader> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut buf = Vec::with_capacity(HEADER_SCAN_BYTES);
    file.take(HEADER_SCAN_BYTES as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_header(&String::from_utf8_lossy(&buf)))
}
