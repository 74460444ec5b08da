//! Line decoders for the two on-disk index formats.
//!
//! The flat index (`02packages.details.txt`) has a header terminated by a
//! blank line followed by `Module::Name  version  A/AU/AUTHOR/Dist-1.0.tar.gz`
//! lines. The archival index lists one archive path per line, optionally
//! followed by other columns.

use std::sync::LazyLock;

use pandeps_core::dependency::Module;
use pandeps_core::version::ANY_VERSION;
use regex::Regex;

static FLAT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^\s]+)\s*([^\s]+)\s*(.*)$").expect("valid regex"));

static ARCHIVE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^authors/id/\w/\w{2}/\w+/([^\s]+)[-_]v?([\d\._\w]+)(?:-\w+)?.tar.gz$")
        .expect("valid regex")
});

const AUTHORS_PREFIX: &str = "authors/id/";

/// Decode every module line of a flat index.
pub fn parse_flat_index(text: &str, source_url: &str) -> Vec<Module> {
    text.lines()
        .skip_while(|line| !line.trim().is_empty())
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| flat_line(line, source_url))
        .collect()
}

/// Decode one `name version path` line.
pub fn flat_line(line: &str, source_url: &str) -> Option<Module> {
    let caps = FLAT_LINE_RE.captures(line)?;
    let name = caps.get(1)?.as_str();
    let version = caps.get(2)?.as_str();
    let path = caps.get(3)?.as_str().trim();
    if path.is_empty() {
        return None;
    }
    let archive_url = format!("{AUTHORS_PREFIX}{path}");

    let version = if version == "undef" {
        ARCHIVE_PATH_RE
            .captures(&archive_url)
            .and_then(|c| c.get(2))
            .map_or(ANY_VERSION, |m| m.as_str())
    } else {
        version
    };

    Some(Module::new(
        name,
        normalise_version(version),
        source_url,
        archive_url,
    ))
}

/// Keep `major.minor` versions as-is; longer dotted versions keep only their
/// first component.
pub fn normalise_version(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() == 2 {
        version.to_string()
    } else {
        parts[0].to_string()
    }
}

/// Decode every archive line of an archival index.
pub fn parse_archival_index(text: &str, source_url: &str) -> Vec<Module> {
    text.lines()
        .filter_map(|line| archival_line(line, source_url))
        .collect()
}

/// Decode one archival line; anything that isn't an `authors/id/...tar.gz`
/// path is skipped.
pub fn archival_line(line: &str, source_url: &str) -> Option<Module> {
    let path = line.split_whitespace().next()?;
    if !path.ends_with(".tar.gz") {
        return None;
    }
    let caps = ARCHIVE_PATH_RE.captures(path)?;
    let name = caps.get(1)?.as_str().replace('-', "::");
    let version = caps.get(2)?.as_str();
    Some(Module::new(name, version, source_url, path))
}
