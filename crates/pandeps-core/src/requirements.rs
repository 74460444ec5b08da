//! Line-oriented requirements file (`cpanfile`) parsing.
//!
//! Only `requires` statements are understood:
//!
//! ```text
//! requires 'Moo', '>= 2.0';
//! requires 'Plack'; # REQS: HTTP::Tiny-0.05;URI-1.60
//! ```
//!
//! A trailing `# REQS:` comment lists extra requirements that are attached to
//! the resolved module's own dependency list.

use std::path::Path;
use std::sync::LazyLock;

use pandeps_util::errors::PandepsError;
use regex::Regex;

use crate::dependency::{Dependency, DependencyList};

static REQUIRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*requires\s+['"]([^'"]+)['"](,\s+['"]([^'"]+)['"])?;\s*(#.*)?"#)
        .expect("valid regex")
});

const REQS_PREFIX: &str = "# REQS: ";

/// Parse a single line. Returns `None` for blank or unrecognised lines.
pub fn parse_line(line: &str) -> Option<Dependency> {
    if line.trim().is_empty() {
        return None;
    }
    let Some(caps) = REQUIRES_RE.captures(line) else {
        tracing::trace!("Unable to parse line: {line}");
        return None;
    };

    let name = caps.get(1).map_or("", |m| m.as_str());
    let constraint = caps.get(3).map_or("", |m| m.as_str());
    let comment = caps.get(4).map_or("", |m| m.as_str().trim());

    let additional = comment
        .strip_prefix(REQS_PREFIX)
        .map(parse_reqs_directive)
        .unwrap_or_default();

    let dep = Dependency::parse(name, constraint).with_additional(additional);
    tracing::debug!("Found dependency: {dep}");
    Some(dep)
}

/// Parse `Name-Version;Name2-Version2` into dependencies.
fn parse_reqs_directive(directive: &str) -> Vec<Dependency> {
    tracing::trace!("Found additional dependencies: {directive}");
    directive
        .split(';')
        .map(str::trim)
        .filter(|req| !req.is_empty())
        .map(|req| match req.split_once('-') {
            Some((name, version)) => Dependency::parse(name, version),
            None => Dependency::parse(req, ""),
        })
        .collect()
}

/// Parse every line of a requirements file into a root dependency list.
pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> DependencyList {
    let list: DependencyList = lines.into_iter().filter_map(parse_line).collect();
    tracing::info!("Found {} dependencies in requirements file", list.len());
    list
}

/// Read and parse a requirements file.
pub fn from_path(path: &Path) -> miette::Result<DependencyList> {
    let content = std::fs::read_to_string(path).map_err(|e| PandepsError::Requirements {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    Ok(parse_lines(content.lines()))
}

/// Build a root list from module names given on the command line.
pub fn from_module_names<S: AsRef<str>>(names: &[S]) -> DependencyList {
    names
        .iter()
        .map(|n| Dependency::parse(n.as_ref(), ""))
        .collect()
}
