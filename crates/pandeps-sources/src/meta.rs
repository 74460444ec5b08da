//! Distribution metadata: the requirements an extracted archive declares.
//!
//! Two layouts are understood. Older `META.yml` files carry a top-level
//! `requires` map; newer ones nest them under `prereqs.<phase>.requires`, of
//! which the runtime and test phases are merged.

use std::path::Path;

use pandeps_core::dependency::Dependency;
use pandeps_util::errors::PandepsError;
use serde_yaml::{Mapping, Value};

/// Metadata files looked for in an extracted distribution, in order.
pub const META_FILES: &[&str] = &["META.yml", "META.json"];

const PREREQ_PHASES: &[&str] = &["runtime", "test"];

/// Parse metadata text (YAML, or JSON as a YAML subset) into requirements.
pub fn parse_requirements(text: &str) -> miette::Result<Vec<Dependency>> {
    let doc: Value = serde_yaml::from_str(text).map_err(|e| PandepsError::Fetch {
        message: format!("Invalid module metadata: {e}"),
    })?;

    if let Some(requires) = doc.get("requires").and_then(Value::as_mapping) {
        return Ok(requirement_map(requires));
    }

    let mut deps = Vec::new();
    if let Some(prereqs) = doc.get("prereqs") {
        for phase in PREREQ_PHASES {
            if let Some(requires) = prereqs
                .get(*phase)
                .and_then(|p| p.get("requires"))
                .and_then(Value::as_mapping)
            {
                deps.extend(requirement_map(requires));
            }
        }
    }
    Ok(deps)
}

fn requirement_map(map: &Mapping) -> Vec<Dependency> {
    map.iter()
        .filter_map(|(name, version)| {
            let name = name.as_str()?;
            Some(Dependency::parse(name, &version_text(version)))
        })
        .collect()
}

fn version_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Read the requirements of an extracted distribution.
///
/// A missing or unreadable metadata file yields no requirements; the module
/// is still installable, its installer resolves anything undeclared.
pub fn load_requirements(extracted: &Path) -> Vec<Dependency> {
    for file in META_FILES {
        let path = extracted.join(file);
        if !path.is_file() {
            continue;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| miette::miette!("{e}"))
            .and_then(|text| parse_requirements(&text));
        match parsed {
            Ok(deps) => {
                tracing::debug!("Found {} requirements in {}", deps.len(), path.display());
                return deps;
            }
            Err(e) => {
                tracing::warn!("Error parsing {}: {e}", path.display());
                return Vec::new();
            }
        }
    }
    tracing::warn!("No metadata found in {}", extracted.display());
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandeps_core::version::Operator;

    #[test]
    fn top_level_requires() {
        let deps = parse_requirements(
            "name: Foo\nrequires:\n  Bar: 2.5\n  Baz: '>= 0.5'\n  perl: 5.008\n",
        )
        .unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "Bar");
        assert_eq!(deps[0].constraint.version, "2.5");
        assert_eq!(deps[1].constraint.operator, Operator::Ge);
        assert_eq!(deps[1].constraint.version, "0.5");
    }

    #[test]
    fn prereqs_merge_runtime_and_test() {
        let yaml = "\
prereqs:
  runtime:
    requires:
      Moo: '2.0'
  test:
    requires:
      Test::Deep: 0
  develop:
    requires:
      Dist::Zilla: 0
";
        let deps = parse_requirements(yaml).unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Moo", "Test::Deep"]);
        assert_eq!(deps[0].constraint.version, "2.0");
    }

    #[test]
    fn json_metadata() {
        let json = r#"{"prereqs":{"runtime":{"requires":{"JSON::PP":"2.27"}}}}"#;
        let deps = parse_requirements(json).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "JSON::PP");
    }

    #[test]
    fn no_requirements() {
        assert!(parse_requirements("name: Foo\n").unwrap().is_empty());
    }

    #[test]
    fn load_missing_metadata_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_requirements(tmp.path()).is_empty());
    }

    #[test]
    fn load_prefers_yaml() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("META.yml"), "requires:\n  Bar: 1\n").unwrap();
        std::fs::write(
            tmp.path().join("META.json"),
            r#"{"requires":{"Other":"1"}}"#,
        )
        .unwrap();
        let deps = load_requirements(tmp.path());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "Bar");
    }
}
