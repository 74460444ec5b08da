//! Per-branch failures collected during resolution and installation.

use std::fmt;

/// Why a single dependency or module failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No source has a module satisfying the dependency.
    NotFound {
        dependency: String,
        requested_by: Option<String>,
    },
    /// The module name is already resolved at a version the dependency rejects.
    VersionConflict {
        dependency: String,
        resolved: String,
    },
    /// The module repeats in its own ancestry; `path` runs from the
    /// outermost ancestor to the repeated module.
    CircularDependency { path: Vec<String> },
    Fetch { module: String, message: String },
    Install { module: String, message: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound {
                dependency,
                requested_by: Some(parent),
            } => write!(
                f,
                "{dependency} (required by {parent}) is not satisfiable from any source"
            ),
            Self::NotFound {
                dependency,
                requested_by: None,
            } => write!(f, "{dependency} is not satisfiable from any source"),
            Self::VersionConflict {
                dependency,
                resolved,
            } => write!(f, "{dependency} conflicts with already resolved {resolved}"),
            Self::CircularDependency { path } => {
                write!(f, "circular dependency: {}", path.join(" -> "))
            }
            Self::Fetch { module, message } => write!(f, "failed to fetch {module}: {message}"),
            Self::Install { module, message } => {
                write!(f, "failed to install {module}: {message}")
            }
        }
    }
}

/// Every failure of one resolution or install run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    failures: Vec<Failure>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. A failure already in the report is not repeated.
    pub fn add(&mut self, failure: Failure) {
        if !self.failures.contains(&failure) {
            self.failures.push(failure);
        }
    }

    pub fn merge(&mut self, other: FailureReport) {
        for failure in other.failures {
            self.add(failure);
        }
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), FailureReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Failure> for FailureReport {
    fn from(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "No failures.");
        }
        write!(f, "{} failure(s):", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = FailureReport::new();
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "No failures.");
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn report_lists_every_failure() {
        let mut report = FailureReport::from(Failure::NotFound {
            dependency: "Foo (>= 9.9)".into(),
            requested_by: None,
        });
        let mut nested = FailureReport::new();
        nested.add(Failure::CircularDependency {
            path: vec!["A-1.0".into(), "B-1.0".into(), "A-1.0".into()],
        });
        report.merge(nested);

        assert_eq!(report.len(), 2);
        let s = report.to_string();
        assert!(s.starts_with("2 failure(s):"));
        assert!(s.contains("Foo (>= 9.9) is not satisfiable from any source"));
        assert!(s.contains("circular dependency: A-1.0 -> B-1.0 -> A-1.0"));
        assert!(report.into_result().is_err());
    }

    #[test]
    fn shared_failures_reported_once() {
        let failure = Failure::Install {
            module: "D-1.0".into(),
            message: "exit 1".into(),
        };
        let mut report = FailureReport::from(failure.clone());
        report.merge(FailureReport::from(failure));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn failure_messages() {
        let f = Failure::Install {
            module: "Foo-1.2".into(),
            message: "exit 1".into(),
        };
        assert_eq!(f.to_string(), "failed to install Foo-1.2: exit 1");

        let f = Failure::NotFound {
            dependency: "Bar (== 2.0)".into(),
            requested_by: Some("Foo-1.2".into()),
        };
        assert_eq!(
            f.to_string(),
            "Bar (== 2.0) (required by Foo-1.2) is not satisfiable from any source"
        );
    }
}
