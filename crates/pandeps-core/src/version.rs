//! Version constraints of the form `<op> <version>`.
//!
//! Versions compare as decimal numbers after stripping a leading `v`, so
//! `1.10` and `1.1` are the same version and `1.9` sorts above `1.10`.
//! Index matching everywhere depends on this exact comparison.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([=><!]+)?\s*([v\d._-]+)$").expect("valid regex"));

static NUMERIC_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d*(?:\.\d*)?").expect("valid regex"));

/// Version used when a requirement names no version at all.
pub const ANY_VERSION: &str = "0.00";

/// Comparison operator of a [`VersionConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Operator {
    /// Parse one of `==`, `<=`, `>=`, `<`, `>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Eq),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }

    /// Apply the operator as `candidate <op> required`.
    #[allow(clippy::float_cmp)]
    pub fn compare(self, candidate: f64, required: f64) -> bool {
        match self {
            Self::Eq => candidate == required,
            Self::Le => candidate <= required,
            Self::Ge => candidate >= required,
            Self::Lt => candidate < required,
            Self::Gt => candidate > required,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed requirement such as `>= 1.02`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    pub operator: Operator,
    pub version: String,
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl VersionConstraint {
    /// The permissive constraint `>= 0.00`.
    pub fn any() -> Self {
        Self {
            operator: Operator::Ge,
            version: ANY_VERSION.to_string(),
        }
    }

    pub fn new(operator: Operator, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            operator,
            version: strip_v(&version).to_string(),
        }
    }

    /// Parse a requirement string. Never fails: anything unrecognised
    /// degrades to [`VersionConstraint::any`]. A bare version defaults to `>=`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some(caps) = CONSTRAINT_RE.captures(raw) else {
            if !raw.is_empty() {
                tracing::trace!("Unparsable version constraint {raw:?}, accepting any version");
            }
            return Self::any();
        };

        let version = caps.get(2).map_or(ANY_VERSION, |m| m.as_str());
        let operator = match caps.get(1) {
            None => Operator::Ge,
            Some(op) => match Operator::parse(op.as_str()) {
                Some(op) => op,
                None => {
                    tracing::trace!("Unknown operator in {raw:?}, accepting any version");
                    return Self::any();
                }
            },
        };

        Self::new(operator, version)
    }

    /// Whether `candidate` satisfies this constraint under numeric comparison.
    pub fn matches(&self, candidate: &str) -> bool {
        let valid = self
            .operator
            .compare(numeric_version(candidate), numeric_version(&self.version));
        tracing::trace!(
            "Matches: {candidate} {} {} => {valid}",
            self.operator,
            self.version
        );
        valid
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Numeric value of a version string.
///
/// The leading `v` is dropped and the longest `digits[.digits]` prefix is read
/// as a float, so `1.10` is `1.1`, `1.02_01` is `1.02` and `1.2.3` is `1.2`.
/// Strings with no numeric prefix are `0.0`.
pub fn numeric_version(version: &str) -> f64 {
    let v = strip_v(version.trim());
    NUMERIC_PREFIX_RE
        .find(v)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}
