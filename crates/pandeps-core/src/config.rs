use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pandeps_util::errors::PandepsError;

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = "pandeps.toml";

/// Default flat index and base URL of the public CPAN.
pub const CPAN_INDEX_URL: &str = "http://www.cpan.org/modules/02packages.details.txt.gz";
pub const CPAN_URL: &str = "http://www.cpan.org";

/// Default archival index and base URL of BackPAN.
pub const BACKPAN_INDEX_URL: &str = "http://gitpan.integra.net/backpan-index.gz";
pub const BACKPAN_URL: &str = "http://backpan.perl.org";

/// Run configuration, loaded from `pandeps.toml` and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Requirements file read when no modules are named on the command line.
    #[serde(default = "default_requirements")]
    pub requirements: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Maximum concurrent install commands.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Maximum concurrent resolutions per dependency list.
    #[serde(default = "default_resolve_jobs")]
    pub resolve_jobs: usize,

    /// Resolve and print the tree without installing.
    #[serde(default)]
    pub no_install: bool,

    #[serde(default)]
    pub tests: TestConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            requirements: default_requirements(),
            cache_dir: default_cache_dir(),
            install_dir: default_install_dir(),
            jobs: default_jobs(),
            resolve_jobs: default_resolve_jobs(),
            no_install: false,
            tests: TestConfig::default(),
            sources: SourcesConfig::default(),
            install: InstallConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

fn default_requirements() -> PathBuf {
    PathBuf::from("cpanfile")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".pandeps").join("cache")
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("local")
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

fn default_resolve_jobs() -> usize {
    8
}

fn default_true() -> bool {
    true
}

/// Which modules run their test suites during installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Skip tests for every module.
    #[serde(default)]
    pub never: bool,

    /// Modules installed without running tests.
    #[serde(default)]
    pub skip: BTreeSet<String>,
}

impl TestConfig {
    pub fn skip_tests(&self, module: &str) -> bool {
        self.never || self.skip.contains(module)
    }
}

/// Repositories consulted during resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub default_cpan: bool,

    #[serde(default = "default_true")]
    pub default_backpan: bool,

    /// Extra CPAN mirrors, optionally `N:`-prefixed with a priority.
    #[serde(default)]
    pub cpan: Vec<String>,

    /// Extra BackPAN mirrors.
    #[serde(default)]
    pub backpan: Vec<String>,

    /// Live-query (SmartPAN) servers.
    #[serde(default)]
    pub smart: Vec<String>,

    /// Fall back to the external resolver command.
    #[serde(default)]
    pub metacpan: bool,

    /// Archive mirrors checked for archives found by the external resolver, in order.
    #[serde(default = "default_archive_mirrors")]
    pub archive_mirrors: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_cpan: true,
            default_backpan: true,
            cpan: Vec::new(),
            backpan: Vec::new(),
            smart: Vec::new(),
            metacpan: false,
            archive_mirrors: default_archive_mirrors(),
        }
    }
}

fn default_archive_mirrors() -> Vec<String> {
    vec![CPAN_URL.to_string(), BACKPAN_URL.to_string()]
}

/// External installer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_tool")]
    pub command: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: default_tool(),
        }
    }
}

/// External resolver invocation used by the `metacpan` source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_tool")]
    pub command: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            command: default_tool(),
        }
    }
}

fn default_tool() -> String {
    "cpanm".to_string()
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            PandepsError::Config {
                message: format!("Failed to parse {CONFIG_FILE}: {e}"),
            }
            .into()
        })
    }

    /// Load `pandeps.toml` from `project_root`, or return defaults if the file doesn't exist.
    pub fn load(project_root: &Path) -> miette::Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| PandepsError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    /// Reject settings that would stall the run.
    pub fn validate(&self) -> miette::Result<()> {
        if self.jobs == 0 || self.resolve_jobs == 0 {
            return Err(PandepsError::Config {
                message: "jobs and resolve-jobs must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Log the effective configuration.
    pub fn dump(&self) {
        tracing::info!("pandeps configuration:");
        tracing::info!("=> Requirements: {}", self.requirements.display());
        tracing::info!("=> Cache dir: {}", self.cache_dir.display());
        tracing::info!("=> Install dir: {}", self.install_dir.display());
        tracing::info!("=> Parallelism: {} install, {} resolve", self.jobs, self.resolve_jobs);
        tracing::info!("=> NoInstall: {}", self.no_install);
        if self.tests.never {
            tracing::info!("=> Tests: ALL tests are disabled");
        } else {
            for m in &self.tests.skip {
                tracing::info!("=> Tests disabled for {m}");
            }
        }
    }
}
