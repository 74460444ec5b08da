//! Dependencies-first installation of a resolved module tree.
//!
//! Each module is installed by one external command invocation at most. A
//! module's command only starts once every module it depends on has been
//! installed, and the number of commands running at once is bounded.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use pandeps_core::config::{Config, TestConfig};
use pandeps_core::dependency::{DependencyList, Module};
use pandeps_resolver::failure::{Failure, FailureReport};
use pandeps_resolver::graph::ResolvedGraph;
use pandeps_resolver::registry::DedupRegistry;
use pandeps_util::errors::PandepsError;
use pandeps_util::process::{describe_output, CommandBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Attempts at starting the install command before giving up.
pub const SPAWN_ATTEMPTS: u32 = 10;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Output that marks a failed install as harmless, matched case-insensitively.
const BENIGN_PREFIXES: &[&str] = &["plenv: cannot rehash:"];
const BENIGN_SUBSTRINGS: &[&str] = &["text file busy"];

/// How the external installer is invoked.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub command: String,
    pub install_dir: PathBuf,
    pub cache_root: PathBuf,
    pub tests: TestConfig,
    /// Maximum concurrent install commands.
    pub jobs: usize,
}

impl InstallOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.install.command.clone(),
            install_dir: config.install_dir.clone(),
            cache_root: config.cache_dir.clone(),
            tests: config.tests.clone(),
            jobs: config.jobs,
        }
    }
}

/// Whether a failed command's output is one of the known harmless errors.
pub fn is_benign(stdout: &str, stderr: &str) -> bool {
    [stdout, stderr].iter().any(|text| {
        let text = text.to_lowercase();
        BENIGN_PREFIXES.iter().any(|p| text.starts_with(p))
            || BENIGN_SUBSTRINGS.iter().any(|s| text.contains(s))
    })
}

pub struct Installer {
    options: InstallOptions,
    semaphore: Arc<Semaphore>,
    latches: DedupRegistry<String, Result<(), FailureReport>>,
    /// `name-version` and cache keys of installed modules.
    installed: Mutex<HashSet<String>>,
    names: Mutex<HashSet<String>>,
    invocations: AtomicUsize,
}

impl Installer {
    pub fn new(options: InstallOptions) -> Self {
        let jobs = options.jobs.max(1);
        Self {
            options,
            semaphore: Arc::new(Semaphore::new(jobs)),
            latches: DedupRegistry::new(),
            installed: Mutex::new(HashSet::new()),
            names: Mutex::new(HashSet::new()),
            invocations: AtomicUsize::new(0),
        }
    }

    /// Number of distinct module names installed so far.
    pub fn installed_count(&self) -> usize {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of times the install command was started.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn is_installed(&self, module: &Module) -> bool {
        let installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        installed.contains(&module.key()) || installed.contains(module.cache_key())
    }

    fn mark_installed(&self, module: &Module) {
        {
            let mut installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
            installed.insert(module.key());
            installed.insert(module.cache_key().to_string());
        }
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.name.clone());
    }

    /// Install every resolved module of `list` concurrently. Failures of
    /// one entry never stop its siblings. A tree containing a dependency
    /// cycle is rejected before any command runs.
    pub async fn install_list(self: &Arc<Self>, list: Arc<DependencyList>) -> Result<(), FailureReport> {
        reject_cycles(&ResolvedGraph::from_list(&list))?;
        self.install_entries(list).await
    }

    /// Install `module` after its dependencies. Concurrent calls for the same
    /// module wait for the first one and share its outcome.
    pub async fn install(self: &Arc<Self>, module: Arc<Module>) -> Result<(), FailureReport> {
        reject_cycles(&ResolvedGraph::from_roots([&module]))?;
        self.install_module(module).await
    }

    fn install_entries(
        self: &Arc<Self>,
        list: Arc<DependencyList>,
    ) -> BoxFuture<'static, Result<(), FailureReport>> {
        let this = Arc::clone(self);
        async move {
            let mut join_set = JoinSet::new();
            for dep in list.entries() {
                let Some(module) = dep.module() else {
                    tracing::trace!("{dep} is unresolved, nothing to install");
                    continue;
                };
                let this = Arc::clone(&this);
                let module = Arc::clone(module);
                join_set.spawn(async move { this.install_module(module).await });
            }

            let mut report = FailureReport::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(failures)) => report.merge(failures),
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                }
            }
            report.into_result()
        }
        .boxed()
    }

    fn install_module(
        self: &Arc<Self>,
        module: Arc<Module>,
    ) -> BoxFuture<'static, Result<(), FailureReport>> {
        let this = Arc::clone(self);
        async move {
            if this.is_installed(&module) {
                tracing::trace!("{module} is already installed");
                return Ok(());
            }
            let key = module.cache_key().to_string();
            this.latches
                .run(key, || this.install_uncached(Arc::clone(&module)))
                .await
        }
        .boxed()
    }

    async fn install_uncached(self: &Arc<Self>, module: Arc<Module>) -> Result<(), FailureReport> {
        if let Some(deps) = module.dependencies() {
            if let Err(report) = self.install_entries(Arc::clone(deps)).await {
                tracing::error!("Not installing {module}: dependencies failed");
                return Err(report);
            }
        }

        self.run_installer(&module).await.map_err(|message| {
            tracing::error!("Error installing {module}: {message}");
            Failure::Install {
                module: module.key(),
                message,
            }
        })?;

        self.mark_installed(&module);
        pandeps_util::progress::status("Installed", &format!("{} ({})", module.name, module.version));
        Ok(())
    }

    fn command_for(&self, module: &Module) -> CommandBuilder {
        let cache_root = pandeps_util::fs::absolute(&self.options.cache_root)
            .unwrap_or_else(|_| self.options.cache_root.clone());
        let mut cmd = CommandBuilder::new(&self.options.command);
        if self.options.tests.skip_tests(&module.name) {
            cmd = cmd.arg("--notest");
        }
        cmd.arg("-L")
            .arg(&self.options.install_dir)
            .arg(module.cached_path(&self.options.cache_root))
            .env("PERL_CPANM_HOME", cache_root)
    }

    async fn run_installer(&self, module: &Module) -> Result<(), String> {
        let cmd = self.command_for(module);
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        tracing::debug!("Installing {module}: {}", cmd.display());
        pandeps_util::progress::status("Installing", &format!("{} ({})", module.name, module.version));

        let child = spawn_with_retries(&cmd).await.map_err(|e| e.to_string())?;
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let output = child.wait_with_output().await.map_err(|e| e.to_string())?;

        if output.status.success() {
            return Ok(());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_benign(&stdout, &stderr) {
            tracing::warn!("Ignoring harmless installer error for {module}");
            return Ok(());
        }
        Err(format!(
            "{} exited with {}\n{}",
            cmd.display(),
            output.status,
            describe_output(&output)
        ))
    }
}

/// A latch waiting on its own dependent never releases, so cycles must not
/// reach the install stage.
fn reject_cycles(graph: &ResolvedGraph) -> Result<(), FailureReport> {
    let mut report = FailureReport::new();
    for path in graph.cycles() {
        tracing::error!("Not installing circular dependency: {}", path.join(" -> "));
        report.add(Failure::CircularDependency { path });
    }
    report.into_result()
}

async fn spawn_with_retries(cmd: &CommandBuilder) -> Result<tokio::process::Child, PandepsError> {
    let mut attempt = 1;
    loop {
        match cmd.spawn_async() {
            Ok(child) => return Ok(child),
            Err(e) if attempt < SPAWN_ATTEMPTS => {
                tracing::debug!("Failed to start {} (attempt {attempt}): {e}", cmd.display());
                attempt += 1;
                tokio::time::sleep(SPAWN_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}
