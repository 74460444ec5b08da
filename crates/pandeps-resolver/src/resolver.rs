//! Concurrent recursive resolution.
//!
//! Every entry of a dependency list is resolved in its own task; a resolved
//! module's metadata becomes a new list that is resolved the same way. The
//! shared [`ResolutionTable`] makes each module resolve once per run, and the
//! chain of modules being expanded is passed down so that a module that
//! requires one of its own ancestors is rejected before it is fetched again.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use pandeps_core::dependency::{Dependency, DependencyList, Module};
use pandeps_sources::meta;
use pandeps_sources::SourceSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::failure::{Failure, FailureReport};
use crate::fetch::Fetcher;
use crate::graph::ResolvedGraph;
use crate::registry::{Claim, ResolutionTable};

/// Default bound on concurrently resolving entries of one list.
pub const MAX_CONCURRENT_RESOLUTIONS: usize = 8;

/// Modules currently being expanded, outermost first.
type Ancestry = Vec<Arc<Module>>;

pub struct Resolver {
    sources: Arc<SourceSet>,
    fetcher: Arc<Fetcher>,
    table: ResolutionTable,
    jobs: usize,
}

impl Resolver {
    pub fn new(sources: Arc<SourceSet>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            sources,
            fetcher,
            table: ResolutionTable::new(),
            jobs: MAX_CONCURRENT_RESOLUTIONS,
        }
    }

    /// Bound the fan-out of each list to `jobs` concurrent entries.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn table(&self) -> &ResolutionTable {
        &self.table
    }

    /// Resolve a root list and everything it transitively requires.
    ///
    /// Sibling branches always run to completion; the report holds every
    /// failure from every level. Cycles that close across sibling branches
    /// are found on the finished tree and reported as well.
    pub async fn resolve(self: &Arc<Self>, list: Arc<DependencyList>) -> Result<(), FailureReport> {
        let mut report = match self.resolve_list(Arc::clone(&list), Vec::new()).await {
            Ok(()) => FailureReport::new(),
            Err(report) => report,
        };
        for path in ResolvedGraph::from_list(&list).cycles() {
            tracing::error!("Circular dependency: {}", path.join(" -> "));
            report.add(Failure::CircularDependency { path });
        }
        report.into_result()
    }

    fn resolve_list(
        self: &Arc<Self>,
        list: Arc<DependencyList>,
        ancestry: Ancestry,
    ) -> BoxFuture<'static, Result<(), FailureReport>> {
        let this = Arc::clone(self);
        async move {
            if list.is_empty() {
                return Ok(());
            }
            tracing::debug!(
                "Resolving {} dependencies of {}",
                list.len(),
                list.owner().unwrap_or("requirements")
            );

            let semaphore = Arc::new(Semaphore::new(this.jobs));
            let mut join_set = JoinSet::new();
            for dep in list.entries().iter().cloned() {
                let this = Arc::clone(&this);
                let sem = Arc::clone(&semaphore);
                let ancestry = ancestry.clone();
                join_set.spawn(async move {
                    let _permit = sem.acquire_owned().await;
                    this.resolve_dependency(dep, ancestry).await
                });
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

    async fn resolve_dependency(
        self: Arc<Self>,
        dep: Arc<Dependency>,
        ancestry: Ancestry,
    ) -> Result<(), FailureReport> {
        if let Some(existing) = self.table.lookup(&dep) {
            tracing::trace!("{dep} already resolved to {existing}");
            check_cycle(&existing, &ancestry)?;
            ignore_additional(&dep, &existing);
            bind(&dep, existing);
            return Ok(());
        }

        let Some(found) = self.sources.find(&dep).await else {
            tracing::error!("{dep} is not satisfiable from any source");
            return Err(Failure::NotFound {
                dependency: dep.to_string(),
                requested_by: ancestry.last().map(|m| m.key()),
            }
            .into());
        };

        let module = match self.table.claim(found, &dep) {
            Claim::New(module) => module,
            Claim::Existing(existing) => {
                tracing::trace!("{dep} reuses {existing}");
                check_cycle(&existing, &ancestry)?;
                ignore_additional(&dep, &existing);
                bind(&dep, existing);
                return Ok(());
            }
            Claim::Conflict(existing) => {
                tracing::error!("{dep} conflicts with {existing}");
                return Err(Failure::VersionConflict {
                    dependency: dep.to_string(),
                    resolved: existing.key(),
                }
                .into());
            }
        };

        check_cycle(&module, &ancestry)?;
        bind(&dep, Arc::clone(&module));
        pandeps_util::progress::status("Resolved", &format!("{dep} => {module}"));

        let extracted = self.fetcher.fetch(&module).await.map_err(|message| {
            tracing::error!("Error fetching {module}: {message}");
            Failure::Fetch {
                module: module.key(),
                message,
            }
        })?;

        let mut deps = DependencyList::for_module(&module);
        for extra in &dep.additional {
            tracing::debug!("Adding {extra} to {module}");
            deps.add(extra.unresolved());
        }
        for req in meta::load_requirements(&extracted) {
            deps.add(req);
        }
        let deps = Arc::new(deps);
        module.set_dependencies(Arc::clone(&deps));

        let mut ancestry = ancestry;
        ancestry.push(module);
        self.resolve_list(deps, ancestry).await
    }
}

/// Reject `module` if it shares a cached archive with one of its ancestors.
fn check_cycle(module: &Arc<Module>, ancestry: &[Arc<Module>]) -> Result<(), Failure> {
    let Some(start) = ancestry
        .iter()
        .position(|a| a.cache_key() == module.cache_key())
    else {
        return Ok(());
    };
    let mut path: Vec<String> = ancestry[start..].iter().map(|m| m.key()).collect();
    path.push(module.key());
    tracing::error!("Circular dependency: {}", path.join(" -> "));
    Err(Failure::CircularDependency { path })
}

/// Extra requirements only join the list of the module they first expanded.
fn ignore_additional(dep: &Dependency, existing: &Module) {
    if !dep.additional.is_empty() {
        let names: Vec<String> = dep.additional.iter().map(ToString::to_string).collect();
        tracing::debug!(
            "{existing} is already resolved, ignoring additional requirements of {dep}: {}",
            names.join(", ")
        );
    }
}

fn bind(dep: &Dependency, module: Arc<Module>) {
    if let Err(rejected) = dep.resolve_to(module) {
        tracing::trace!("{dep} is already bound, ignoring {rejected}");
    }
}
