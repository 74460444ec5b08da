//! Shared registries that give resolve, fetch and install their
//! exactly-once semantics.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pandeps_core::dependency::{Dependency, Module};
use tokio::sync::OnceCell;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a keyed operation at most once. Concurrent callers for the same key
/// wait for the first invocation and receive a clone of its result.
#[derive(Debug)]
pub struct DedupRegistry<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for DedupRegistry<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> DedupRegistry<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` for `key` unless it has already run or is running.
    pub async fn run<F, Fut>(&self, key: K, op: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = Arc::clone(lock(&self.cells).entry(key).or_default());
        cell.get_or_init(op).await.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.cells).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.cells).is_empty()
    }
}

/// Outcome of publishing a freshly found module into the [`ResolutionTable`].
#[derive(Debug)]
pub enum Claim {
    /// The caller owns the module and must fetch and expand it.
    New(Arc<Module>),
    /// An equivalent module is already published; use it instead.
    Existing(Arc<Module>),
    /// The name is already resolved at a version the dependency rejects.
    Conflict(Arc<Module>),
}

#[derive(Debug, Default)]
struct Tables {
    /// `name-version` and `name-version~source` keys.
    by_key: HashMap<String, Arc<Module>>,
    by_name: HashMap<String, Arc<Module>>,
}

/// Process-wide table of resolved modules.
#[derive(Debug, Default)]
pub struct ResolutionTable {
    tables: Mutex<Tables>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A published module for the dependency's `name-version` key, provided
    /// its version still satisfies the constraint.
    pub fn lookup(&self, dep: &Dependency) -> Option<Arc<Module>> {
        let tables = lock(&self.tables);
        tables
            .by_key
            .get(&dep.key())
            .filter(|m| dep.matches_version(&m.version))
            .cloned()
    }

    /// Atomically publish `found` for `dep`, or hand back what is already there.
    pub fn claim(&self, found: Arc<Module>, dep: &Dependency) -> Claim {
        let mut tables = lock(&self.tables);

        for key in [found.source_key(), found.key()] {
            if let Some(existing) = tables.by_key.get(&key) {
                return Claim::Existing(Arc::clone(existing));
            }
        }
        if let Some(existing) = tables.by_name.get(&found.name) {
            if dep.matches_version(&existing.version) {
                return Claim::Existing(Arc::clone(existing));
            }
            return Claim::Conflict(Arc::clone(existing));
        }

        tables.by_key.insert(found.source_key(), Arc::clone(&found));
        tables.by_key.insert(found.key(), Arc::clone(&found));
        tables.by_key.insert(dep.key(), Arc::clone(&found));
        tables.by_name.insert(found.name.clone(), Arc::clone(&found));
        Claim::New(found)
    }

    /// Number of distinct module names resolved.
    pub fn len(&self) -> usize {
        lock(&self.tables).by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn module(name: &str, version: &str, source: &str) -> Arc<Module> {
        Arc::new(Module::new(
            name,
            version,
            source,
            format!("authors/id/X/XX/XX/{name}-{version}.tar.gz"),
        ))
    }

    #[tokio::test]
    async fn dedup_runs_once_for_concurrent_callers() {
        let registry = Arc::new(DedupRegistry::<String, usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                registry
                    .run("key".to_string(), || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        calls.fetch_add(1, Ordering::SeqCst) + 1
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn dedup_keys_are_independent() {
        let registry = DedupRegistry::<&str, &str>::new();
        assert_eq!(registry.run("a", || async { "first" }).await, "first");
        assert_eq!(registry.run("b", || async { "second" }).await, "second");
        assert_eq!(registry.run("a", || async { "ignored" }).await, "first");
    }

    #[test]
    fn claim_new_then_existing() {
        let table = ResolutionTable::new();
        let dep = Dependency::parse("Foo", ">= 1.0");
        let first = module("Foo", "1.2", "http://a");
        let Claim::New(published) = table.claim(Arc::clone(&first), &dep) else {
            panic!("expected a new claim");
        };
        assert!(Arc::ptr_eq(&published, &first));

        let again = module("Foo", "1.2", "http://a");
        let Claim::Existing(existing) = table.claim(again, &dep) else {
            panic!("expected the published module");
        };
        assert!(Arc::ptr_eq(&existing, &first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn same_version_from_another_source_reuses() {
        let table = ResolutionTable::new();
        let dep = Dependency::parse("Foo", "");
        let first = module("Foo", "1.2", "http://a");
        table.claim(Arc::clone(&first), &dep);
        let Claim::Existing(existing) = table.claim(module("Foo", "1.2", "http://b"), &dep) else {
            panic!("expected reuse");
        };
        assert!(Arc::ptr_eq(&existing, &first));
    }

    #[test]
    fn incompatible_version_conflicts() {
        let table = ResolutionTable::new();
        table.claim(module("Foo", "1.2", "http://a"), &Dependency::parse("Foo", ""));

        let compatible = Dependency::parse("Foo", ">= 1.0");
        assert!(matches!(
            table.claim(module("Foo", "2.0", "http://a"), &compatible),
            Claim::Existing(_)
        ));

        let strict = Dependency::parse("Foo", "== 2.0");
        let Claim::Conflict(existing) = table.claim(module("Foo", "2.0", "http://a"), &strict)
        else {
            panic!("expected a conflict");
        };
        assert_eq!(existing.version, "1.2");
    }

    #[test]
    fn lookup_by_dependency_key() {
        let table = ResolutionTable::new();
        let dep = Dependency::parse("Foo", ">= 1.0");
        let first = module("Foo", "1.2", "http://a");
        table.claim(Arc::clone(&first), &dep);

        let hit = table.lookup(&Dependency::parse("Foo", "1.0")).unwrap();
        assert!(Arc::ptr_eq(&hit, &first));
        assert!(table.lookup(&Dependency::parse("Foo", "== 1.0")).is_none());
        assert!(table.lookup(&Dependency::parse("Bar", "1.0")).is_none());
        assert_eq!(table.len(), 1);
    }
}
