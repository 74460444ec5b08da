//! The resolution graph model: dependencies, dependency lists, and modules.
//!
//! A [`Dependency`] is an unresolved requirement. Resolution binds it exactly
//! once to a shared [`Module`]; a module in turn owns the [`DependencyList`]
//! built from its own metadata, so the resolved requirements form a tree of
//! `Arc`-shared nodes that the installer walks afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::version::VersionConstraint;

/// Modules shipped with perl itself. Requirements on these are never resolved
/// or installed.
pub const CORE_MODULES: &[&str] = &[
    "perl",
    "strict",
    "warnings",
    "utf8",
    "vars",
    "lib",
    "base",
    "parent",
    "constant",
    "overload",
    "integer",
    "bytes",
    "feature",
    "version",
    "B",
    "Carp",
    "Config",
    "Cwd",
    "Data::Dumper",
    "Encode",
    "Errno",
    "Exporter",
    "ExtUtils::MakeMaker",
    "Fcntl",
    "File::Basename",
    "File::Copy",
    "File::Find",
    "File::Path",
    "File::Spec",
    "File::Spec::Functions",
    "File::Temp",
    "FindBin",
    "Getopt::Long",
    "IO::File",
    "IO::Handle",
    "IPC::Open3",
    "List::Util",
    "MIME::Base64",
    "POSIX",
    "Scalar::Util",
    "Storable",
    "Sys::Hostname",
    "Test::Builder",
    "Test::More",
    "Text::ParseWords",
    "Tie::Hash",
    "Time::HiRes",
    "Time::Local",
];

/// Whether `name` is a module bundled with perl.
pub fn is_core_module(name: &str) -> bool {
    CORE_MODULES.contains(&name)
}

/// An unresolved requirement: a module name plus a version constraint.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub constraint: VersionConstraint,
    /// Extra requirements that belong to the resolved module's own
    /// dependency list (from a `# REQS:` directive), not to this list.
    pub additional: Vec<Dependency>,
    module: OnceLock<Arc<Module>>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            additional: Vec::new(),
            module: OnceLock::new(),
        }
    }

    /// Build a dependency from a name and a raw constraint string such as `">= 1.0"`.
    pub fn parse(name: impl Into<String>, constraint: &str) -> Self {
        Self::new(name, VersionConstraint::parse(constraint))
    }

    pub fn with_additional(mut self, additional: Vec<Dependency>) -> Self {
        self.additional = additional;
        self
    }

    /// The module this dependency resolved to, if resolution has happened.
    pub fn module(&self) -> Option<&Arc<Module>> {
        self.module.get()
    }

    /// Bind this dependency to its resolved module.
    ///
    /// A dependency resolves at most once; a second binding is refused and
    /// the rejected module is handed back.
    pub fn resolve_to(&self, module: Arc<Module>) -> Result<(), Arc<Module>> {
        self.module.set(module)
    }

    /// `name-version` key using the constraint's version.
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.constraint.version)
    }

    /// Whether `version` satisfies this dependency's constraint.
    pub fn matches_version(&self, version: &str) -> bool {
        self.constraint.matches(version)
    }

    /// A fresh, unresolved copy that keeps name, constraint and directives.
    pub fn unresolved(&self) -> Self {
        Self {
            name: self.name.clone(),
            constraint: self.constraint.clone(),
            additional: self.additional.iter().map(Dependency::unresolved).collect(),
            module: OnceLock::new(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.constraint)
    }
}

/// An ordered list of dependencies, owned either by the root requirement set
/// or by a resolved module.
#[derive(Debug, Default)]
pub struct DependencyList {
    entries: Vec<Arc<Dependency>>,
    owner: Option<String>,
}

impl DependencyList {
    /// An empty root list.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty list owned by `module`.
    pub fn for_module(module: &Module) -> Self {
        Self {
            entries: Vec::new(),
            owner: Some(module.key()),
        }
    }

    /// Append a dependency unless it names a core module.
    /// Returns whether the dependency was added.
    pub fn add(&mut self, dep: Dependency) -> bool {
        if is_core_module(&dep.name) {
            tracing::trace!("Dependency {} is from perl core", dep.name);
            return false;
        }
        self.entries.push(Arc::new(dep));
        true
    }

    pub fn entries(&self) -> &[Arc<Dependency>] {
        &self.entries
    }

    /// `name-version` of the owning module, `None` for the root list.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Dependency> for DependencyList {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        let mut list = Self::new();
        for dep in iter {
            list.add(dep);
        }
        list
    }
}

/// A concrete, versioned distribution found in a specific source.
///
/// Modules are created by sources and become shared identity keys once
/// published into the resolution table. The only later mutation is the
/// one-time attachment of the module's own dependency list.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub version: String,
    /// Base URL of the source the module was found in.
    pub source_url: String,
    /// Archive location relative to `source_url`, e.g. `authors/id/F/FO/FOO/Foo-1.2.tar.gz`.
    pub archive_url: String,
    dependencies: OnceLock<Arc<DependencyList>>,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source_url: impl Into<String>,
        archive_url: impl Into<String>,
    ) -> Self {
        let source_url: String = source_url.into();
        let archive_url: String = archive_url.into();
        Self {
            name: name.into(),
            version: version.into(),
            source_url: source_url.trim_end_matches('/').to_string(),
            archive_url: archive_url.trim_start_matches('/').to_string(),
            dependencies: OnceLock::new(),
        }
    }

    /// `name-version`
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `name-version~source`: identity of this exact artifact.
    pub fn source_key(&self) -> String {
        format!("{}-{}~{}", self.name, self.version, self.source_url)
    }

    /// Cache identity, shared by every module that maps to the same cached archive.
    pub fn cache_key(&self) -> &str {
        &self.archive_url
    }

    /// Full URL of the archive.
    pub fn download_url(&self) -> String {
        format!("{}/{}", self.source_url, self.archive_url)
    }

    /// Where the archive is stored below `cache_root`.
    pub fn cached_path(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(&self.archive_url)
    }

    /// Directory the archive is downloaded into and extracted in.
    pub fn download_dir(&self, cache_root: &Path) -> PathBuf {
        let cached = self.cached_path(cache_root);
        cached
            .parent()
            .map_or_else(|| cache_root.to_path_buf(), Path::to_path_buf)
    }

    /// Directory the archive unpacks to: the archive name without `.tar.gz`/`.tgz`.
    pub fn extracted_path(&self, cache_root: &Path) -> PathBuf {
        let file = self
            .archive_url
            .rsplit('/')
            .next()
            .unwrap_or(&self.archive_url);
        let stem = file
            .strip_suffix(".tar.gz")
            .or_else(|| file.strip_suffix(".tgz"))
            .unwrap_or(file);
        self.download_dir(cache_root).join(stem)
    }

    /// The module's own dependencies, once resolution has expanded it.
    pub fn dependencies(&self) -> Option<&Arc<DependencyList>> {
        self.dependencies.get()
    }

    /// Attach the module's dependency list. Only the first call has effect.
    pub fn set_dependencies(&self, list: Arc<DependencyList>) -> bool {
        self.dependencies.set(list).is_ok()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) from {}", self.name, self.version, self.source_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo() -> Module {
        Module::new(
            "Foo::Bar",
            "1.2",
            "http://www.cpan.org/",
            "/authors/id/F/FO/FOO/Foo-Bar-1.2.tar.gz",
        )
    }

    #[test]
    fn module_keys() {
        let m = foo();
        assert_eq!(m.key(), "Foo::Bar-1.2");
        assert_eq!(m.source_key(), "Foo::Bar-1.2~http://www.cpan.org");
        assert_eq!(m.cache_key(), "authors/id/F/FO/FOO/Foo-Bar-1.2.tar.gz");
        assert_eq!(
            m.download_url(),
            "http://www.cpan.org/authors/id/F/FO/FOO/Foo-Bar-1.2.tar.gz"
        );
    }

    #[test]
    fn module_paths_are_deterministic() {
        let m = foo();
        let root = Path::new("/cache");
        assert_eq!(
            m.cached_path(root),
            PathBuf::from("/cache/authors/id/F/FO/FOO/Foo-Bar-1.2.tar.gz")
        );
        assert_eq!(
            m.download_dir(root),
            PathBuf::from("/cache/authors/id/F/FO/FOO")
        );
        assert_eq!(
            m.extracted_path(root),
            PathBuf::from("/cache/authors/id/F/FO/FOO/Foo-Bar-1.2")
        );
        assert_eq!(m.cached_path(root), foo().cached_path(root));
    }

    #[test]
    fn tgz_extracted_path() {
        let m = Module::new("Baz", "0.1", "http://x", "authors/id/B/BA/BAZ/Baz-0.1.tgz");
        assert_eq!(
            m.extracted_path(Path::new("c")),
            PathBuf::from("c/authors/id/B/BA/BAZ/Baz-0.1")
        );
    }

    #[test]
    fn dependency_resolves_once() {
        let dep = Dependency::parse("Foo::Bar", ">= 1.0");
        let first = Arc::new(foo());
        let second = Arc::new(foo());
        assert!(dep.resolve_to(first.clone()).is_ok());
        assert!(dep.resolve_to(second).is_err());
        assert!(Arc::ptr_eq(dep.module().unwrap(), &first));
    }

    #[test]
    fn dependency_display_and_key() {
        let dep = Dependency::parse("Foo", "== 2.0");
        assert_eq!(dep.to_string(), "Foo (== 2.0)");
        assert_eq!(dep.key(), "Foo-2.0");
    }

    #[test]
    fn list_filters_core_modules() {
        let mut list = DependencyList::new();
        assert!(!list.add(Dependency::parse("strict", "")));
        assert!(!list.add(Dependency::parse("perl", "5.008")));
        assert!(list.add(Dependency::parse("Moo", "2.0")));
        assert_eq!(list.len(), 1);
        assert!(list.owner().is_none());
    }

    #[test]
    fn list_owned_by_module() {
        let m = foo();
        let list = DependencyList::for_module(&m);
        assert_eq!(list.owner(), Some("Foo::Bar-1.2"));
        assert!(list.is_empty());
    }

    #[test]
    fn module_dependencies_attach_once() {
        let m = foo();
        let list: DependencyList = [Dependency::parse("Moo", "")].into_iter().collect();
        assert!(m.set_dependencies(Arc::new(list)));
        assert!(!m.set_dependencies(Arc::new(DependencyList::new())));
        assert_eq!(m.dependencies().unwrap().len(), 1);
    }

    #[test]
    fn unresolved_copy_drops_binding() {
        let dep = Dependency::parse("Foo::Bar", "1.0")
            .with_additional(vec![Dependency::parse("Extra", "0.5")]);
        dep.resolve_to(Arc::new(foo())).unwrap();
        let copy = dep.unresolved();
        assert!(copy.module().is_none());
        assert_eq!(copy.additional.len(), 1);
        assert_eq!(copy.constraint, dep.constraint);
    }
}
