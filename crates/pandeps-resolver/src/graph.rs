//! Graph view of a resolved dependency tree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pandeps_core::dependency::{DependencyList, Module};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;

/// The resolved modules reachable from a root list, with an edge from each
/// module to every module its dependencies resolved to.
pub struct ResolvedGraph {
    graph: DiGraph<Arc<Module>, ()>,
    /// `name-version~source` to node.
    index: HashMap<String, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl ResolvedGraph {
    /// Build the graph from a resolved root list. Unresolved entries are skipped.
    pub fn from_list(list: &DependencyList) -> Self {
        Self::from_roots(list.entries().iter().filter_map(|dep| dep.module()))
    }

    /// Build the graph reachable from `roots`.
    pub fn from_roots<'a>(roots: impl IntoIterator<Item = &'a Arc<Module>>) -> Self {
        let mut g = Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            roots: Vec::new(),
        };
        for module in roots {
            let idx = g.add_module(module);
            if !g.roots.contains(&idx) {
                g.roots.push(idx);
            }
        }
        g
    }

    fn add_module(&mut self, module: &Arc<Module>) -> NodeIndex {
        let key = module.source_key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(Arc::clone(module));
        self.index.insert(key, idx);

        if let Some(deps) = module.dependencies() {
            for dep in deps.entries() {
                if let Some(child) = dep.module() {
                    let child = self.add_module(child);
                    if !self.graph.edges(idx).any(|e| e.target() == child) {
                        self.graph.add_edge(idx, child, ());
                    }
                }
            }
        }
        idx
    }

    /// Children in insertion order. petgraph yields the most recent edge first.
    fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        children.reverse();
        children
    }

    /// Every dependency cycle, each as `name-version` keys starting and ending
    /// at the same module.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        for component in tarjan_scc(&self.graph) {
            let Some(&start) = component.iter().min() else {
                continue;
            };
            let looped = component.len() > 1 || self.graph.contains_edge(start, start);
            if !looped {
                continue;
            }
            let members: HashSet<NodeIndex> = component.into_iter().collect();
            let mut path = vec![start];
            let mut seen = HashSet::new();
            if self.path_back(start, start, &members, &mut path, &mut seen) {
                cycles.push(path.iter().map(|&i| self.graph[i].key()).collect());
            }
        }
        cycles.sort();
        cycles
    }

    /// Extend `path` from its last node to `target`, staying inside `members`.
    fn path_back(
        &self,
        target: NodeIndex,
        from: NodeIndex,
        members: &HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        seen: &mut HashSet<NodeIndex>,
    ) -> bool {
        for child in self.children(from) {
            if !members.contains(&child) {
                continue;
            }
            if child == target {
                path.push(child);
                return true;
            }
            if seen.insert(child) {
                path.push(child);
                if self.path_back(target, child, members, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Every module, each after all of its dependencies.
    pub fn install_order(&self) -> Vec<Arc<Module>> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut dfs = DfsPostOrder::empty(&self.graph);
        for &root in &self.roots {
            dfs.move_to(root);
            while let Some(idx) = dfs.next(&self.graph) {
                order.push(Arc::clone(&self.graph[idx]));
            }
        }
        order
    }

    /// Render the tree with box-drawing connectors, one module per line.
    pub fn print_tree(&self) -> String {
        let mut output = String::new();
        let mut visited = HashSet::new();
        let count = self.roots.len();
        for (i, &root) in self.roots.iter().enumerate() {
            self.print_subtree(&mut output, root, "", i == count - 1, &mut visited);
        }
        output
    }

    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let module = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{module}\n"));

        // A module already on the current branch closes a cycle.
        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.children(idx);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(output, child, &child_prefix, i == count - 1, visited);
        }

        visited.remove(&idx);
    }

    /// Number of distinct modules.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandeps_core::dependency::Dependency;

    fn module(name: &str, version: &str) -> Arc<Module> {
        Arc::new(Module::new(
            name,
            version,
            "http://cpan",
            format!("authors/id/X/XX/XX/{name}-{version}.tar.gz"),
        ))
    }

    fn attach(parent: &Arc<Module>, children: &[&Arc<Module>]) {
        let mut list = DependencyList::for_module(parent);
        for child in children {
            assert!(list.add(Dependency::parse(&child.name, "")), "{} was filtered", child.name);
        }
        for (dep, child) in list.entries().iter().zip(children) {
            dep.resolve_to(Arc::clone(child)).unwrap();
        }
        parent.set_dependencies(Arc::new(list));
    }

    fn root(modules: &[&Arc<Module>]) -> DependencyList {
        let root: DependencyList = modules
            .iter()
            .map(|m| Dependency::parse(&m.name, ""))
            .collect();
        assert_eq!(root.len(), modules.len());
        for (dep, m) in root.entries().iter().zip(modules) {
            dep.resolve_to(Arc::clone(m)).unwrap();
        }
        root
    }

    /// Alpha -> {Beta, Gamma}, Beta -> Delta, Gamma -> Delta
    fn diamond() -> DependencyList {
        let (a, b, c, d) = (
            module("Alpha", "1"),
            module("Beta", "1"),
            module("Gamma", "1"),
            module("Delta", "1"),
        );
        attach(&d, &[]);
        attach(&b, &[&d]);
        attach(&c, &[&d]);
        attach(&a, &[&b, &c]);
        root(&[&a])
    }

    #[test]
    fn install_order_is_dependencies_first() {
        let g = ResolvedGraph::from_list(&diamond());
        assert_eq!(g.len(), 4);
        let order: Vec<String> = g.install_order().iter().map(|m| m.name.clone()).collect();
        let pos = |n: &str| order.iter().position(|m| m == n).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("Delta") < pos("Beta"));
        assert!(pos("Delta") < pos("Gamma"));
        assert!(pos("Beta") < pos("Alpha"));
        assert!(pos("Gamma") < pos("Alpha"));
    }

    #[test]
    fn tree_printing() {
        let g = ResolvedGraph::from_list(&diamond());
        let tree = g.print_tree();
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], "└── Alpha (1) from http://cpan");
        assert_eq!(lines[1], "    ├── Beta (1) from http://cpan");
        assert_eq!(lines[2], "    │   └── Delta (1) from http://cpan");
        assert_eq!(lines[3], "    └── Gamma (1) from http://cpan");
        assert_eq!(lines[4], "        └── Delta (1) from http://cpan");
    }

    #[test]
    fn diamond_has_no_cycles() {
        assert!(ResolvedGraph::from_list(&diamond()).cycles().is_empty());
    }

    #[test]
    fn cycle_between_root_modules() {
        let (x, y) = (module("Xa", "1.0"), module("Yb", "1.0"));
        attach(&x, &[&y]);
        attach(&y, &[&x]);
        let g = ResolvedGraph::from_list(&root(&[&x, &y]));

        assert_eq!(g.cycles(), [["Xa-1.0", "Yb-1.0", "Xa-1.0"]]);
        let tree = g.print_tree();
        assert_eq!(tree.lines().count(), 6);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let x = module("Xa", "1.0");
        attach(&x, &[&x]);
        let g = ResolvedGraph::from_roots([&x]);
        assert_eq!(g.cycles(), [["Xa-1.0", "Xa-1.0"]]);
    }

    #[test]
    fn unresolved_roots_are_skipped() {
        let root: DependencyList = [Dependency::parse("Alpha", "")].into_iter().collect();
        let g = ResolvedGraph::from_list(&root);
        assert!(g.is_empty());
        assert!(g.print_tree().is_empty());
    }
}
