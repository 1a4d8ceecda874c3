use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error that can occur when resolving dependencies
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("Required plugin not found: {0}")]
    MissingPlugin(String),

    /// Dependency cycle detected
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Other dependency resolution error
    #[error("Dependency error: {0}")]
    Other(String),
}

/// How a plugin is treated when one of its dependencies is unavailable
/// (missing, failed, skipped or part of a cycle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Dependencies are attempted first, the plugin is initialized regardless
    #[default]
    BestEffort,
    /// The plugin is skipped unless every dependency ended up initialized
    Strict,
}

/// A declared dependency that has no registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    /// The plugin declaring the dependency
    pub plugin: String,
    /// The absent dependency name
    pub dependency: String,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' requires missing plugin '{}'", self.plugin, self.dependency)
    }
}

/// Outcome of a resolution order computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Plugins to initialize, every dependency before its dependents
    pub order: Vec<String>,
    /// Dependencies declared by reachable plugins but absent from the graph
    pub missing: Vec<MissingDependency>,
    /// Each cycle's members in discovery order, first member repeated at the end
    pub cycles: Vec<Vec<String>>,
}

impl ResolutionPlan {
    /// Whether `name` is a member of a detected cycle
    pub fn in_cycle(&self, name: &str) -> bool {
        self.cycle_of(name).is_some()
    }

    pub fn cycle_of(&self, name: &str) -> Option<&[String]> {
        self.cycles
            .iter()
            .find(|cycle| cycle.iter().any(|member| member == name))
            .map(Vec::as_slice)
    }
}

/// Dependency relation between registered plugins.
///
/// Nodes are sorted by name so resolution is reproducible, although callers
/// must not rely on the relative order of independent plugins.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    ids: HashMap<String, usize>,
    /// node -> dependencies present in the graph
    edges: Vec<Vec<usize>>,
    /// node -> dependencies absent from the graph
    missing: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Build from `(plugin, dependencies)` pairs.
    pub fn new<I, N, D, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut declared: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, deps) in nodes {
            declared
                .entry(name.into())
                .or_default()
                .extend(deps.into_iter().map(Into::into));
        }

        let names: Vec<String> = declared.keys().cloned().collect();
        let ids: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();

        let mut edges = Vec::with_capacity(names.len());
        let mut missing = Vec::with_capacity(names.len());
        for deps in declared.values() {
            let mut present = Vec::new();
            let mut absent = Vec::new();
            for dep in deps {
                match ids.get(dep) {
                    Some(&dep_id) => present.push(dep_id),
                    None => absent.push(dep.clone()),
                }
            }
            edges.push(present);
            missing.push(absent);
        }

        Self {
            names,
            ids,
            edges,
            missing,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// Registered plugins that list `name` as a dependency.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        let Some(&target) = self.ids.get(name) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(id, _)| self.names[id].as_str())
            .collect()
    }

    /// Compute the initialization order for `roots` and everything they reach.
    ///
    /// `settled` marks nodes that need no work (already initialized); they are
    /// neither traversed nor part of the order. Unknown roots are ignored. The
    /// members of every strongly connected component larger than one node (or
    /// with a self edge) are reported as a cycle and left out of the order;
    /// plugins depending on a cycle member are still ordered.
    pub fn resolve<I, S>(&self, roots: I, settled: impl Fn(&str) -> bool) -> ResolutionPlan
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tarjan = Tarjan::new(self, &settled);
        for root in roots {
            if let Some(&root_id) = self.ids.get(root.as_ref()) {
                tarjan.run(root_id);
            }
        }
        log::debug!(
            "Resolved order {:?} (missing: {}, cycles: {})",
            tarjan.plan.order,
            tarjan.plan.missing.len(),
            tarjan.plan.cycles.len()
        );
        tarjan.plan
    }
}

const UNVISITED: usize = usize::MAX;

/// Iterative Tarjan strongly connected components. Components are emitted
/// after everything they depend on, which is exactly initialization order.
struct Tarjan<'g, F: Fn(&str) -> bool> {
    graph: &'g DependencyGraph,
    settled: &'g F,
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    component_stack: Vec<usize>,
    /// (node, position of the next edge to explore)
    call_stack: Vec<(usize, usize)>,
    next_index: usize,
    plan: ResolutionPlan,
}

impl<'g, F: Fn(&str) -> bool> Tarjan<'g, F> {
    fn new(graph: &'g DependencyGraph, settled: &'g F) -> Self {
        let n = graph.len();
        Self {
            graph,
            settled,
            index: vec![UNVISITED; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            component_stack: Vec::new(),
            call_stack: Vec::new(),
            next_index: 0,
            plan: ResolutionPlan::default(),
        }
    }

    fn is_settled(&self, id: usize) -> bool {
        (self.settled)(&self.graph.names[id])
    }

    fn visit(&mut self, id: usize) {
        self.index[id] = self.next_index;
        self.lowlink[id] = self.next_index;
        self.next_index += 1;
        self.component_stack.push(id);
        self.on_stack[id] = true;
        self.call_stack.push((id, 0));

        for dependency in &self.graph.missing[id] {
            self.plan.missing.push(MissingDependency {
                plugin: self.graph.names[id].clone(),
                dependency: dependency.clone(),
            });
        }
    }

    fn run(&mut self, root: usize) {
        if self.index[root] != UNVISITED || self.is_settled(root) {
            return;
        }
        self.visit(root);

        while let Some(frame) = self.call_stack.last_mut() {
            let node = frame.0;
            if let Some(&dep) = self.graph.edges[node].get(frame.1) {
                frame.1 += 1;
                if self.is_settled(dep) {
                    continue;
                }
                if self.index[dep] == UNVISITED {
                    self.visit(dep);
                } else if self.on_stack[dep] {
                    self.lowlink[node] = self.lowlink[node].min(self.index[dep]);
                }
                continue;
            }

            self.call_stack.pop();
            if let Some(&(parent, _)) = self.call_stack.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if self.lowlink[node] == self.index[node] {
                self.emit_component(node);
            }
        }
    }

    fn emit_component(&mut self, root: usize) {
        let mut component = Vec::new();
        while let Some(member) = self.component_stack.pop() {
            self.on_stack[member] = false;
            component.push(member);
            if member == root {
                break;
            }
        }

        let self_edge = self.graph.edges[root].contains(&root);
        if component.len() == 1 && !self_edge {
            self.plan.order.push(self.graph.names[root].clone());
            return;
        }

        component.sort_by_key(|&member| self.index[member]);
        let mut cycle: Vec<String> = component
            .iter()
            .map(|&member| self.graph.names[member].clone())
            .collect();
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
        self.plan.cycles.push(cycle);
    }
}
