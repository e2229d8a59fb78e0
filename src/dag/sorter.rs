use crate::diag::{ErrorList, Pos};
use indexmap::IndexMap;
use itertools::Itertools;

struct Node {
    pos: Option<Pos>,
    deps: Vec<String>,
}

/// A deterministic topological sorter over named nodes. `kind` names what
/// is being sorted ("struct", "import") and appears in diagnostics.
pub struct Sorter {
    kind: String,
    nodes: IndexMap<String, Node>,
}

impl Sorter {
    pub fn new(kind: impl Into<String>) -> Self {
        Sorter {
            kind: kind.into(),
            nodes: IndexMap::new(),
        }
    }

    /// Registers a node and the names it depends on. Adding a name twice
    /// is a bug in the caller.
    pub fn add_node(
        &mut self,
        name: &str,
        pos: Option<Pos>,
        deps: Vec<String>,
    ) {
        if self.nodes.contains_key(name) {
            panic!("node {name} added twice");
        }
        self.nodes.insert(name.to_string(), Node { pos, deps });
    }

    /// Orders the nodes so every dependency precedes its dependents.
    /// Within a layer, ties break by lexical name order. Unknown
    /// dependencies are reported and treated as satisfied; on a cycle the
    /// shortest circle is reported and the partial order returned.
    pub fn sort(&self, errs: &mut ErrorList) -> Vec<String> {
        // keep only dependencies that name real nodes
        let mut deps: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (name, node) in &self.nodes {
            let mut known = Vec::new();
            for dep in &node.deps {
                if self.nodes.contains_key(dep) {
                    known.push(dep.clone());
                    dependents
                        .entry(dep.as_str())
                        .or_default()
                        .push(name.as_str());
                } else {
                    errs.error(
                        node.pos.as_ref(),
                        format!("{} {} is not defined", self.kind, dep),
                    );
                }
            }
            deps.insert(name.clone(), known);
        }

        let mut npending: IndexMap<&str, usize> = deps
            .iter()
            .map(|(name, d)| (name.as_str(), d.len()))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut layer: Vec<&str> = npending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();

        while !layer.is_empty() {
            layer.sort_unstable();
            let mut next = Vec::new();
            for name in layer {
                order.push(name.to_string());
                for dependent in
                    dependents.get(name).into_iter().flatten()
                {
                    let n = npending.get_mut(dependent).unwrap();
                    *n -= 1;
                    if *n == 0 {
                        next.push(*dependent);
                    }
                }
            }
            layer = next;
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<String> = npending
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(name, _)| name.to_string())
                .sorted_unstable()
                .collect();
            let circle = super::shortest_circle(&deps, &stuck);
            assert!(!circle.is_empty(), "unsorted nodes but no circle");

            let pos = self.nodes[&circle[0]].pos.clone();
            errs.error(
                pos.as_ref(),
                format!(
                    "{} has circle: {}",
                    self.kind,
                    circle.join("->")
                ),
            );
        }

        order
    }
}
