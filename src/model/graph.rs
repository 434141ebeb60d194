//! Indicator dependency graph analysis.
//!
//! Builds a directed graph of `calculated indicator → referenced indicator`
//! edges and lists every dependency cycle. The formula expander has its own
//! cycle guard and never needs this pass; the graph exists for the `check`
//! command, which reports cycles to the operator before a batch run.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;

use super::IndicatorIndex;

/// Directed graph of indicator references.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the reference graph for an index. `reference` is the compiled
    /// formula-reference pattern (see [`crate::expand::reference_regex`]);
    /// its first capture group is the referenced code.
    pub fn build(index: &IndicatorIndex, reference: &Regex) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        // Insert nodes in stable order so SCC output is reproducible.
        for code in index.sorted_codes() {
            let idx = graph.add_node(code.to_string());
            nodes.insert(code.to_string(), idx);
        }

        for code in index.sorted_codes() {
            let ind = match index.get(code) {
                Some(ind) => ind,
                None => continue,
            };
            let expr = match &ind.expression {
                Some(expr) => expr,
                None => continue,
            };
            let from = nodes[code];
            for cap in reference.captures_iter(expr) {
                let referenced = cap[1].to_string();
                let to = *nodes
                    .entry(referenced.clone())
                    .or_insert_with(|| graph.add_node(referenced));
                graph.add_edge(from, to, ());
            }
        }

        Self { graph, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `from` references `to` directly.
    pub fn references(&self, from: &str, to: &str) -> bool {
        match (self.nodes.get(from), self.nodes.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// List every dependency cycle as the codes of its strongly connected
    /// component. Single nodes count only when they reference themselves.
    /// Each cycle and the overall listing are sorted for stable diagnostics.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let sccs = tarjan_scc(&self.graph);

        let mut cycles: Vec<Vec<String>> = sccs
            .into_iter()
            .filter(|scc| {
                if scc.len() == 1 {
                    let idx = scc[0];
                    self.graph.find_edge(idx, idx).is_some()
                } else {
                    true
                }
            })
            .map(|scc| {
                let mut codes: Vec<String> = scc
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect();
                codes.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => a.cmp(b),
                });
                codes
            })
            .collect();

        cycles.sort();
        cycles
    }
}
