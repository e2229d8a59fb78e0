//! Deterministic DAG ordering: a topological sorter used to order imports
//! and struct definitions, and a layered map backing the DAG visualizer.

pub mod map;
pub mod sorter;

pub use map::{is_dag, Graph, Map, MapError, MapNode};
pub use sorter::Sorter;

use indexmap::IndexMap;
use std::collections::VecDeque;

/// Finds a shortest cycle among the candidate nodes, following the given
/// adjacency. Returns the cycle as a path whose first name repeats at the
/// end, e.g. `[A, B, A]`. Candidates are tried in the order given, so a
/// name-sorted input makes the result deterministic.
pub(crate) fn shortest_circle(
    adj: &IndexMap<String, Vec<String>>,
    candidates: &[String],
) -> Vec<String> {
    let mut best: Vec<String> = Vec::new();

    for start in candidates {
        let mut parents: IndexMap<&str, &str> = IndexMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start);

        'bfs: while let Some(cur) = queue.pop_front() {
            let Some(nexts) = adj.get(cur) else { continue };
            for next in nexts {
                if next == start {
                    let mut path = vec![start.clone()];
                    let mut at = cur;
                    let mut rev = Vec::new();
                    while at != start.as_str() {
                        rev.push(at.to_string());
                        at = parents[at];
                    }
                    rev.reverse();
                    path.extend(rev);
                    path.push(start.clone());

                    if best.is_empty() || path.len() < best.len() {
                        best = path;
                    }
                    break 'bfs;
                }
                if !parents.contains_key(next.as_str()) {
                    parents.insert(next, cur);
                    queue.push_back(next);
                }
            }
        }
    }

    best
}
