//! Dependency graph helpers over preconditions.

use std::collections::{HashMap, HashSet};

/// Find a cycle in the graph, returning the path if one exists.
///
/// Nodes are visited in the given order and edges in declared order, so the
/// reported cycle is deterministic.
pub(crate) fn find_cycle(nodes: &[String], edges: &HashMap<&str, &[String]>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        Visiting,
        Visited,
    }

    fn dfs<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, &'a [String]>,
        state: &mut HashMap<&'a str, State>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        state.insert(node, State::Visiting);
        path.push(node);

        for dep in edges.get(node).copied().unwrap_or_default() {
            match state.get(dep.as_str()).copied() {
                Some(State::Visiting) => {
                    let start = path.iter().position(|s| *s == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(State::Unvisited) | None => {
                    if let Some(cycle) = dfs(dep.as_str(), edges, state, path) {
                        return Some(cycle);
                    }
                }
                Some(State::Visited) => {}
            }
        }

        path.pop();
        state.insert(node, State::Visited);
        None
    }

    let mut state: HashMap<&str, State> = nodes
        .iter()
        .map(|n| (n.as_str(), State::Unvisited))
        .collect();
    let mut path = Vec::new();

    for node in nodes {
        if state.get(node.as_str()) == Some(&State::Unvisited) {
            if let Some(cycle) = dfs(node.as_str(), edges, &mut state, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

/// Everything reachable from `roots` by following `dependents`, roots included.
pub(crate) fn transitive_closure(
    roots: &[String],
    dependents: &HashMap<String, Vec<String>>,
) -> HashSet<String> {
    let mut result: HashSet<String> = roots.iter().cloned().collect();
    let mut to_visit: Vec<String> = roots.to_vec();

    while let Some(current) = to_visit.pop() {
        if let Some(next) = dependents.get(&current) {
            for dep in next {
                if result.insert(dep.clone()) {
                    to_visit.push(dep.clone());
                }
            }
        }
    }

    result
}
