//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: Tracks forward (out) and reverse (in) edges between cells, and
//! answers the two questions the sheet needs on every mutation: would this
//! change introduce a cycle, and which cells must have their cache cleared.
//! CONTEXT: This is the heart of the engine's consistency guarantees. It
//! does not perform eager recalculation — see `would_create_cycle` and
//! `transitive_dependents` below for why a BFS-with-visited-set is enough
//! and no topological sort is needed.
//!
//! TERMINOLOGY:
//! - out-edges (`precedents`): cells a formula cell references (its inputs).
//!   If C3 = A1 + A2, then out[C3] = {A1, A2}.
//! - in-edges (`dependents`): cells that reference a given cell (reverse
//!   lookup). If C3 = A1 + A2, then in[A1] and in[A2] both contain C3.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::position::Position;

/// Raised by `Sheet::set_cell` when committing the proposed formula would
/// create a cycle. Carries the cycle path for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularDependencyError {
    pub cycle_path: Vec<Position>,
}

impl std::fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Circular reference detected: ")?;
        for (i, pos) in self.cycle_path.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", pos)?;
        }
        Ok(())
    }
}

impl std::error::Error for CircularDependencyError {}

/// Bidirectional edge tracking between cells. The sheet owns cell storage;
/// this graph owns only the edges, keyed by `Position`, so there is never an
/// ownership cycle to worry about (see the module-level crate docs).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    out_edges: HashMap<Position, HashSet<Position>>,
    in_edges: HashMap<Position, HashSet<Position>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            out_edges: HashMap::new(),
            in_edges: HashMap::new(),
        }
    }

    /// Replaces `cell`'s out-edges with `new_precedents`, fixing up the
    /// corresponding in-edges on both the removed and the added neighbours.
    /// Does not check for cycles — call `would_create_cycle` first.
    pub fn set_dependencies(&mut self, cell: Position, new_precedents: HashSet<Position>) {
        self.clear_dependencies(cell);

        if !new_precedents.is_empty() {
            for &prec in &new_precedents {
                self.in_edges.entry(prec).or_default().insert(cell);
            }
            self.out_edges.insert(cell, new_precedents);
        }
    }

    /// Removes all of `cell`'s out-edges, cleaning up the in-edges they left
    /// behind on the old neighbours. Call when a cell becomes non-formula.
    pub fn clear_dependencies(&mut self, cell: Position) {
        if let Some(old_precs) = self.out_edges.remove(&cell) {
            for prec in old_precs {
                if let Some(deps) = self.in_edges.get_mut(&prec) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.in_edges.remove(&prec);
                    }
                }
            }
        }
    }

    pub fn out_edges(&self, cell: Position) -> Option<&HashSet<Position>> {
        self.out_edges.get(&cell)
    }

    pub fn in_edges(&self, cell: Position) -> Option<&HashSet<Position>> {
        self.in_edges.get(&cell)
    }

    /// True iff `cell` has at least one cell depending on it.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.in_edges.get(&cell).is_some_and(|deps| !deps.is_empty())
    }

    /// True iff installing `new_precedents` as `cell`'s out-edges would
    /// create a cycle in the current (acyclic) graph.
    ///
    /// Since the existing graph is acyclic, every cell reachable from `cell`
    /// by following in-edges is exactly the set of cells that transitively
    /// depend on `cell` today. If any of `new_precedents` is in that set (or
    /// is `cell` itself), making `cell` depend on it would close a loop
    /// through that chain. So the check is a single reverse-BFS from `cell`
    /// over in-edges, not a DFS over each candidate precedent's own chain.
    pub fn would_create_cycle(&self, cell: Position, new_precedents: &HashSet<Position>) -> bool {
        if new_precedents.contains(&cell) {
            return true;
        }

        let reachable = self.transitive_dependents(cell);
        new_precedents.iter().any(|p| reachable.contains(p))
    }

    /// All cells transitively depending on `cell` (not including `cell`
    /// itself), found via BFS over in-edges with an explicit visited set —
    /// not a recursive walk, so a long dependency chain can't blow the
    /// call stack.
    pub fn transitive_dependents(&self, cell: Position) -> HashSet<Position> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(deps) = self.in_edges.get(&cell) {
            queue.extend(deps.iter().copied());
        }

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(deps) = self.in_edges.get(&current) {
                for &dep in deps {
                    if !seen.contains(&dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        seen
    }

    /// Like `would_create_cycle`, but also reconstructs the actual cycle
    /// path for the resulting `CircularDependencyError`. Kept separate from
    /// `would_create_cycle` because `Sheet::set_cell` only needs the
    /// reconstruction on the (rare) error path.
    pub fn find_cycle(&self, cell: Position, new_precedents: &HashSet<Position>) -> Option<Vec<Position>> {
        if new_precedents.contains(&cell) {
            return Some(vec![cell, cell]);
        }

        let mut parent: HashMap<Position, Position> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        if let Some(deps) = self.in_edges.get(&cell) {
            for &d in deps {
                parent.insert(d, cell);
                queue.push_back(d);
            }
        }

        let mut target = None;
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if new_precedents.contains(&current) {
                target = Some(current);
                break;
            }
            if let Some(deps) = self.in_edges.get(&current) {
                for &dep in deps {
                    if !seen.contains(&dep) {
                        parent.entry(dep).or_insert(current);
                        queue.push_back(dep);
                    }
                }
            }
        }

        target.map(|t| {
            let mut path = vec![t];
            let mut cur = t;
            while let Some(&p) = parent.get(&cur) {
                path.push(p);
                if p == cell {
                    break;
                }
                cur = p;
            }
            path.reverse();
            path.push(cell);
            path
        })
    }

    pub fn formula_cell_count(&self) -> usize {
        self.out_edges.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.out_edges.values().map(|v| v.len()).sum()
    }

    pub fn clear(&mut self) {
        self.out_edges.clear();
        self.in_edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: u32, col: u32) -> Position {
        Position::new(row, col)
    }

    fn set_of(positions: &[Position]) -> HashSet<Position> {
        positions.iter().copied().collect()
    }

    #[test]
    fn set_and_get_dependencies() {
        let mut graph = DependencyGraph::new();

        // C3 = A1 + A2
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let c3 = pos(2, 0);

        graph.set_dependencies(c3, set_of(&[a1, a2]));

        let precs = graph.out_edges(c3).unwrap();
        assert!(precs.contains(&a1));
        assert!(precs.contains(&a2));
        assert_eq!(precs.len(), 2);

        assert!(graph.in_edges(a1).unwrap().contains(&c3));
        assert!(graph.in_edges(a2).unwrap().contains(&c3));
    }

    #[test]
    fn clear_dependencies_removes_both_directions() {
        let mut graph = DependencyGraph::new();

        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let c3 = pos(2, 0);

        graph.set_dependencies(c3, set_of(&[a1, a2]));
        graph.clear_dependencies(c3);

        assert!(graph.out_edges(c3).is_none());
        assert!(graph.in_edges(a1).is_none());
        assert!(graph.in_edges(a2).is_none());
    }

    #[test]
    fn update_dependencies_replaces_old_edges() {
        let mut graph = DependencyGraph::new();

        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let c3 = pos(2, 0);
        let b1 = pos(0, 1);

        graph.set_dependencies(c3, set_of(&[a1, a2]));
        graph.set_dependencies(c3, set_of(&[b1]));

        let precs = graph.out_edges(c3).unwrap();
        assert_eq!(precs.len(), 1);
        assert!(precs.contains(&b1));

        assert!(graph.in_edges(a1).is_none());
        assert!(graph.in_edges(a2).is_none());
        assert!(graph.in_edges(b1).unwrap().contains(&c3));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        assert!(graph.would_create_cycle(a1, &set_of(&[a1])));
    }

    #[test]
    fn direct_cycle_is_detected() {
        let mut graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);

        // A2 = A1
        graph.set_dependencies(a2, set_of(&[a1]));

        // A1 = A2 would close the loop
        assert!(graph.would_create_cycle(a1, &set_of(&[a2])));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let mut graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let a3 = pos(2, 0);

        graph.set_dependencies(a2, set_of(&[a1])); // A2 = A1
        graph.set_dependencies(a3, set_of(&[a2])); // A3 = A2

        // A1 = A3 would close A1 -> A3 -> A2 -> A1
        assert!(graph.would_create_cycle(a1, &set_of(&[a3])));
    }

    #[test]
    fn find_cycle_reconstructs_the_path() {
        let mut graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let a3 = pos(2, 0);

        graph.set_dependencies(a2, set_of(&[a1])); // A2 = A1
        graph.set_dependencies(a3, set_of(&[a2])); // A3 = A2

        let path = graph.find_cycle(a1, &set_of(&[a3])).unwrap();
        assert_eq!(path.first(), Some(&a1));
        assert_eq!(path.last(), Some(&a1));
        assert!(path.contains(&a2));
        assert!(path.contains(&a3));
    }

    #[test]
    fn find_cycle_is_none_when_no_cycle() {
        let graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);
        assert!(graph.find_cycle(b1, &set_of(&[a1])).is_none());
    }

    #[test]
    fn unrelated_dependency_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let b1 = pos(0, 1);

        graph.set_dependencies(a2, set_of(&[a1]));

        assert!(!graph.would_create_cycle(b1, &set_of(&[a1])));
        assert!(!graph.would_create_cycle(b1, &set_of(&[a2])));
    }

    #[test]
    fn transitive_dependents_follows_a_diamond() {
        let mut graph = DependencyGraph::new();

        //     A1
        //    /  \
        //   A2  A3
        //    \  /
        //     A4
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let a3 = pos(2, 0);
        let a4 = pos(3, 0);

        graph.set_dependencies(a2, set_of(&[a1]));
        graph.set_dependencies(a3, set_of(&[a1]));
        graph.set_dependencies(a4, set_of(&[a2, a3]));

        let affected = graph.transitive_dependents(a1);
        assert_eq!(affected, set_of(&[a2, a3, a4]));
    }

    #[test]
    fn transitive_dependents_of_a_leaf_is_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.transitive_dependents(pos(0, 0)).is_empty());
    }

    #[test]
    fn counts_track_formula_cells_and_edges() {
        let mut graph = DependencyGraph::new();

        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let a3 = pos(2, 0);

        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.dependency_count(), 0);

        graph.set_dependencies(a2, set_of(&[a1]));
        graph.set_dependencies(a3, set_of(&[a1, a2]));

        assert_eq!(graph.formula_cell_count(), 2);
        assert_eq!(graph.dependency_count(), 3);
    }
}
