//! # Dependency Analyzer
//!
//! Two operations conflict when their footprints intersect (see
//! [`megalith_ops::Access::conflicts_with`]). The analyzer partitions a batch
//! into groups of mutually independent operations with a greedy coloring
//! ordered by submission index:
//!
//! ```text
//! group(i) = 1 + max { group(j) | j < i, j conflicts with i }   (0 if none)
//! ```
//!
//! Conflicting operations therefore never share a group, and their relative
//! group order follows submission order. A whole-World operation conflicts
//! with everything, so it always runs alone.

use megalith_ops::Operation;

/// Conflict edges of a batch, stored as adjacency lists of earlier indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictGraph {
    /// `earlier[i]` lists every `j < i` that conflicts with `i`, ascending.
    earlier: Vec<Vec<usize>>,
}

impl ConflictGraph {
    /// Builds the graph for `ops`. Quadratic in the batch length.
    #[must_use]
    pub fn build(ops: &[Operation]) -> Self {
        let earlier = ops
            .iter()
            .enumerate()
            .map(|(i, op)| {
                ops[..i]
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| other.access().conflicts_with(op.access()))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();
        Self { earlier }
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.earlier.len()
    }

    /// Whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.earlier.is_empty()
    }

    /// Whether operations `a` and `b` conflict.
    #[must_use]
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        low != high
            && self
                .earlier
                .get(high)
                .is_some_and(|edges| edges.binary_search(&low).is_ok())
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.earlier.iter().map(Vec::len).sum()
    }

    /// Greedy coloring by submission index.
    ///
    /// # Returns
    ///
    /// Groups of submission indices, each ascending, in execution order.
    #[must_use]
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut color = Vec::with_capacity(self.earlier.len());
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, edges) in self.earlier.iter().enumerate() {
            let c = edges.iter().map(|&j| color[j] + 1).max().unwrap_or(0);
            color.push(c);
            if c == groups.len() {
                groups.push(Vec::new());
            }
            groups[c].push(i);
        }
        groups
    }
}

/// Partitions `ops` into execution groups.
#[must_use]
pub fn partition(ops: &[Operation]) -> Vec<Vec<usize>> {
    ConflictGraph::build(ops).groups()
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::{ComponentKind, Feature, Position, RuleExpr, RuleSet, Tool, World};
    use megalith_ops::BatchBuilder;

    fn world_with(n: u32) -> (World, Vec<megalith_core::EntityId>) {
        let mut world = World::new();
        let ids = (0..n)
            .map(|i| {
                let id = world.create();
                world
                    .attach(id, Position::new(f64::from(i), 0.0).into())
                    .unwrap();
                id
            })
            .collect();
        (world, ids)
    }

    #[test]
    fn test_independent_moves_share_a_group() {
        let (world, ids) = world_with(4);
        let mut batch = BatchBuilder::new(&world);
        for &id in &ids {
            batch.move_entity(id, Position::new(9.0, 9.0)).unwrap();
        }
        assert_eq!(partition(&batch.build()), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_conflicts_follow_submission_order() {
        let (world, ids) = world_with(2);
        let mut batch = BatchBuilder::new(&world);
        batch.move_entity(ids[0], Position::new(1.0, 1.0)).unwrap();
        batch.move_entity(ids[1], Position::new(2.0, 2.0)).unwrap();
        batch.move_entity(ids[0], Position::new(3.0, 3.0)).unwrap();
        batch.attach(ids[1], Tool::new("t")).unwrap();

        let ops = batch.build();
        let graph = ConflictGraph::build(&ops);
        assert!(graph.conflicts(0, 2));
        assert!(graph.conflicts(2, 0));
        assert!(!graph.conflicts(0, 1));
        assert_eq!(graph.groups(), vec![vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn test_whole_world_runs_alone() {
        let (world, ids) = world_with(3);
        let mut batch = BatchBuilder::new(&world);
        batch.move_entity(ids[0], Position::new(1.0, 1.0)).unwrap();
        batch.refresh_feature_states();
        batch.move_entity(ids[1], Position::new(1.0, 1.0)).unwrap();
        batch.move_entity(ids[2], Position::new(1.0, 1.0)).unwrap();

        let groups = partition(&batch.build());
        assert_eq!(groups, vec![vec![0], vec![1], vec![2, 3]]);
    }

    #[test]
    fn test_rule_definitions_wait_only_for_refresh() {
        let (world, ids) = world_with(2);
        let mut batch = BatchBuilder::new(&world);
        batch
            .attach(
                ids[0],
                RuleSet {
                    name: "any-tool".into(),
                    expr: RuleExpr::count_at_least(ComponentKind::Tool, 1),
                    help_ref: String::new(),
                },
            )
            .unwrap();
        batch
            .attach(
                ids[1],
                Feature {
                    id: "draw".into(),
                    rule: ids[0],
                },
            )
            .unwrap();
        batch.refresh_feature_states();

        let ops = batch.build();
        let graph = ConflictGraph::build(&ops);
        assert!(!graph.conflicts(0, 1));
        assert!(graph.conflicts(0, 2));
        assert!(graph.conflicts(1, 2));
        assert_eq!(graph.groups(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_creations_serialize_on_the_allocator() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        batch.create_entity();
        batch.create_entity();
        let ops = batch.build();
        assert_eq!(ConflictGraph::build(&ops).edge_count(), 1);
        assert_eq!(partition(&ops).len(), 2);
    }
}
