//! The four concrete behaviours of the terrace scan.
//!
//! [`CountTrees`] computes the terrace size as an arbitrary-precision
//! integer, [`EnumerateTrees`] materializes every tree, [`EnumerateCompressed`]
//! builds the symbolic tree DAG instead, and [`DetectTerrace`] only decides
//! whether more than one tree is compatible.

use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::forest::{all_binary_trees, Forest, TreeId};
use crate::leafset::LeafSet;
use crate::scan::Combiner;

/// Number of rooted binary trees over `n_leaves` labelled leaves, the
/// double factorial `(2n-3)!!`.
///
/// # Example
/// ```
/// use terraces::combiners::number_of_rooted_trees;
///
/// let sizes: Vec<String> = (1..=6)
///     .map(|n| number_of_rooted_trees(n).to_string())
///     .collect();
/// assert_eq!(sizes, vec!["1", "1", "3", "15", "105", "945"]);
/// ```
pub fn number_of_rooted_trees(n_leaves: usize) -> BigUint {
    let mut count = BigUint::one();
    for i in 4..=n_leaves + 1 {
        count *= (2 * i - 5) as u64;
    }
    count
}

/// Counts the trees on the terrace.
#[derive(Debug, Default)]
pub struct CountTrees;

impl Combiner for CountTrees {
    type Output = BigUint;
    type Acc = BigUint;

    fn init(&mut self) -> BigUint {
        BigUint::zero()
    }

    fn leaves_only(&mut self, leaves: &LeafSet, _unrooted: bool) -> BigUint {
        number_of_rooted_trees(leaves.len())
    }

    fn combine_parts(&mut self, left: BigUint, right: BigUint) -> BigUint {
        left * right
    }

    fn fold(&mut self, acc: &mut BigUint, result: BigUint) -> bool {
        *acc += result;
        true
    }

    fn finalize(&mut self, acc: BigUint, _unrooted: bool) -> BigUint {
        acc
    }
}

/// Decides whether the terrace holds more than one tree.
#[derive(Debug, Default)]
pub struct DetectTerrace;

impl Combiner for DetectTerrace {
    type Output = bool;
    type Acc = bool;

    fn init(&mut self) -> bool {
        false
    }

    fn leaves_only(&mut self, leaves: &LeafSet, _unrooted: bool) -> bool {
        leaves.len() >= 3
    }

    fn combine_parts(&mut self, left: bool, right: bool) -> bool {
        left || right
    }

    fn fold(&mut self, acc: &mut bool, result: bool) -> bool {
        *acc |= result;
        *acc
    }

    fn finalize(&mut self, acc: bool, _unrooted: bool) -> bool {
        acc
    }

    fn on_partitioned(&mut self, number_tuples: usize) -> Option<bool> {
        // Two tuples already prove two distinct root splits; no recursion
        // needed.
        (number_tuples > 1).then_some(true)
    }
}

/// Materializes every tree on the terrace into a [`Forest`].
pub struct EnumerateTrees<'a> {
    forest: &'a mut Forest,
}

impl<'a> EnumerateTrees<'a> {
    /// Enumerate into the given forest
    pub fn new(forest: &'a mut Forest) -> Self {
        Self { forest }
    }
}

impl Combiner for EnumerateTrees<'_> {
    type Output = Vec<TreeId>;
    type Acc = Vec<TreeId>;

    fn init(&mut self) -> Vec<TreeId> {
        Vec::new()
    }

    fn leaves_only(&mut self, leaves: &LeafSet, unrooted: bool) -> Vec<TreeId> {
        let trees = all_binary_trees(self.forest, leaves.leaves());
        if unrooted {
            trees
                .into_iter()
                .map(|tree| self.forest.unrooted(tree))
                .collect()
        } else {
            trees
        }
    }

    fn combine_parts(&mut self, left: Vec<TreeId>, right: Vec<TreeId>) -> Vec<TreeId> {
        let mut merged = Vec::with_capacity(left.len() * right.len());
        for (&l, &r) in left.iter().cartesian_product(right.iter()) {
            merged.push(self.forest.inner(l, r));
        }
        merged
    }

    fn fold(&mut self, acc: &mut Vec<TreeId>, result: Vec<TreeId>) -> bool {
        acc.extend(result);
        true
    }

    fn finalize(&mut self, acc: Vec<TreeId>, unrooted: bool) -> Vec<TreeId> {
        if unrooted {
            acc.into_iter()
                .map(|tree| self.forest.unrooted(tree))
                .collect()
        } else {
            acc
        }
    }

    fn compression_allowed(&self) -> bool {
        false
    }
}

/// Builds the compressed tree DAG for the terrace.
pub struct EnumerateCompressed<'a> {
    forest: &'a mut Forest,
}

impl<'a> EnumerateCompressed<'a> {
    /// Build the DAG in the given forest
    pub fn new(forest: &'a mut Forest) -> Self {
        Self { forest }
    }
}

impl Combiner for EnumerateCompressed<'_> {
    type Output = TreeId;
    type Acc = Vec<TreeId>;

    fn init(&mut self) -> Vec<TreeId> {
        Vec::new()
    }

    fn leaves_only(&mut self, leaves: &LeafSet, unrooted: bool) -> TreeId {
        let node = self.forest.all_leaf_combinations(leaves.iter().collect());
        if unrooted {
            self.forest.unrooted(node)
        } else {
            node
        }
    }

    fn combine_parts(&mut self, left: TreeId, right: TreeId) -> TreeId {
        self.forest.inner(left, right)
    }

    fn fold(&mut self, acc: &mut Vec<TreeId>, result: TreeId) -> bool {
        acc.push(result);
        true
    }

    fn finalize(&mut self, acc: Vec<TreeId>, unrooted: bool) -> TreeId {
        debug_assert!(!acc.is_empty());
        let node = if acc.len() == 1 {
            acc[0]
        } else {
            self.forest.all_tree_combinations(acc)
        };
        if unrooted {
            self.forest.unrooted(node)
        } else {
            node
        }
    }

    fn compression_allowed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::forest::TreeNode;
    use crate::labels::LabelMap;
    use crate::matrix::PresenceMatrix;
    use crate::newick::NewickWriter;
    use crate::scan::scan_terrace;
    use crate::LeafId;

    /// Constraints pinning {1,2,3,4} to the single caterpillar
    /// (1,(2,(3,4))).
    fn chain_constraints() -> Vec<Constraint> {
        vec![Constraint::new(3, 4, 2, 4), Constraint::new(2, 4, 1, 4)]
    }

    /// One constraint on {0,1,2,3}: lca(1,3) below lca(0,3).
    fn loose_constraints() -> Vec<Constraint> {
        vec![Constraint::new(1, 3, 0, 3)]
    }

    fn count(leaves: &LeafSet, constraints: &[Constraint]) -> BigUint {
        scan_terrace(&mut CountTrees, leaves, constraints, false)
    }

    fn detect(leaves: &LeafSet, constraints: &[Constraint]) -> bool {
        scan_terrace(&mut DetectTerrace, leaves, constraints, false)
    }

    fn enumerate(leaves: &LeafSet, constraints: &[Constraint]) -> (Forest, Vec<TreeId>) {
        let mut forest = Forest::new();
        let trees = scan_terrace(
            &mut EnumerateTrees::new(&mut forest),
            leaves,
            constraints,
            false,
        );
        (forest, trees)
    }

    #[test]
    fn free_leaf_sets_follow_the_double_factorial() {
        for (n, expected) in [(1u32, 1u32), (2, 1), (3, 3), (4, 15), (5, 105)] {
            let leaves = LeafSet::from_leaves((0..n as LeafId).collect());
            assert_eq!(count(&leaves, &[]), BigUint::from(expected));
        }
    }

    #[test]
    fn chained_constraints_pin_a_single_tree() {
        let leaves = LeafSet::from_leaves(vec![1, 2, 3, 4]);
        assert_eq!(count(&leaves, &chain_constraints()), BigUint::one());
        assert!(!detect(&leaves, &chain_constraints()));
    }

    #[test]
    fn enumeration_length_matches_count() {
        let cases: Vec<(Vec<LeafId>, Vec<Constraint>)> = vec![
            (vec![0, 1, 2, 3], vec![]),
            (vec![1, 2, 3, 4], chain_constraints()),
            (vec![0, 1, 2, 3], loose_constraints()),
            (vec![0, 1, 2, 3, 4, 5], loose_constraints()),
        ];

        for (ids, constraints) in cases {
            let leaves = LeafSet::from_leaves(ids);
            let (_, trees) = enumerate(&leaves, &constraints);
            assert_eq!(
                BigUint::from(trees.len()),
                count(&leaves, &constraints),
                "constraints: {constraints:?}"
            );
        }
    }

    #[test]
    fn detection_agrees_with_counting() {
        let cases: Vec<(Vec<LeafId>, Vec<Constraint>)> = vec![
            (vec![0, 1], vec![]),
            (vec![0, 1, 2], vec![]),
            (vec![1, 2, 3, 4], chain_constraints()),
            (vec![0, 1, 2, 3], loose_constraints()),
        ];

        for (ids, constraints) in cases {
            let leaves = LeafSet::from_leaves(ids);
            assert_eq!(
                detect(&leaves, &constraints),
                count(&leaves, &constraints) > BigUint::one(),
                "constraints: {constraints:?}"
            );
        }
    }

    #[test]
    fn enumerated_trees_hold_the_right_leaves_and_are_distinct() {
        let leaves = LeafSet::from_leaves(vec![0, 1, 2, 3]);
        let (forest, trees) = enumerate(&leaves, &loose_constraints());

        let mut shapes = std::collections::HashSet::new();
        for &tree in &trees {
            let mut tree_leaves = forest.leaves_of(tree);
            tree_leaves.sort_unstable();
            assert_eq!(tree_leaves, vec![0, 1, 2, 3]);
            assert!(shapes.insert(format!("{:?}", ordered_shape(&forest, tree))));
        }
    }

    #[test]
    fn enumerated_trees_satisfy_their_constraints() {
        let leaves = LeafSet::from_leaves(vec![0, 1, 2, 3]);
        let constraints = loose_constraints();
        let (forest, trees) = enumerate(&leaves, &constraints);

        for &tree in &trees {
            for constraint in &constraints {
                let smaller =
                    lca_depth(&forest, tree, constraint.smaller_left, constraint.smaller_right);
                let bigger =
                    lca_depth(&forest, tree, constraint.bigger_left, constraint.bigger_right);
                assert!(
                    smaller > bigger,
                    "{constraint} violated by {:?}",
                    ordered_shape(&forest, tree)
                );
            }
        }
    }

    #[test]
    fn compressed_output_matches_plain_enumeration() {
        let species: Vec<String> = (0..6).map(|i| format!("x{i}")).collect();
        let rows: Vec<Vec<u8>> = (0..6).map(|_| vec![1, 1]).collect();
        let matrix = PresenceMatrix::from_rows(species, &rows).unwrap();
        let labels = LabelMap::from_matrix(&matrix, 0);

        let cases: Vec<(Vec<LeafId>, Vec<Constraint>)> = vec![
            (vec![0, 1, 2, 3], vec![]),
            (vec![1, 2, 3, 4], chain_constraints()),
            (vec![0, 1, 2, 3], loose_constraints()),
            (vec![0, 1, 2, 3, 4, 5], loose_constraints()),
        ];

        for (ids, constraints) in cases {
            let leaves = LeafSet::from_leaves(ids);

            let (forest, trees) = enumerate(&leaves, &constraints);
            let writer = NewickWriter::new(&forest, &labels);
            let mut plain = Vec::new();
            for tree in trees {
                plain.extend(writer.lines(tree).unwrap());
            }

            let mut forest = Forest::new();
            let dag = scan_terrace(
                &mut EnumerateCompressed::new(&mut forest),
                &leaves,
                &constraints,
                false,
            );
            let compressed = NewickWriter::new(&forest, &labels).lines(dag).unwrap();

            assert_eq!(plain, compressed, "constraints: {constraints:?}");
        }
    }

    #[test]
    fn unrooted_flag_wraps_only_the_outermost_result() {
        let leaves = LeafSet::from_leaves(vec![1, 2, 3, 4]);

        let mut forest = Forest::new();
        let trees = scan_terrace(
            &mut EnumerateTrees::new(&mut forest),
            &leaves,
            &chain_constraints(),
            true,
        );
        assert_eq!(trees.len(), 1);
        assert!(matches!(forest.get(trees[0]), TreeNode::Unrooted(_)));

        let mut forest = Forest::new();
        let dag = scan_terrace(
            &mut EnumerateCompressed::new(&mut forest),
            &leaves,
            &chain_constraints(),
            true,
        );
        assert!(matches!(forest.get(dag), TreeNode::Unrooted(_)));
    }

    #[test]
    fn compression_kicks_in_on_sparse_subproblems() {
        // A caterpillar over sparse ids, pinned to a single tree by a chain
        // of constraints long enough to cross COMPRESS_THRESHOLD once the
        // first tuple splits off the shallowest leaf.
        let ids: Vec<LeafId> = (1..=14).map(|i| i * 10).collect();
        let last = ids[ids.len() - 1];
        let constraints: Vec<Constraint> = (1..ids.len() - 1)
            .map(|i| Constraint::new(ids[i], last, ids[i - 1], last))
            .collect();
        assert!(constraints.len() > crate::scan::COMPRESS_THRESHOLD);

        let leaves = LeafSet::from_leaves(ids.clone());
        assert_eq!(count(&leaves, &constraints), BigUint::one());
        assert!(!detect(&leaves, &constraints));

        // Enumeration keeps the original ids since it never renumbers.
        let (forest, trees) = enumerate(&leaves, &constraints);
        assert_eq!(trees.len(), 1);
        let mut tree_leaves = forest.leaves_of(trees[0]);
        tree_leaves.sort_unstable();
        assert_eq!(tree_leaves, ids);
    }

    #[test]
    fn counting_distributes_over_bipartitions() {
        // One constraint on six leaves: the component {1,3} plus four free
        // leaves. Check the sum-over-tuples identity by recomputing it by
        // hand from the partition.
        let leaves = LeafSet::from_leaves(vec![0, 1, 2, 3, 4, 5]);
        let constraints = loose_constraints();
        let partition = leaves.partition(&constraints);

        let mut total = BigUint::zero();
        for n in 1..=partition.number_partition_tuples() {
            let (left, right) = partition.nth_partition_tuple(n);
            let left_count = count(&left, &crate::constraint::restrict_constraints(&constraints, &left));
            let right_count =
                count(&right, &crate::constraint::restrict_constraints(&constraints, &right));
            total += left_count * right_count;
        }

        assert_eq!(total, count(&leaves, &constraints));
    }

    fn ordered_shape(forest: &Forest, tree: TreeId) -> String {
        match forest.get(tree) {
            TreeNode::Leaf(leaf) => leaf.to_string(),
            TreeNode::Inner(left, right) => format!(
                "({},{})",
                ordered_shape(forest, *left),
                ordered_shape(forest, *right)
            ),
            node => panic!("unexpected node {node:?}"),
        }
    }

    /// Depth of the last common ancestor of two leaves, root depth 0.
    fn lca_depth(forest: &Forest, tree: TreeId, a: LeafId, b: LeafId) -> usize {
        let path_a = path_to(forest, tree, a).expect("leaf in tree");
        let path_b = path_to(forest, tree, b).expect("leaf in tree");
        path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .count()
            - 1
    }

    fn path_to(forest: &Forest, tree: TreeId, leaf: LeafId) -> Option<Vec<TreeId>> {
        match forest.get(tree) {
            TreeNode::Leaf(l) if *l == leaf => Some(vec![tree]),
            TreeNode::Leaf(_) => None,
            TreeNode::Inner(left, right) => path_to(forest, *left, leaf)
                .or_else(|| path_to(forest, *right, leaf))
                .map(|mut path| {
                    path.insert(0, tree);
                    path
                }),
            node => panic!("unexpected node {node:?}"),
        }
    }
}
