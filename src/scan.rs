//! The recursive terrace scan.
//!
//! [`scan_terrace`] is one algorithm with four behaviours: it recursively
//! splits a leaf set along its constraint-induced components and delegates
//! what to do with the pieces to a [`Combiner`]. Counting, enumeration,
//! compressed enumeration and detection all share this skeleton.

use crate::constraint::{renumber_constraints, restrict_constraints, Constraint};
use crate::leafset::LeafSet;

/// Number of constraints a subproblem must keep before renumbering its leaf
/// set pays off. Tunable; not part of the result contract.
pub const COMPRESS_THRESHOLD: usize = 10;

/// The per-mode hooks of the terrace scan.
///
/// `Output` is the result of one subproblem, `Acc` aggregates the results of
/// the bipartition tuples at one recursion level.
pub trait Combiner {
    /// Result type of a subproblem
    type Output;
    /// Aggregation of tuple results within one recursion level
    type Acc;

    /// Fresh accumulator for one recursion level
    fn init(&mut self) -> Self::Acc;

    /// Result for a leaf set without applicable constraints
    fn leaves_only(&mut self, leaves: &LeafSet, unrooted: bool) -> Self::Output;

    /// Join the results of the two sides of a bipartition
    fn combine_parts(&mut self, left: Self::Output, right: Self::Output) -> Self::Output;

    /// Absorb one bipartition result; returning `false` stops the tuple loop
    fn fold(&mut self, acc: &mut Self::Acc, result: Self::Output) -> bool;

    /// Turn the aggregation into this level's result
    fn finalize(&mut self, acc: Self::Acc, unrooted: bool) -> Self::Output;

    /// Called with the tuple count before the loop; returning `Some` answers
    /// the level immediately. Detection uses this to stop at the second
    /// tuple without recursing.
    fn on_partitioned(&mut self, _number_tuples: usize) -> Option<Self::Output> {
        None
    }

    /// Whether leaf sets may be renumbered below this combiner. Must be
    /// `false` when results embed leaf ids.
    fn compression_allowed(&self) -> bool {
        true
    }
}

/// Recursively evaluate a leaf set under a constraint set.
///
/// With no constraints the leaf set is free and the combiner answers
/// directly. Otherwise the constraints partition the leaves into
/// components, and every bipartition tuple of the components contributes
/// the combination of its two recursively evaluated sides. The `unrooted`
/// flag is honoured only at this outermost call; recursive calls always
/// pass `false`.
pub fn scan_terrace<C: Combiner>(
    combiner: &mut C,
    leaves: &LeafSet,
    constraints: &[Constraint],
    unrooted: bool,
) -> C::Output {
    if constraints.is_empty() {
        return combiner.leaves_only(leaves, unrooted);
    }

    let partition = leaves.partition(constraints);
    if partition.len() < 2 {
        // A consistent constraint set always splits its leaves; fall back to
        // the unconstrained base case rather than iterating zero tuples.
        return combiner.leaves_only(leaves, unrooted);
    }

    if let Some(result) = combiner.on_partitioned(partition.number_partition_tuples()) {
        return result;
    }

    let mut acc = combiner.init();
    for n in 1..=partition.number_partition_tuples() {
        let (mut left, mut right) = partition.nth_partition_tuple(n);
        let mut left_constraints = restrict_constraints(constraints, &left);
        let mut right_constraints = restrict_constraints(constraints, &right);

        if combiner.compression_allowed() {
            if left.compressing_worth() && left_constraints.len() > COMPRESS_THRESHOLD {
                let mapping = left.compress();
                left_constraints = renumber_constraints(&left_constraints, &mapping);
            }
            if right.compressing_worth() && right_constraints.len() > COMPRESS_THRESHOLD {
                let mapping = right.compress();
                right_constraints = renumber_constraints(&right_constraints, &mapping);
            }
        }

        let left_result = scan_terrace(combiner, &left, &left_constraints, false);
        let right_result = scan_terrace(combiner, &right, &right_constraints, false);
        let combined = combiner.combine_parts(left_result, right_result);

        if !combiner.fold(&mut acc, combined) {
            break;
        }
    }

    combiner.finalize(acc, unrooted)
}
