//! Rooted triple constraints and their extraction from the supertree.
//!
//! A constraint `lca(a,b) < lca(x,y)` states that the last common ancestor
//! of `a` and `b` sits strictly deeper in the tree than that of `x` and `y`,
//! where the shallower pair shares one endpoint with the deeper pair. The
//! set of constraints extracted from the supertree and the presence matrix
//! fully determines the terrace.

use std::collections::HashSet;
use std::fmt::{Debug, Display};

use fixedbitset::FixedBitSet;
use thiserror::Error;

use crate::labels::LabelMap;
use crate::leafset::LeafSet;
use crate::matrix::PresenceMatrix;
use crate::supertree::{NodeId, Supertree};
use crate::LeafId;

/// Errors that can occur when extracting constraints from a supertree.
#[derive(Error, Debug)]
pub enum ConstraintError {
    /// A supertree leaf carries a label that is not in the species map
    #[error("Species {0} appears in the tree but not in the data matrix.")]
    UnknownSpecies(String),
    /// A supertree leaf carries no label at all
    #[error("The tree contains an unnamed leaf.")]
    UnnamedLeaf,
    /// The supertree has too few leaves to walk
    #[error("The tree has fewer than two leaves.")]
    DegenerateTree,
}

/// A rooted triple constraint `lca(smaller) < lca(bigger)`.
///
/// The smaller pair always shares exactly one endpoint with the bigger pair,
/// so a constraint mentions three distinct leaves.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    /// Left leaf of the deeper pair
    pub smaller_left: LeafId,
    /// Right leaf of the deeper pair
    pub smaller_right: LeafId,
    /// Left leaf of the shallower pair
    pub bigger_left: LeafId,
    /// Right leaf of the shallower pair
    pub bigger_right: LeafId,
}

impl Constraint {
    /// Build a constraint. The smaller pair must share exactly one endpoint
    /// with the bigger pair.
    pub fn new(
        smaller_left: LeafId,
        smaller_right: LeafId,
        bigger_left: LeafId,
        bigger_right: LeafId,
    ) -> Self {
        debug_assert!(
            smaller_left == bigger_left || smaller_right == bigger_right,
            "smaller pair must share one endpoint with the bigger pair"
        );
        Self {
            smaller_left,
            smaller_right,
            bigger_left,
            bigger_right,
        }
    }

    /// True if all leaves of the constraint belong to the given leaf set
    pub fn applies_to(&self, leaves: &LeafSet) -> bool {
        leaves.contains(self.smaller_left)
            && leaves.contains(self.smaller_right)
            && leaves.contains(self.bigger_left)
            && leaves.contains(self.bigger_right)
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lca({},{}) < lca({},{})",
            self.smaller_left, self.smaller_right, self.bigger_left, self.bigger_right
        )
    }
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Keep the constraints whose leaves all belong to the given leaf set
pub fn restrict_constraints(constraints: &[Constraint], leaves: &LeafSet) -> Vec<Constraint> {
    constraints
        .iter()
        .filter(|constraint| constraint.applies_to(leaves))
        .copied()
        .collect()
}

/// Rewrite constraint leaf ids through a compression mapping.
///
/// `mapping` is the ascending list of old ids returned by
/// [`LeafSet::compress`]; the new id of a leaf is its position in the list.
pub fn renumber_constraints(constraints: &[Constraint], mapping: &[LeafId]) -> Vec<Constraint> {
    constraints
        .iter()
        .map(|constraint| {
            Constraint::new(
                renumber(mapping, constraint.smaller_left),
                renumber(mapping, constraint.smaller_right),
                renumber(mapping, constraint.bigger_left),
                renumber(mapping, constraint.bigger_right),
            )
        })
        .collect()
}

fn renumber(mapping: &[LeafId], leaf: LeafId) -> LeafId {
    mapping
        .binary_search(&leaf)
        .expect("constraint leaf missing from compression mapping")
}

/// Extract the terrace constraints implied by a supertree and a presence
/// matrix.
///
/// For each partition, the supertree induced on the species with data in
/// that partition (root species excluded) is walked in post-order; every
/// bifurcation emits up to two rooted triples. Constraints are deduplicated
/// across partitions, keeping first-seen order.
pub fn extract_constraints(
    tree: &Supertree,
    matrix: &PresenceMatrix,
    labels: &LabelMap,
) -> Result<Vec<Constraint>, ConstraintError> {
    let root_label = labels.label_of(labels.root_id());
    let root_leaf = tree
        .leaf_named(root_label)
        .ok_or_else(|| ConstraintError::UnknownSpecies(root_label.to_string()))?;
    let start = tree
        .node(root_leaf)
        .parent
        .ok_or(ConstraintError::DegenerateTree)?;

    let mut seen = HashSet::new();
    let mut constraints = Vec::new();
    for partition in 0..matrix.n_partitions() {
        let mut present = matrix.partition_mask(partition);
        present.set(labels.root_id(), false);

        let mut found = Vec::new();
        collect_constraints(tree, start, root_leaf, &present, labels, &mut found)?;
        for constraint in found {
            if seen.insert(constraint) {
                constraints.push(constraint);
            }
        }
    }

    Ok(constraints)
}

/// Walk the supertree away from `incoming`, restricted to the `present`
/// leaves, and push the constraints emitted at every retained bifurcation.
/// Returns the leftmost and rightmost retained leaf below `node`, or `None`
/// if the subtree holds no retained leaf. Skipped branches contract
/// implicitly, which keeps the walk on the induced subtree.
fn collect_constraints(
    tree: &Supertree,
    node: NodeId,
    incoming: NodeId,
    present: &FixedBitSet,
    labels: &LabelMap,
    out: &mut Vec<Constraint>,
) -> Result<Option<(LeafId, LeafId)>, ConstraintError> {
    let current = tree.node(node);
    if current.is_tip() {
        let name = current.name.as_deref().ok_or(ConstraintError::UnnamedLeaf)?;
        let id = labels
            .id_of(name)
            .ok_or_else(|| ConstraintError::UnknownSpecies(name.to_string()))?;
        return Ok(present.contains(id).then_some((id, id)));
    }

    let mut spans: Vec<(LeafId, LeafId)> = Vec::with_capacity(2);
    for neighbor in current.children.iter().copied().chain(current.parent) {
        if neighbor == incoming {
            continue;
        }
        if let Some(span) = collect_constraints(tree, neighbor, node, present, labels, out)? {
            spans.push(span);
        }
    }

    match spans.as_slice() {
        [] => Ok(None),
        [span] => Ok(Some(*span)),
        [(left_first, left_last), (right_first, right_last)] => {
            if left_first != left_last {
                out.push(Constraint::new(
                    *left_first,
                    *left_last,
                    *left_first,
                    *right_last,
                ));
            }
            if right_first != right_last {
                out.push(Constraint::new(
                    *right_first,
                    *right_last,
                    *left_first,
                    *right_last,
                ));
            }
            Ok(Some((*left_first, *right_last)))
        }
        _ => unreachable!("supertree must be binary"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(newick: &str, rows: &[Vec<u8>]) -> (Supertree, PresenceMatrix, LabelMap) {
        let species = (1..=rows.len()).map(|i| format!("s{i}")).collect();
        let matrix = PresenceMatrix::from_rows(species, rows).unwrap();
        let root = matrix.full_data_row().unwrap();
        let labels = LabelMap::from_matrix(&matrix, root);
        let tree = Supertree::from_newick(newick).unwrap().contracted();
        (tree, matrix, labels)
    }

    #[test]
    fn no_constraints_from_cherries() {
        // Both partitions induce a two-leaf tree once the root species s3 is
        // removed, so no bifurcation can emit a triple.
        let (tree, matrix, labels) = setup(
            "((s1,s2),s3,(s4,s5));",
            &[vec![1, 0], vec![1, 0], vec![1, 1], vec![0, 1], vec![0, 1]],
        );
        let constraints = extract_constraints(&tree, &matrix, &labels).unwrap();
        assert!(constraints.is_empty());
    }

    #[test]
    fn full_matrix_pins_the_tree() {
        let (tree, matrix, labels) = setup(
            "((s1,s2),s3,(s4,s5));",
            &[vec![1, 1], vec![1, 1], vec![1, 1], vec![1, 1], vec![1, 1]],
        );
        let constraints = extract_constraints(&tree, &matrix, &labels).unwrap();

        // Rooting at s1 gives (s2,(s3,(s4,s5))), whose two bifurcations
        // below the root emit one triple each; both partitions emit the same
        // pair, deduplicated to two.
        assert_eq!(
            constraints,
            vec![Constraint::new(3, 4, 2, 4), Constraint::new(2, 4, 1, 4)]
        );
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let (tree, matrix, labels) = setup(
            "((s1,s2),s3,(s4,s5));",
            &[vec![1, 1], vec![0, 1], vec![1, 1], vec![1, 1], vec![1, 1]],
        );
        let constraints = extract_constraints(&tree, &matrix, &labels).unwrap();

        // Partition 0 lacks s2: rooted at s1 the induced tree is
        // (s3,(s4,s5)), one triple. Partition 1 adds the second triple.
        assert_eq!(
            constraints,
            vec![Constraint::new(3, 4, 2, 4), Constraint::new(2, 4, 1, 4)]
        );
    }

    #[test]
    fn applies_and_restrict() {
        let constraint = Constraint::new(3, 4, 2, 4);
        let all = LeafSet::from_leaves(vec![1, 2, 3, 4]);
        let partial = LeafSet::from_leaves(vec![3, 4]);

        assert!(constraint.applies_to(&all));
        assert!(!constraint.applies_to(&partial));

        let constraints = vec![Constraint::new(3, 4, 2, 4), Constraint::new(2, 4, 1, 4)];
        let kept = restrict_constraints(&constraints, &LeafSet::from_leaves(vec![2, 3, 4]));
        assert_eq!(kept, vec![Constraint::new(3, 4, 2, 4)]);
    }

    #[test]
    fn renumber_through_mapping() {
        let constraints = vec![Constraint::new(12, 40, 7, 40)];
        let mapping = vec![7, 12, 40];
        assert_eq!(
            renumber_constraints(&constraints, &mapping),
            vec![Constraint::new(1, 2, 0, 2)]
        );
    }

    #[test]
    fn unknown_species_is_fatal() {
        let species = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];
        let matrix =
            PresenceMatrix::from_rows(species, &[vec![1, 1], vec![1, 1], vec![1, 1]]).unwrap();
        let labels = LabelMap::from_matrix(&matrix, 0);
        let tree = Supertree::from_newick("((s1,s2),(s3,intruder));").unwrap();

        let err = extract_constraints(&tree, &matrix, &labels).unwrap_err();
        assert!(matches!(err, ConstraintError::UnknownSpecies(name) if name == "intruder"));
    }

    #[test]
    fn display_form() {
        let constraint = Constraint::new(3, 4, 2, 4);
        assert_eq!(constraint.to_string(), "lca(3,4) < lca(2,4)");
    }
}
