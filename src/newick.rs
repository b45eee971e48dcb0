//! Newick output for result trees.
//!
//! A [`NewickWriter`] turns [`Forest`] trees back into Newick text, one line
//! per concrete tree. Symbolic nodes from compressed enumeration are
//! expanded lazily, so a DAG standing for millions of trees streams them
//! out without ever materializing the whole list.

use std::io::{self, Write};

use crate::forest::{Forest, TreeId, TreeNode};
use crate::labels::LabelMap;
use crate::LeafId;

/// A concrete binary tree produced by expanding a forest node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expansion {
    Leaf(LeafId),
    Inner(Box<Expansion>, Box<Expansion>),
}

impl Expansion {
    fn inner(left: Expansion, right: Expansion) -> Self {
        Expansion::Inner(Box::new(left), Box::new(right))
    }
}

/// Writes the trees denoted by a forest node as Newick lines.
///
/// With an outgroup configured, every line re-attaches the outgroup species
/// as a third subtree of the root, producing the unrooted trifurcation the
/// analysis reports. Without one, trees print rooted unless wrapped in
/// [`TreeNode::Unrooted`], which restructures the root into a trifurcation
/// over the wrapped tree's own subtrees.
pub struct NewickWriter<'a> {
    forest: &'a Forest,
    labels: &'a LabelMap,
    outgroup: Option<LeafId>,
}

impl<'a> NewickWriter<'a> {
    /// Create a writer over a forest and a label map
    pub fn new(forest: &'a Forest, labels: &'a LabelMap) -> Self {
        Self {
            forest,
            labels,
            outgroup: None,
        }
    }

    /// Create a writer that re-attaches `outgroup` to every printed tree
    pub fn with_outgroup(forest: &'a Forest, labels: &'a LabelMap, outgroup: LeafId) -> Self {
        Self {
            forest,
            labels,
            outgroup: Some(outgroup),
        }
    }

    /// Write one Newick line per concrete tree denoted by `root`.
    /// Returns the number of lines written.
    pub fn write_all<W: Write + ?Sized>(&self, root: TreeId, out: &mut W) -> io::Result<u64> {
        let (root, unrooted) = match self.forest.get(root) {
            TreeNode::Unrooted(inner) => (*inner, true),
            _ => (root, false),
        };

        let mut written = 0;
        for expansion in self.expansions(root) {
            writeln!(out, "{}", self.line(&expansion, unrooted))?;
            written += 1;
        }
        Ok(written)
    }

    /// Collect the Newick lines instead of streaming them; intended for
    /// small results.
    pub fn lines(&self, root: TreeId) -> io::Result<Vec<String>> {
        let mut buffer = Vec::new();
        self.write_all(root, &mut buffer)?;
        let text = String::from_utf8(buffer).expect("newick output is ascii");
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Lazily enumerate the concrete trees denoted by a node. Inner nodes
    /// buffer their right alternatives and stream the left ones, so memory
    /// stays proportional to the DAG depth times the widest buffered side.
    fn expansions(&self, id: TreeId) -> Box<dyn Iterator<Item = Expansion> + '_> {
        match self.forest.get(id) {
            TreeNode::Leaf(leaf) => Box::new(std::iter::once(Expansion::Leaf(*leaf))),
            TreeNode::Inner(left, right) => {
                let right_variants: Vec<Expansion> = self.expansions(*right).collect();
                Box::new(self.expansions(*left).flat_map(move |left_variant| {
                    right_variants
                        .clone()
                        .into_iter()
                        .map(move |right_variant| {
                            Expansion::inner(left_variant.clone(), right_variant)
                        })
                }))
            }
            TreeNode::AllLeafCombinations(leaves) => Box::new(AllTreesIter::new(leaves.clone())),
            TreeNode::AllTreeCombinations(children) => {
                let children = children.clone();
                Box::new(
                    children
                        .into_iter()
                        .flat_map(move |child| self.expansions(child)),
                )
            }
            TreeNode::Unrooted(_) => unreachable!("unrooted wrapper below the outermost node"),
        }
    }

    fn line(&self, tree: &Expansion, unrooted: bool) -> String {
        if let Some(outgroup) = self.outgroup {
            let outgroup = self.labels.label_of(outgroup);
            return match tree {
                Expansion::Inner(left, right) => {
                    format!("({},{},{});", self.format(left), self.format(right), outgroup)
                }
                leaf => format!("({},{});", self.format(leaf), outgroup),
            };
        }

        if unrooted {
            return match tree {
                Expansion::Inner(left, right) => match (left.as_ref(), right.as_ref()) {
                    (Expansion::Leaf(_), Expansion::Inner(right_left, right_right)) => format!(
                        "({},{},{});",
                        self.format(left),
                        self.format(right_left),
                        self.format(right_right)
                    ),
                    (Expansion::Inner(left_left, left_right), _) => format!(
                        "({},{},{});",
                        self.format(left_left),
                        self.format(left_right),
                        self.format(right)
                    ),
                    _ => format!("({},{});", self.format(left), self.format(right)),
                },
                leaf => format!("({});", self.format(leaf)),
            };
        }

        format!("{};", self.format(tree))
    }

    fn format(&self, tree: &Expansion) -> String {
        match tree {
            Expansion::Leaf(leaf) => self.labels.label_of(*leaf).to_string(),
            Expansion::Inner(left, right) => {
                format!("({},{})", self.format(left), self.format(right))
            }
        }
    }
}

/// Lazy enumeration of all rooted binary trees over a fixed leaf list.
///
/// Tree `n` is decoded from `n` directly: writing `n` in the mixed radix of
/// insertion slots gives, for each leaf, the edge it was inserted on. This
/// reproduces the order of [`crate::forest::all_binary_trees`] without
/// holding more than one tree at a time.
struct AllTreesIter {
    leaves: Vec<LeafId>,
    next: u128,
    total: u128,
}

impl AllTreesIter {
    fn new(leaves: Vec<LeafId>) -> Self {
        let total = tree_count(leaves.len());
        Self {
            leaves,
            next: 0,
            total,
        }
    }
}

impl Iterator for AllTreesIter {
    type Item = Expansion;

    fn next(&mut self) -> Option<Expansion> {
        if self.next >= self.total || self.leaves.is_empty() {
            return None;
        }
        let tree = nth_tree(&self.leaves, self.next);
        self.next += 1;
        Some(tree)
    }
}

fn tree_count(k: usize) -> u128 {
    let mut count: u128 = 1;
    for i in 3..=k {
        count = count.saturating_mul((2 * i - 3) as u128);
    }
    count
}

/// Decode the `index`-th rooted binary tree over `leaves`.
fn nth_tree(leaves: &[LeafId], mut index: u128) -> Expansion {
    let k = leaves.len();

    // Insertion slot of each leaf, least significant digit first: leaf j is
    // inserted into a tree over leaves[j+1..], which has 2(k-j-1)-1 slots.
    let mut slots = Vec::with_capacity(k.saturating_sub(1));
    for j in 0..k.saturating_sub(1) {
        let base = (2 * (k - j - 1) - 1) as u128;
        slots.push((index % base) as usize);
        index /= base;
    }

    let mut tree = Expansion::Leaf(leaves[k - 1]);
    for j in (0..k - 1).rev() {
        tree = insert_at(tree, leaves[j], slots[j]);
    }
    tree
}

/// Graft `leaf` onto the `position`-th edge of `tree`, counting positions
/// the way [`crate::forest::insert_leaf_everywhere`] does: left subtree
/// first, then right subtree, then above the tree itself.
fn insert_at(tree: Expansion, leaf: LeafId, position: usize) -> Expansion {
    if let Expansion::Inner(left, right) = tree {
        let left_nodes = node_count(&left);
        if position < left_nodes {
            return Expansion::inner(insert_at(*left, leaf, position), *right);
        }
        let right_nodes = node_count(&right);
        if position < left_nodes + right_nodes {
            return Expansion::inner(*left, insert_at(*right, leaf, position - left_nodes));
        }
        debug_assert_eq!(position, left_nodes + right_nodes);
        return Expansion::inner(
            Expansion::Inner(left, right),
            Expansion::Leaf(leaf),
        );
    }

    debug_assert_eq!(position, 0);
    Expansion::inner(tree, Expansion::Leaf(leaf))
}

fn node_count(tree: &Expansion) -> usize {
    match tree {
        Expansion::Leaf(_) => 1,
        Expansion::Inner(left, right) => 1 + node_count(left) + node_count(right),
    }
}
