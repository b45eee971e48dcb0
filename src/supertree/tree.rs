use thiserror::Error;

use super::node::Node;
use super::NodeId;

/// Errors that can occur when parsing newick strings.
#[derive(Error, Debug, PartialEq)]
pub enum NewickParseError {
    /// There is an unclosed bracket in the newick string
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missing a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtree but have no parent node
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// The newick string describes no tree at all
    #[error("The newick string is empty.")]
    EmptyTree,
}

/// The input supertree over all species.
///
/// Nodes are stored in an arena indexed by [`NodeId`]; the root is the node
/// without a parent. Only the topology and the leaf names matter for terrace
/// analysis, so branch lengths and comments are dropped at parse time.
///
/// # Example
/// ```
/// use terraces::supertree::Supertree;
///
/// let tree = Supertree::from_newick("((s1:0.1,s2)a,s3,(s4,s5));").unwrap();
///
/// assert_eq!(tree.n_leaves(), 5);
/// assert!(tree.is_binary());
/// assert!(tree.leaf_named("s4").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Supertree {
    nodes: Vec<Node>,
}

impl Supertree {
    /// Create a new empty Supertree object
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a node to the tree and return its id.
    /// The first node added is the root.
    pub fn add(&mut self, mut node: Node) -> NodeId {
        let id = self.nodes.len();
        node.set_id(id);
        self.nodes.push(node);
        id
    }

    /// Add a node as a child of an existing node and return the child's id.
    /// Panics if `parent` is not in the tree.
    pub fn add_child(&mut self, mut node: Node, parent: NodeId) -> NodeId {
        node.set_parent(parent);
        let id = self.add(node);
        self.nodes[parent].add_child(id);
        id
    }

    /// Borrow a node.
    /// Panics if `id` is not in the tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Id of the root node, if the tree is not empty
    pub fn root(&self) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.is_root())
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves in the tree
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_tip()).count()
    }

    /// Ids of the leaf nodes, in insertion order
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.is_tip())
            .map(|node| node.id)
            .collect()
    }

    /// Name of a node, if it has one.
    /// Panics if `id` is not in the tree.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].name.as_deref()
    }

    /// Find the leaf carrying a given name
    pub fn leaf_named(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.is_tip() && node.name.as_deref() == Some(name))
            .map(|node| node.id)
    }

    /// Check that every internal node is bifurcating. The root may also be
    /// trifurcating, which is how unrooted binary trees are written in
    /// newick notation.
    pub fn is_binary(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().all(|node| {
                let arity = node.children.len();
                if node.is_root() {
                    arity == 2 || arity == 3
                } else {
                    arity == 0 || arity == 2
                }
            })
    }

    /// Return a copy of the tree with all single-child chains contracted,
    /// so subtrees written as `(s4)` collapse to the leaf `s4`.
    pub fn contracted(&self) -> Supertree {
        let mut tree = Supertree::new();
        if let Some(root) = self.root() {
            self.copy_contracted(root, None, &mut tree);
        }
        tree
    }

    fn copy_contracted(&self, id: NodeId, parent: Option<NodeId>, into: &mut Supertree) {
        let mut current = id;
        while self.nodes[current].children.len() == 1 {
            current = self.nodes[current].children[0];
        }
        let source = &self.nodes[current];
        let node = match &source.name {
            Some(name) => Node::new_named(name),
            None => Node::new(),
        };
        let new_id = match parent {
            Some(parent) => into.add_child(node, parent),
            None => into.add(node),
        };
        for &child in &source.children {
            self.copy_contracted(child, Some(new_id), into);
        }
    }

    /// Read a newick formatted string and build a [`Supertree`] from it.
    ///
    /// Quoted names, `[...]` comments and `:length` annotations are
    /// accepted; comments and lengths are discarded.
    ///
    /// # Example
    /// ```
    /// use terraces::supertree::Supertree;
    ///
    /// let tree = Supertree::from_newick("((A,B),(C,D));").unwrap();
    /// assert_eq!(tree.size(), 7);
    /// assert_eq!(tree.n_leaves(), 4);
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        let mut tree = Supertree::new();

        let mut current_name: Option<String> = None;
        let mut current_index: Option<NodeId> = None;
        let mut parent_stack: Vec<NodeId> = Vec::new();

        let mut open_brackets = 0usize;
        let mut in_comment = false;
        let mut in_length = false;
        let mut quote: Option<char> = None;

        for c in newick.chars() {
            // Comments run to the closing bracket
            if in_comment {
                if c == ']' {
                    in_comment = false;
                }
                continue;
            }

            // Quoted names keep every character up to the matching quote
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                } else {
                    push_char(&mut current_name, c);
                }
                continue;
            }

            if c.is_whitespace() {
                continue;
            }

            match c {
                '\'' | '"' => quote = Some(c),
                '[' => in_comment = true,
                ':' => in_length = true,
                '(' => {
                    // Start subtree
                    in_length = false;
                    match parent_stack.last() {
                        None => parent_stack.push(tree.add(Node::new())),
                        Some(&parent) => parent_stack.push(tree.add_child(Node::new(), parent)),
                    }
                    open_brackets += 1;
                }
                ',' => {
                    // Add sibling
                    in_length = false;
                    tree.settle_current(&mut current_index, &parent_stack, &mut current_name)?;
                    current_index = None;
                }
                ')' => {
                    // Close subtree
                    in_length = false;
                    if open_brackets == 0 {
                        return Err(NewickParseError::NoSubtreeParent);
                    }
                    open_brackets -= 1;
                    tree.settle_current(&mut current_index, &parent_stack, &mut current_name)?;
                    current_index = parent_stack.pop();
                }
                ';' => {
                    // Finish parsing the tree
                    if open_brackets > 0 {
                        return Err(NewickParseError::UnclosedBracket);
                    }
                    match current_index {
                        Some(id) => {
                            if let Some(name) = current_name.take() {
                                tree.get_mut(id).set_name(name);
                            }
                        }
                        None => match current_name.take() {
                            Some(name) => {
                                tree.add(Node::new_named(&name));
                            }
                            None => return Err(NewickParseError::EmptyTree),
                        },
                    }
                    return Ok(tree);
                }
                _ => {
                    if !in_length {
                        push_char(&mut current_name, c);
                    }
                }
            }
        }

        Err(NewickParseError::NoClosingSemicolon)
    }

    /// Attach the name accumulated so far to the node being closed,
    /// creating a fresh leaf under the innermost open subtree if needed.
    fn settle_current(
        &mut self,
        current_index: &mut Option<NodeId>,
        parent_stack: &[NodeId],
        current_name: &mut Option<String>,
    ) -> Result<(), NewickParseError> {
        let id = match *current_index {
            Some(id) => id,
            None => {
                let parent = *parent_stack
                    .last()
                    .ok_or(NewickParseError::NoSubtreeParent)?;
                let id = self.add_child(Node::new(), parent);
                *current_index = Some(id);
                id
            }
        };
        if let Some(name) = current_name.take() {
            self.get_mut(id).set_name(name);
        }
        Ok(())
    }
}

fn push_char(name: &mut Option<String>, c: char) {
    match name.as_mut() {
        Some(name) => name.push(c),
        None => *name = Some(c.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_names(tree: &Supertree) -> Vec<String> {
        tree.leaves()
            .iter()
            .filter_map(|&id| tree.name(id).map(str::to_string))
            .collect()
    }

    #[test]
    fn parse_rooted() {
        let tree = Supertree::from_newick("((A,B),(C,D));").unwrap();
        assert_eq!(tree.size(), 7);
        assert_eq!(tree.n_leaves(), 4);
        assert_eq!(leaf_names(&tree), vec!["A", "B", "C", "D"]);
        assert!(tree.is_binary());

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).children.len(), 2);
    }

    #[test]
    fn parse_trifurcation() {
        let tree = Supertree::from_newick("((s1,s2),s3,(s4,s5));").unwrap();
        assert_eq!(tree.n_leaves(), 5);
        assert!(tree.is_binary());

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).children.len(), 3);
    }

    #[test]
    fn parse_discards_lengths_and_comments() {
        let plain = Supertree::from_newick("((A,B),C);").unwrap();
        let annotated =
            Supertree::from_newick("((A:0.1,B:0.2)node[comment]:0.3,C:1e-2);").unwrap();

        assert_eq!(leaf_names(&annotated), leaf_names(&plain));
        assert_eq!(annotated.size(), plain.size());
        assert!(annotated.leaf_named("A").is_some());
    }

    #[test]
    fn parse_quoted_names() {
        let tree = Supertree::from_newick("(('Homo sapiens',\"Mus musculus\"),Rattus);").unwrap();
        assert!(tree.leaf_named("Homo sapiens").is_some());
        assert!(tree.leaf_named("Mus musculus").is_some());
    }

    #[test]
    fn binary_checks() {
        let test_cases = vec![
            ("((A,B,C)D,E);", false),  // rooted non binary
            ("(A,B,(C,D)E);", true),   // unrooted binary
            ("((D,E)B,(F,G)C)A;", true), // rooted binary
            ("(A,B,C,D);", false),     // four children at the root
            ("((A)B,C);", false),      // single-child node
        ];

        for (newick, is_binary) in test_cases {
            assert_eq!(
                Supertree::from_newick(newick).unwrap().is_binary(),
                is_binary,
                "{newick}"
            );
        }
    }

    #[test]
    fn contraction() {
        let tree = Supertree::from_newick("((s1,s2),(s3,s5),(s4));").unwrap();
        assert!(!tree.is_binary());

        let contracted = tree.contracted();
        assert!(contracted.is_binary());
        assert_eq!(contracted.n_leaves(), 5);

        let root = contracted.root().unwrap();
        let arities: Vec<_> = contracted
            .node(root)
            .children
            .iter()
            .map(|&c| contracted.node(c).children.len())
            .collect();
        assert_eq!(arities, vec![2, 2, 0]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Supertree::from_newick("((A,B),C)").unwrap_err(),
            NewickParseError::NoClosingSemicolon
        );
        assert_eq!(
            Supertree::from_newick("((A,B,C;").unwrap_err(),
            NewickParseError::UnclosedBracket
        );
        assert_eq!(
            Supertree::from_newick("A,B);").unwrap_err(),
            NewickParseError::NoSubtreeParent
        );
        assert_eq!(
            Supertree::from_newick(";").unwrap_err(),
            NewickParseError::EmptyTree
        );
    }

    #[test]
    fn single_leaf() {
        let tree = Supertree::from_newick("only;").unwrap();
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert!(!tree.is_binary());
    }
}
