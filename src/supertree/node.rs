use std::fmt::{Debug, Display};

use super::NodeId;

/// A node of the supertree
#[derive(Clone, Default)]
pub struct Node {
    /// Index of the node
    pub id: NodeId,
    /// Name of the node; leaves carry species labels
    pub name: Option<String>,
    /// Index of the parent node
    pub parent: Option<NodeId>,
    /// Indices of child nodes
    pub children: Vec<NodeId>,
}

impl Node {
    /// Creates a new Node
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new named Node
    pub fn new_named(name: &str) -> Self {
        Self {
            name: Some(String::from(name)),
            ..Self::default()
        }
    }

    /// Sets the internal Node name
    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Sets the internal Node id
    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// Set the parent node
    pub fn set_parent(&mut self, parent: NodeId) {
        self.parent = Some(parent);
    }

    /// Adds a child to the node
    pub fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Check if the node is a tip node
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if the node is a root node
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.name)
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} Id[{}] Parent[{:?}] Children({:?})",
            self.name, self.id, self.parent, self.children,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tips_and_roots() {
        let mut parent = Node::new();
        parent.set_id(0);
        let mut child = Node::new_named("A");
        child.set_id(1);

        child.set_parent(parent.id);
        parent.add_child(child.id);

        assert!(parent.is_root());
        assert!(!parent.is_tip());
        assert!(child.is_tip());
        assert!(!child.is_root());
        assert_eq!(child.name.as_deref(), Some("A"));
    }
}
