//! Parse and inspect the input supertree.
//!
//! This module defines the two structs holding the supertree handed to an
//! analysis:
//!  - The [`Node`] struct that represents one vertex of the supertree.
//!  - The [`Supertree`] struct that holds a collection of [`Node`] objects.
//!
//! The supertree is purely topological: branch lengths and comments in the
//! input Newick string are accepted and discarded.

mod node;
mod tree;

pub use self::node::Node;
pub use self::tree::{NewickParseError, Supertree};

/// A type that represents identifiers of [`Node`] objects
/// within a [`Supertree`] object.
pub type NodeId = usize;
