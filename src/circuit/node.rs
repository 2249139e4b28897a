//! Electrical nodes discovered by topology analysis.

use super::types::{ElementId, Post};

/// One element terminal attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLink {
    pub element: ElementId,
    /// Local terminal index on the element (posts first, then internal nodes)
    pub terminal: usize,
}

/// A junction of element terminals sharing one voltage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Attachment point; `None` for ground and for internal nodes
    pub post: Option<Post>,
    /// Synthesized by a multi-terminal element, never shared through posts
    pub internal: bool,
    pub links: Vec<NodeLink>,
}

impl Node {
    /// The synthetic ground node.
    pub fn ground() -> Self {
        Self::default()
    }

    /// An external node located at `post`.
    pub fn at(post: Post) -> Self {
        Self {
            post: Some(post),
            internal: false,
            links: Vec::new(),
        }
    }

    /// A hidden node owned by one element.
    pub fn internal() -> Self {
        Self {
            post: None,
            internal: true,
            links: Vec::new(),
        }
    }

    /// Whether an external terminal at `post` belongs to this node.
    pub fn accepts(&self, post: Post) -> bool {
        !self.internal && self.post == Some(post)
    }
}
