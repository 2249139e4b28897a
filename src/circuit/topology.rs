//! Topology discovery: mapping element terminals onto shared nodes.

use super::node::{Node, NodeLink};
use super::types::{ElementId, NodeId};
use crate::elements::Element;

/// Nodes and voltage sources discovered by `analyze()`.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// All nodes; index 0 is ground
    pub nodes: Vec<Node>,
    /// Voltage source index -> (owning element, local source index)
    pub voltage_sources: Vec<(ElementId, usize)>,
    /// Whether any element re-stamps the matrix every sub-iteration
    pub nonlinear: bool,
}

impl Topology {
    /// Build nodes for `elements` and assign their terminals and voltage sources.
    ///
    /// External terminals at the same post share the first node found
    /// there; internal nodes are always fresh. Voltage sources are numbered
    /// in element order.
    pub fn discover(elements: &mut [Box<dyn Element>]) -> Self {
        let mut nodes = vec![Node::ground()];

        for (idx, element) in elements.iter_mut().enumerate() {
            let id = ElementId(idx);
            let posts = element.post_count();

            for terminal in 0..posts {
                let post = element.post(terminal);
                let link = NodeLink {
                    element: id,
                    terminal,
                };
                let node = match nodes.iter().position(|n| n.accepts(post)) {
                    Some(existing) => {
                        nodes[existing].links.push(link);
                        existing
                    }
                    None => {
                        let mut node = Node::at(post);
                        node.links.push(link);
                        nodes.push(node);
                        nodes.len() - 1
                    }
                };
                element.core_mut().set_node(terminal, NodeId(node));
            }

            for j in 0..element.internal_node_count() {
                let terminal = posts + j;
                let mut node = Node::internal();
                node.links.push(NodeLink {
                    element: id,
                    terminal,
                });
                element.core_mut().set_node(terminal, NodeId(nodes.len()));
                nodes.push(node);
            }
        }

        let mut voltage_sources = Vec::new();
        let mut nonlinear = false;
        for (idx, element) in elements.iter_mut().enumerate() {
            nonlinear |= element.is_nonlinear();
            for local in 0..element.voltage_source_count() {
                element.set_voltage_source(local, voltage_sources.len());
                voltage_sources.push((ElementId(idx), local));
            }
        }

        Self {
            nodes,
            voltage_sources,
            nonlinear,
        }
    }

    /// Nodes including ground.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn voltage_source_count(&self) -> usize {
        self.voltage_sources.len()
    }

    /// Dimension of the MNA system.
    pub fn matrix_size(&self) -> usize {
        (self.node_count() - 1) + self.voltage_source_count()
    }

    /// Find the external node at `post`.
    pub fn find_node(&self, post: super::Post) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.accepts(post)).map(NodeId)
    }
}
