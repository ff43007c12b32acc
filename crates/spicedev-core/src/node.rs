//! Node identifiers and internal-node allocation.

use std::fmt;

/// Unique identifier for a circuit node (an unknown in the solution vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Index into a solution or RHS vector (slot 0 is ground).
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Creates internal nodes on behalf of a device during setup.
///
/// Devices with series resistances introduce "prime" nodes between the
/// external terminal and the intrinsic device; the topology layer owns
/// the numbering.
pub trait NodeAllocator {
    /// Create a new internal node named after its owning device.
    fn internal_node(&mut self, owner: &str, suffix: &str) -> NodeId;
}

/// A simple growable node table.
///
/// Node 0 is ground; every other node gets the next free number.
#[derive(Debug, Clone)]
pub struct NodeTable {
    names: Vec<String>,
}

impl NodeTable {
    /// Create a table holding only the ground node.
    pub fn new() -> Self {
        Self {
            names: vec!["0".to_string()],
        }
    }

    /// Add an external node and return its id.
    pub fn add(&mut self, name: impl Into<String>) -> NodeId {
        self.names.push(name.into());
        NodeId((self.names.len() - 1) as u32)
    }

    /// Number of non-ground nodes.
    pub fn num_nodes(&self) -> usize {
        self.names.len() - 1
    }

    /// Name of a node, if it exists.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.names.get(node.index()).map(String::as_str)
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeAllocator for NodeTable {
    fn internal_node(&mut self, owner: &str, suffix: &str) -> NodeId {
        self.add(format!("{owner}#{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.index(), 0);
        assert!(!NodeId::new(3).is_ground());
        assert_eq!(format!("{}", NodeId::GROUND), "GND");
    }

    #[test]
    fn test_internal_nodes_are_numbered_after_external() {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let g = table.add("g");
        let dp = table.internal_node("M1", "drain");

        assert_eq!(d, NodeId::new(1));
        assert_eq!(g, NodeId::new(2));
        assert_eq!(dp, NodeId::new(3));
        assert_eq!(table.name(dp), Some("M1#drain"));
        assert_eq!(table.num_nodes(), 3);
    }
}
