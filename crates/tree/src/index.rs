use std::collections::HashMap;

use crate::node::{NodeId, TreeNode};

/// Position lookups over a flat node slice, built in one pass.
///
/// `by_id` keeps the first occurrence of every id. `children` buckets every
/// non-root position under its `pid`; root positions go to `roots`. Buckets
/// keep input order and may reference nodes whose parent id does not exist in
/// the slice; such buckets are simply never reached from a parent.
#[derive(Debug, Default)]
pub(crate) struct NodeIndex {
    by_id: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<usize>>,
    roots: Vec<usize>,
}

impl NodeIndex {
    pub(crate) fn build<P>(nodes: &[TreeNode<P>]) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (position, node) in nodes.iter().enumerate() {
            by_id.entry(node.id.clone()).or_insert(position);
            match &node.pid {
                Some(pid) => children.entry(pid.clone()).or_default().push(position),
                None => roots.push(position),
            }
        }
        Self {
            by_id,
            children,
            roots,
        }
    }

    pub(crate) fn position(&self, id: &NodeId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Position of the node referenced by `pid`, if any.
    pub(crate) fn parent_position(&self, pid: Option<&NodeId>) -> Option<usize> {
        pid.and_then(|pid| self.position(pid))
    }

    /// Positions of every node whose `pid` equals `id`, in input order.
    pub(crate) fn children_of(&self, id: &NodeId) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn roots(&self) -> &[usize] {
        &self.roots
    }
}
