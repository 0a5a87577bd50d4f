use std::collections::HashSet;

use tracing::{debug, trace};

use crate::node::{NodeId, TreeNode};

/// Returns a copy of `nodes` without the selected ids and without their
/// direct children.
///
/// Only one level cascades: a grandchild of a removed node survives unless its
/// own parent is selected too. Expand the selection with
/// [`crate::select_related_nodes`] first (or call repeatedly) when the whole
/// subtree has to go. The single-level cascade is a suspected limitation;
/// callers already depend on it, so it is not deepened here.
///
/// 移除選取節點及其直接子節點（僅一層）。
pub fn remove_nodes<P: Clone>(nodes: &[TreeNode<P>], selected: &[NodeId]) -> Vec<TreeNode<P>> {
    let doomed: HashSet<&NodeId> = selected.iter().collect();
    let remaining: Vec<TreeNode<P>> = nodes
        .iter()
        .filter(|node| {
            !doomed.contains(&node.id)
                && !node.pid.as_ref().is_some_and(|pid| doomed.contains(pid))
        })
        .cloned()
        .collect();
    debug!(
        nodes = nodes.len(),
        removed = nodes.len() - remaining.len(),
        "removed nodes"
    );
    remaining
}

/// Appends every incoming node whose id is new and whose parent is either the
/// root sentinel or already present in `nodes`.
///
/// Presence is checked against the list as it grows, so a node may attach to
/// one merged earlier in the same call, but only if the parent comes first;
/// nothing is retried. Rejected nodes are dropped silently. Returns the number
/// of nodes appended.
///
/// 將新節點合併至既有列表；id 重複或父節點不存在者略過。
pub fn merge_nodes<P>(nodes: &mut Vec<TreeNode<P>>, incoming: Vec<TreeNode<P>>) -> usize {
    let mut known: HashSet<NodeId> = nodes.iter().map(|node| node.id.clone()).collect();
    let offered = incoming.len();
    let mut merged = 0;
    for node in incoming {
        if known.contains(&node.id) {
            trace!(id = %node.id, "merge skipped existing id");
            continue;
        }
        if let Some(pid) = node.pid.as_ref() {
            if !known.contains(pid) {
                trace!(id = %node.id, parent = %pid, "merge skipped unattached node");
                continue;
            }
        }
        known.insert(node.id.clone());
        nodes.push(node);
        merged += 1;
    }
    debug!(offered, merged, total = nodes.len(), "merged nodes");
    merged
}
