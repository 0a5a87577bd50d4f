use std::collections::HashSet;

use tracing::{debug, trace};

use crate::index::NodeIndex;
use crate::node::{NodeId, TreeNode};

/// Builds a nested forest from a flat node list.
///
/// Roots are the nodes whose `pid` is the root sentinel, in input order. A
/// non-root node is attached under the first node carrying its `pid`; a node
/// whose parent does not exist is dropped, and so is a second node with the
/// same id under the same parent. Incoming `children` fields are ignored.
///
/// The input slice is left untouched: every emitted node is a fresh copy with
/// its `children` rebuilt from the flat relationships.
///
/// 依 `pid` 關係將扁平節點列表組合為巢狀樹；輸入不會被修改。
pub fn build_tree<P: Clone>(nodes: &[TreeNode<P>]) -> Vec<TreeNode<P>> {
    let index = NodeIndex::build(nodes);
    let mut attached: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut attached_ids: Vec<HashSet<&NodeId>> = vec![HashSet::new(); nodes.len()];

    for (position, node) in nodes.iter().enumerate() {
        let Some(pid) = node.pid.as_ref() else {
            continue;
        };
        match index.position(pid) {
            Some(parent) => {
                if attached_ids[parent].insert(&node.id) {
                    attached[parent].push(position);
                } else {
                    trace!(id = %node.id, parent = %pid, "skipping duplicate child");
                }
            }
            None => trace!(id = %node.id, parent = %pid, "dropping node with missing parent"),
        }
    }

    let roots = index.roots();
    // Pre-order over reachable positions; each position has a single parent,
    // so nothing unreachable from a root (cycles included) is ever visited.
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(position) = stack.pop() {
        order.push(position);
        stack.extend(attached[position].iter().rev());
    }

    let mut built: Vec<Option<TreeNode<P>>> = (0..nodes.len()).map(|_| None).collect();
    for &position in order.iter().rev() {
        let mut node = nodes[position].detached();
        node.children = attached[position]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[position] = Some(node);
    }

    let forest: Vec<TreeNode<P>> = roots
        .iter()
        .filter_map(|&root| built[root].take())
        .collect();
    debug!(
        nodes = nodes.len(),
        roots = forest.len(),
        reachable = order.len(),
        "built tree"
    );
    forest
}
