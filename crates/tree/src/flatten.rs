use tracing::debug;

use crate::node::{CheckStatus, NodeId, TreeNode};

/// Flattens a nested forest into a list, children before their parent.
///
/// Each subtree is emitted post-order: a node's descendants come first, then
/// the node itself with `pid` rewritten to the node it was nested under (the
/// root sentinel for top-level nodes). Every record is reset to
/// [`CheckStatus::Unchecked`] and loses its `children` and match marker;
/// the payload is carried over unchanged.
///
/// 將巢狀樹轉為扁平列表（後序：子節點先於父節點），並重設勾選狀態。
pub fn tree_to_flat<P: Clone>(forest: &[TreeNode<P>]) -> Vec<TreeNode<P>> {
    let mut flat = Vec::new();
    let mut stack: Vec<Visit<'_, P>> = forest
        .iter()
        .rev()
        .map(|node| Visit {
            node,
            pid: None,
            expanded: false,
        })
        .collect();

    while let Some(visit) = stack.pop() {
        if visit.expanded {
            let mut record = visit.node.detached();
            record.pid = visit.pid.cloned();
            record.check = CheckStatus::Unchecked;
            record.is_matched = false;
            flat.push(record);
            continue;
        }
        let node = visit.node;
        stack.push(Visit {
            expanded: true,
            ..visit
        });
        stack.extend(node.children.iter().rev().map(|child| Visit {
            node: child,
            pid: Some(&node.id),
            expanded: false,
        }));
    }

    debug!(records = flat.len(), roots = forest.len(), "flattened tree");
    flat
}

struct Visit<'a, P> {
    node: &'a TreeNode<P>,
    pid: Option<&'a NodeId>,
    expanded: bool,
}
