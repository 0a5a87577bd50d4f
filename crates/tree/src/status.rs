use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::debug;

use crate::index::NodeIndex;
use crate::node::{CheckStatus, NodeId, TreeNode};

/// Marks the selected nodes and their subtrees `Checked` inside a nested
/// forest, then re-aggregates every ancestor reached through `pid`.
///
/// Statuses are rewritten in place. Returns how many selected ids resolved to
/// a node; ids that are not present are ignored.
///
/// 更新巢狀樹的勾選狀態：選取節點與其子孫設為已勾選，再由下而上重新計算祖先狀態。
pub fn update_check_status_nested<P>(forest: &mut [TreeNode<P>], selected: &[NodeId]) -> usize {
    let mut target = NestedTarget::new(forest);
    let resolved = propagate(&mut target, selected);
    debug!(selected = selected.len(), resolved, "updated nested check status");
    resolved
}

/// Same as [`update_check_status_nested`] for a flat list, where children are
/// found through their `pid`.
///
/// 更新扁平列表的勾選狀態。
pub fn update_check_status_flat<P>(nodes: &mut [TreeNode<P>], selected: &[NodeId]) -> usize {
    let mut target = FlatTarget::new(nodes);
    let resolved = propagate(&mut target, selected);
    debug!(selected = selected.len(), resolved, "updated flat check status");
    resolved
}

/// A node collection whose statuses can be cascaded and aggregated.
trait CheckTarget {
    type Handle: Clone + Eq + Hash;

    fn locate(&self, id: &NodeId) -> Option<Self::Handle>;
    /// Node referenced by the `pid` of `handle`.
    fn parent(&self, handle: &Self::Handle) -> Option<Self::Handle>;
    fn children(&self, handle: &Self::Handle) -> Vec<Self::Handle>;
    fn status(&self, handle: &Self::Handle) -> CheckStatus;
    fn set_status(&mut self, handle: &Self::Handle, status: CheckStatus);
}

fn propagate<T: CheckTarget>(target: &mut T, selected: &[NodeId]) -> usize {
    let handles: Vec<T::Handle> = selected.iter().filter_map(|id| target.locate(id)).collect();

    // Every cascade must land before any ancestor reads its children.
    let mut cascaded = HashSet::new();
    for handle in &handles {
        cascade_down(target, handle.clone(), &mut cascaded);
    }
    for handle in &handles {
        propagate_up(target, handle.clone());
    }
    handles.len()
}

fn cascade_down<T: CheckTarget>(target: &mut T, start: T::Handle, visited: &mut HashSet<T::Handle>) {
    let mut stack = vec![start];
    while let Some(handle) = stack.pop() {
        if !visited.insert(handle.clone()) {
            continue;
        }
        target.set_status(&handle, CheckStatus::Checked);
        stack.extend(target.children(&handle));
    }
}

fn propagate_up<T: CheckTarget>(target: &mut T, start: T::Handle) {
    let mut walked = HashSet::new();
    walked.insert(start.clone());
    let mut current = start;
    while let Some(parent) = target.parent(&current) {
        if !walked.insert(parent.clone()) {
            break;
        }
        let statuses: Vec<CheckStatus> = target
            .children(&parent)
            .iter()
            .map(|child| target.status(child))
            .collect();
        if let Some(status) = CheckStatus::aggregate(statuses) {
            target.set_status(&parent, status);
        }
        current = parent;
    }
}

struct FlatTarget<'a, P> {
    nodes: &'a mut [TreeNode<P>],
    index: NodeIndex,
}

impl<'a, P> FlatTarget<'a, P> {
    fn new(nodes: &'a mut [TreeNode<P>]) -> Self {
        let index = NodeIndex::build(nodes);
        Self { nodes, index }
    }
}

impl<P> CheckTarget for FlatTarget<'_, P> {
    type Handle = usize;

    fn locate(&self, id: &NodeId) -> Option<usize> {
        self.index.position(id)
    }

    fn parent(&self, handle: &usize) -> Option<usize> {
        self.index.parent_position(self.nodes[*handle].pid.as_ref())
    }

    fn children(&self, handle: &usize) -> Vec<usize> {
        self.index.children_of(&self.nodes[*handle].id).to_vec()
    }

    fn status(&self, handle: &usize) -> CheckStatus {
        self.nodes[*handle].check
    }

    fn set_status(&mut self, handle: &usize, status: CheckStatus) {
        self.nodes[*handle].check = status;
    }
}

/// Nested nodes addressed by their child-index path from the forest.
struct NestedTarget<'a, P> {
    forest: &'a mut [TreeNode<P>],
    paths: HashMap<NodeId, Vec<usize>>,
}

impl<'a, P> NestedTarget<'a, P> {
    fn new(forest: &'a mut [TreeNode<P>]) -> Self {
        let mut paths = HashMap::new();
        let mut stack: Vec<(Vec<usize>, &TreeNode<P>)> = forest
            .iter()
            .enumerate()
            .rev()
            .map(|(i, node)| (vec![i], node))
            .collect();
        while let Some((path, node)) = stack.pop() {
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
            paths.entry(node.id.clone()).or_insert(path);
        }
        Self { forest, paths }
    }

    fn node(&self, path: &[usize]) -> Option<&TreeNode<P>> {
        let (&first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.forest.get(first)?, |node, &i| node.children.get(i))
    }

    fn node_mut(&mut self, path: &[usize]) -> Option<&mut TreeNode<P>> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.forest.get_mut(first)?;
        for &i in rest {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }
}

impl<P> CheckTarget for NestedTarget<'_, P> {
    type Handle = Vec<usize>;

    fn locate(&self, id: &NodeId) -> Option<Vec<usize>> {
        self.paths.get(id).cloned()
    }

    fn parent(&self, handle: &Vec<usize>) -> Option<Vec<usize>> {
        let pid = self.node(handle)?.pid.as_ref()?;
        self.paths.get(pid).cloned()
    }

    fn children(&self, handle: &Vec<usize>) -> Vec<Vec<usize>> {
        let count = self.node(handle).map_or(0, |node| node.children.len());
        (0..count)
            .map(|i| {
                let mut path = handle.clone();
                path.push(i);
                path
            })
            .collect()
    }

    fn status(&self, handle: &Vec<usize>) -> CheckStatus {
        self.node(handle).map(|node| node.check).unwrap_or_default()
    }

    fn set_status(&mut self, handle: &Vec<usize>, status: CheckStatus) {
        if let Some(node) = self.node_mut(handle) {
            node.check = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_tree;
    use CheckStatus::*;

    /// A(B(C, D), E)
    fn flat() -> Vec<TreeNode> {
        vec![
            TreeNode::new("A", "A"),
            TreeNode::new("B", "B").with_pid("A"),
            TreeNode::new("C", "C").with_pid("B"),
            TreeNode::new("D", "D").with_pid("B"),
            TreeNode::new("E", "E").with_pid("A"),
        ]
    }

    fn status_of(nodes: &[TreeNode], id: &str) -> CheckStatus {
        nodes
            .iter()
            .find(|node| node.id == NodeId::from(id))
            .map(|node| node.check)
            .unwrap()
    }

    fn nested_status(forest: &[TreeNode], id: &str) -> CheckStatus {
        TreeNode::find(forest, &NodeId::from(id)).unwrap().check
    }

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().map(|id| NodeId::from(*id)).collect()
    }

    #[test]
    fn all_children_selected_checks_the_parent() {
        let mut nodes = flat();
        let resolved = update_check_status_flat(&mut nodes, &ids(&["C", "D"]));
        assert_eq!(resolved, 2);
        assert_eq!(status_of(&nodes, "C"), Checked);
        assert_eq!(status_of(&nodes, "D"), Checked);
        assert_eq!(status_of(&nodes, "B"), Checked);
        assert_eq!(status_of(&nodes, "A"), HalfChecked);
        assert_eq!(status_of(&nodes, "E"), Unchecked);
    }

    #[test]
    fn selecting_every_leaf_of_a_chain_checks_the_root() {
        // A(B(C, D))
        let chain = || {
            let mut nodes = flat();
            nodes.retain(|node| node.id != NodeId::from("E"));
            nodes
        };

        let mut nodes = chain();
        update_check_status_flat(&mut nodes, &ids(&["C", "D"]));
        for id in ["A", "B", "C", "D"] {
            assert_eq!(status_of(&nodes, id), Checked, "node {id}");
        }

        let mut forest = build_tree(&chain());
        update_check_status_nested(&mut forest, &ids(&["C", "D"]));
        assert_eq!(nested_status(&forest, "A"), Checked);
        assert_eq!(nested_status(&forest, "B"), Checked);

        let mut nodes = chain();
        update_check_status_flat(&mut nodes, &ids(&["C"]));
        assert_eq!(status_of(&nodes, "B"), HalfChecked);
        assert_eq!(status_of(&nodes, "A"), HalfChecked);
    }

    #[test]
    fn single_child_half_checks_every_ancestor() {
        let mut nodes = flat();
        update_check_status_flat(&mut nodes, &ids(&["C"]));
        assert_eq!(status_of(&nodes, "B"), HalfChecked);
        assert_eq!(status_of(&nodes, "A"), HalfChecked);
    }

    #[test]
    fn selecting_a_parent_checks_its_subtree() {
        let mut nodes = flat();
        update_check_status_flat(&mut nodes, &ids(&["B", "E"]));
        for id in ["A", "B", "C", "D", "E"] {
            assert_eq!(status_of(&nodes, id), Checked, "node {id}");
        }
    }

    #[test]
    fn selection_order_does_not_change_the_result() {
        let mut nodes = flat();
        update_check_status_flat(&mut nodes, &ids(&["E", "B"]));
        assert_eq!(status_of(&nodes, "A"), Checked);
    }

    #[test]
    fn missing_ids_are_ignored() {
        let mut nodes = flat();
        let resolved = update_check_status_flat(&mut nodes, &ids(&["Z"]));
        assert_eq!(resolved, 0);
        assert!(nodes.iter().all(|node| node.check == Unchecked));
    }

    #[test]
    fn cyclic_parents_terminate() {
        let mut nodes: Vec<TreeNode> = vec![
            TreeNode::new(1, "a").with_pid(2),
            TreeNode::new(2, "b").with_pid(1),
        ];
        update_check_status_flat(&mut nodes, &[NodeId::Int(1)]);
        assert!(nodes.iter().all(|node| node.check == Checked));
    }

    #[test]
    fn nested_matches_flat_semantics() {
        let mut forest = build_tree(&flat());
        let resolved = update_check_status_nested(&mut forest, &ids(&["C"]));
        assert_eq!(resolved, 1);
        assert_eq!(nested_status(&forest, "C"), Checked);
        assert_eq!(nested_status(&forest, "D"), Unchecked);
        assert_eq!(nested_status(&forest, "B"), HalfChecked);
        assert_eq!(nested_status(&forest, "A"), HalfChecked);

        update_check_status_nested(&mut forest, &ids(&["D", "E"]));
        for id in ["A", "B", "C", "D", "E"] {
            assert_eq!(nested_status(&forest, id), Checked, "node {id}");
        }
    }

    #[test]
    fn nested_aggregation_recomputes_previously_checked_parents() {
        let mut forest = build_tree(&flat());
        update_check_status_nested(&mut forest, &ids(&["A"]));
        assert_eq!(nested_status(&forest, "C"), Checked);

        // Cleared by hand; ancestors must be recomputed from the fresh state.
        if let Some(node) = forest[0].children[0].children.get_mut(0) {
            node.check = Unchecked;
        }
        update_check_status_nested(&mut forest, &ids(&["D"]));
        assert_eq!(nested_status(&forest, "B"), HalfChecked);
        assert_eq!(nested_status(&forest, "A"), HalfChecked);
    }

    #[test]
    fn empty_collections_are_fine() {
        let mut nodes: Vec<TreeNode> = Vec::new();
        assert_eq!(update_check_status_flat(&mut nodes, &ids(&["A"])), 0);
        assert_eq!(update_check_status_nested(&mut nodes, &ids(&["A"])), 0);
    }
}
