use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::index::NodeIndex;
use crate::node::{NodeId, TreeNode};

/// Finds nodes whose `name` contains `keyword` (case-sensitive; an empty
/// keyword matches everything) and returns them with their ancestors and
/// descendants.
///
/// Matches are appended in input order. For each match, in input order, its
/// descendants are appended depth-first, then its ancestors not yet present
/// are pushed to the front one at a time while walking up, so ancestor order
/// reflects discovery rather than root-to-leaf position. No id appears twice.
///
/// With `mark` set, matches carry `is_matched = true`; context nodes are
/// returned as they are.
///
/// 依關鍵字搜尋節點，並連同其祖先與子孫一併回傳。
pub fn search_with_relations<P: Clone>(
    nodes: &[TreeNode<P>],
    keyword: &str,
    mark: bool,
) -> Vec<TreeNode<P>> {
    let result = relational_closure(
        nodes,
        |node| node.name.contains(keyword),
        |node| {
            let mut matched = node.clone();
            if mark {
                matched.is_matched = true;
            }
            matched
        },
    );
    debug!(keyword, mark, nodes = nodes.len(), related = result.len(), "searched tree");
    result
}

/// Expands an explicit selection into the selection plus every ancestor and
/// descendant, using the same ordering rules as [`search_with_relations`].
/// Selected nodes are never marked.
///
/// 取得選取節點及其所有祖先與子孫。
pub fn select_related_nodes<P: Clone>(nodes: &[TreeNode<P>], selected: &[NodeId]) -> Vec<TreeNode<P>> {
    let wanted: HashSet<&NodeId> = selected.iter().collect();
    let result = relational_closure(nodes, |node| wanted.contains(&node.id), TreeNode::clone);
    debug!(
        selected = selected.len(),
        nodes = nodes.len(),
        related = result.len(),
        "selected related nodes"
    );
    result
}

fn relational_closure<P, S, E>(nodes: &[TreeNode<P>], is_seed: S, emit_seed: E) -> Vec<TreeNode<P>>
where
    P: Clone,
    S: Fn(&TreeNode<P>) -> bool,
    E: Fn(&TreeNode<P>) -> TreeNode<P>,
{
    let index = NodeIndex::build(nodes);
    let seeds: Vec<usize> = (0..nodes.len()).filter(|&i| is_seed(&nodes[i])).collect();

    let mut present: HashSet<&NodeId> = HashSet::new();
    let mut result: VecDeque<TreeNode<P>> = VecDeque::new();
    for &seed in &seeds {
        let node = &nodes[seed];
        if present.insert(&node.id) {
            result.push_back(emit_seed(node));
        }
    }

    // Ids whose children were already walked; walking them again adds nothing.
    let mut expanded: HashSet<&NodeId> = HashSet::new();
    for &seed in &seeds {
        let node = &nodes[seed];

        if expanded.insert(&node.id) {
            let mut stack: Vec<usize> = index.children_of(&node.id).iter().rev().copied().collect();
            while let Some(position) = stack.pop() {
                let child = &nodes[position];
                if present.insert(&child.id) {
                    result.push_back(child.clone());
                }
                if expanded.insert(&child.id) {
                    stack.extend(index.children_of(&child.id).iter().rev());
                }
            }
        }

        let mut walked: HashSet<usize> = HashSet::new();
        let mut parent = index.parent_position(node.pid.as_ref());
        while let Some(position) = parent {
            if !walked.insert(position) {
                break;
            }
            let ancestor = &nodes[position];
            if present.insert(&ancestor.id) {
                result.push_front(ancestor.clone());
            }
            parent = index.parent_position(ancestor.pid.as_ref());
        }
    }

    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> a -> b, root -> c
    fn flat() -> Vec<TreeNode> {
        vec![
            TreeNode::new("root", "root"),
            TreeNode::new("a", "alpha").with_pid("root"),
            TreeNode::new("b", "beta").with_pid("a"),
            TreeNode::new("c", "gamma").with_pid("root"),
        ]
    }

    fn ids(nodes: &[TreeNode]) -> Vec<String> {
        nodes.iter().map(|node| node.id.to_string()).collect()
    }

    #[test]
    fn match_brings_its_ancestors_but_not_siblings() {
        let result = search_with_relations(&flat(), "beta", true);
        assert_eq!(ids(&result), vec!["root", "a", "b"]);
        assert!(result[2].is_matched);
        assert!(!result[0].is_matched && !result[1].is_matched);
    }

    #[test]
    fn ancestors_are_front_inserted_in_discovery_order() {
        // Walking up from "b" finds "a" first, then "root"; each goes to the front.
        let nodes: Vec<TreeNode> = vec![
            TreeNode::new("b", "beta").with_pid("a"),
            TreeNode::new("a", "alpha").with_pid("root"),
            TreeNode::new("root", "root"),
        ];
        assert_eq!(ids(&search_with_relations(&nodes, "beta", false)), vec!["root", "a", "b"]);

        // "alpha", "beta" and "gamma" all match; only "root" is context.
        let result = search_with_relations(&flat(), "a", false);
        assert_eq!(ids(&result), vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn descendants_follow_matches_depth_first() {
        let nodes: Vec<TreeNode> = vec![
            TreeNode::new(1, "top"),
            TreeNode::new(2, "mid").with_pid(1),
            TreeNode::new(3, "leaf-x").with_pid(2),
            TreeNode::new(4, "side").with_pid(1),
            TreeNode::new(5, "leaf-y").with_pid(2),
        ];
        let result = search_with_relations(&nodes, "top", true);
        assert_eq!(ids(&result), vec!["1", "2", "3", "5", "4"]);
        assert_eq!(result.iter().filter(|node| node.is_matched).count(), 1);
    }

    #[test]
    fn matched_child_of_match_keeps_walk_order() {
        let nodes: Vec<TreeNode> = vec![
            TreeNode::new(1, "hit"),
            TreeNode::new(2, "hit too").with_pid(1),
            TreeNode::new(3, "x").with_pid(2),
            TreeNode::new(4, "y").with_pid(1),
        ];
        let result = search_with_relations(&nodes, "hit", true);
        assert_eq!(ids(&result), vec!["1", "2", "3", "4"]);
        assert!(result[0].is_matched && result[1].is_matched);
        assert!(!result[2].is_matched);
    }

    #[test]
    fn empty_keyword_matches_everything_once() {
        let mut nodes = flat();
        nodes.push(TreeNode::new("a", "duplicate alpha").with_pid("root"));
        let result = search_with_relations(&nodes, "", true);
        assert_eq!(ids(&result), vec!["root", "a", "b", "c"]);
        assert!(result.iter().all(|node| node.is_matched));
    }

    #[test]
    fn search_is_case_sensitive_and_unmarked_on_request() {
        assert!(search_with_relations(&flat(), "BETA", true).is_empty());
        let result = search_with_relations(&flat(), "beta", false);
        assert!(result.iter().all(|node| !node.is_matched));
    }

    #[test]
    fn selection_closure_includes_ancestors_and_descendants() {
        let result = select_related_nodes(&flat(), &[NodeId::from("a")]);
        assert_eq!(ids(&result), vec!["root", "a", "b"]);
        assert!(result.iter().all(|node| !node.is_matched));
    }

    #[test]
    fn selection_seeds_follow_input_order() {
        let result = select_related_nodes(&flat(), &[NodeId::from("c"), NodeId::from("b")]);
        // Seeds in input order (b, c), then a and root pushed to the front.
        assert_eq!(ids(&result), vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn cycles_and_unknown_ids_terminate() {
        let nodes: Vec<TreeNode> = vec![
            TreeNode::new(1, "loop-a").with_pid(2),
            TreeNode::new(2, "loop-b").with_pid(1),
        ];
        let result = select_related_nodes(&nodes, &[NodeId::Int(1), NodeId::Int(9)]);
        assert_eq!(ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn empty_inputs_give_empty_results() {
        let nodes: Vec<TreeNode> = Vec::new();
        assert!(search_with_relations(&nodes, "", true).is_empty());
        assert!(select_related_nodes(&flat(), &[]).is_empty());
    }
}
