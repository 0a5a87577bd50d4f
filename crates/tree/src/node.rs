use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-defined fields carried next to the structural ones.
/// 呼叫端自訂欄位，與結構欄位一同保存。
pub type Extra = Map<String, Value>;

/// Identifier of a node. Integer and string identifiers never compare equal.
/// 節點識別碼；整數與字串形式彼此不相等。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Str(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(value) => write!(f, "{value}"),
            NodeId::Str(value) => f.write_str(value),
        }
    }
}

impl FromStr for NodeId {
    type Err = Infallible;

    /// Integer-looking text becomes `Int`, anything else `Str`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(value) => NodeId::Int(value),
            Err(_) => NodeId::Str(s.to_string()),
        })
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Int(value)
    }
}

impl From<i32> for NodeId {
    fn from(value: i32) -> Self {
        NodeId::Int(i64::from(value))
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Str(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::Str(value)
    }
}

/// Tri-state selection status, encoded as `"0"`, `"1"`, `"2"` on the wire.
/// 三態勾選狀態，序列化為 `"0"`、`"1"`、`"2"`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    #[default]
    #[serde(rename = "0")]
    Unchecked,
    #[serde(rename = "1")]
    HalfChecked,
    #[serde(rename = "2")]
    Checked,
}

impl CheckStatus {
    /// Derives a parent status from the statuses of its direct children.
    /// Returns `None` for an empty child list; childless nodes are never aggregated.
    /// 依直接子節點狀態推導父節點狀態；無子節點時回傳 `None`。
    pub fn aggregate<I>(children: I) -> Option<Self>
    where
        I: IntoIterator<Item = CheckStatus>,
    {
        let mut any = false;
        let mut all_checked = true;
        let mut all_unchecked = true;
        for status in children {
            any = true;
            all_checked &= status == CheckStatus::Checked;
            all_unchecked &= status == CheckStatus::Unchecked;
        }
        if !any {
            None
        } else if all_checked {
            Some(CheckStatus::Checked)
        } else if all_unchecked {
            Some(CheckStatus::Unchecked)
        } else {
            Some(CheckStatus::HalfChecked)
        }
    }
}

/// A record that lives either in a flat list (hierarchy via `pid`) or in a
/// nested forest (hierarchy via `children`).
///
/// `Clone`, `PartialEq` and `Drop` walk nested children with a heap stack, so
/// arbitrarily deep forests are safe to copy, compare and free. `Debug` and
/// `Serialize` still recurse once per level.
///
/// 樹節點：可存在於扁平列表（以 `pid` 表示階層）或巢狀樹（以 `children` 表示）。
#[derive(Debug, Serialize, Deserialize)]
pub struct TreeNode<P = Extra> {
    pub id: NodeId,
    /// `None` is the root sentinel.
    #[serde(default)]
    pub pid: Option<NodeId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub check: CheckStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode<P>>,
    /// Set on keyword matches returned by [`crate::search_with_relations`].
    #[serde(default, rename = "isMatched", skip_serializing_if = "is_false")]
    pub is_matched: bool,
    #[serde(flatten)]
    pub payload: P,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl<P: Default> TreeNode<P> {
    /// Creates an unchecked root node with an empty payload.
    /// 建立未勾選、無附加資料的根節點。
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pid: None,
            name: name.into(),
            check: CheckStatus::Unchecked,
            children: Vec::new(),
            is_matched: false,
            payload: P::default(),
        }
    }
}

impl<P> TreeNode<P> {
    pub fn with_pid(mut self, pid: impl Into<NodeId>) -> Self {
        self.pid = Some(pid.into());
        self
    }

    pub fn with_check(mut self, check: CheckStatus) -> Self {
        self.check = check;
        self
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode<P>>) -> Self {
        self.children = children;
        self
    }

    pub fn is_root(&self) -> bool {
        self.pid.is_none()
    }

    /// Finds the first node with `id` in a nested forest, pre-order.
    /// 以前序走訪在巢狀樹中尋找第一個符合 `id` 的節點。
    pub fn find<'a>(forest: &'a [TreeNode<P>], id: &NodeId) -> Option<&'a TreeNode<P>> {
        let mut stack: Vec<&TreeNode<P>> = forest.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if &node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Number of nodes below this one in the nested representation.
    pub fn descendants_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&TreeNode<P>> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl<P: Clone> TreeNode<P> {
    /// Copy of the record without its nested children.
    pub(crate) fn detached(&self) -> Self {
        Self {
            id: self.id.clone(),
            pid: self.pid.clone(),
            name: self.name.clone(),
            check: self.check,
            children: Vec::new(),
            is_matched: self.is_matched,
            payload: self.payload.clone(),
        }
    }
}

impl<P: Clone> Clone for TreeNode<P> {
    fn clone(&self) -> Self {
        // Breadth-first, so every parent is listed before its children.
        let mut order: Vec<(&TreeNode<P>, Option<usize>)> =
            self.children.iter().map(|child| (child, None)).collect();
        let mut next = 0;
        while next < order.len() {
            let node = order[next].0;
            order.extend(node.children.iter().map(|child| (child, Some(next))));
            next += 1;
        }

        let mut copies: Vec<TreeNode<P>> = order.iter().map(|(node, _)| node.detached()).collect();
        let mut root = self.detached();
        // Children are attached last-first and reversed once their parent is popped.
        while let Some(mut copy) = copies.pop() {
            copy.children.reverse();
            match order[copies.len()].1 {
                Some(parent) => copies[parent].children.push(copy),
                None => root.children.push(copy),
            }
        }
        root.children.reverse();
        root
    }
}

impl<P: PartialEq> PartialEq for TreeNode<P> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            let same = left.id == right.id
                && left.pid == right.pid
                && left.name == right.name
                && left.check == right.check
                && left.is_matched == right.is_matched
                && left.children.len() == right.children.len()
                && left.payload == right.payload;
            if !same {
                return false;
            }
            pending.extend(left.children.iter().zip(right.children.iter()));
        }
        true
    }
}

impl<P> Drop for TreeNode<P> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}
