//! Hierarchical record reconciliation: flat lists with `pid` references and
//! nested forests of the same records, kept consistent across conversions,
//! tri-state check propagation, relational search and set edits.
//! 階層資料整合：扁平列表與巢狀樹互轉、三態勾選傳遞、關聯搜尋與集合編輯。
//!
//! Every operation works on one collection per call and keeps no state
//! between calls. Missing parents, unknown ids and duplicates degrade to
//! "left out of the result"; nothing here returns an error.

mod build;
mod closure;
mod edit;
mod flatten;
mod index;
mod node;
mod status;

pub use build::build_tree;
pub use closure::{search_with_relations, select_related_nodes};
pub use edit::{merge_nodes, remove_nodes};
pub use flatten::tree_to_flat;
pub use node::{CheckStatus, Extra, NodeId, TreeNode};
pub use status::{update_check_status_flat, update_check_status_nested};
