//! Edits on criteria trees already stored on the ad server.
//!
//! Stored trees come back wrapped as `OR[AND[...]]`; freshly compiled trees
//! are a bare `AND[...]`. Both shapes expose one managed AND set, and every
//! edit here works on its direct children. Each function returns `false`
//! when the tree has neither shape and leaves it untouched.

use adserver_state::KeyId;

use super::{CriteriaNode, LogicalOperator};

/// Direct children of the managed AND set, if the tree has one.
pub fn managed_children(root: &CriteriaNode) -> Option<&[CriteriaNode]> {
    match root {
        CriteriaNode::Set {
            logical_operator: LogicalOperator::And,
            children,
        } => Some(children.as_slice()),
        CriteriaNode::Set {
            logical_operator: LogicalOperator::Or,
            children,
        } => match children.first() {
            Some(CriteriaNode::Set {
                logical_operator: LogicalOperator::And,
                children,
            }) => Some(children.as_slice()),
            _ => None,
        },
        CriteriaNode::Criterion { .. } => None,
    }
}

fn managed_children_mut(root: &mut CriteriaNode) -> Option<&mut Vec<CriteriaNode>> {
    match root {
        CriteriaNode::Set {
            logical_operator: LogicalOperator::And,
            children,
        } => Some(children),
        CriteriaNode::Set {
            logical_operator: LogicalOperator::Or,
            children,
        } => match children.first_mut() {
            Some(CriteriaNode::Set {
                logical_operator: LogicalOperator::And,
                children,
            }) => Some(children),
            _ => None,
        },
        CriteriaNode::Criterion { .. } => None,
    }
}

/// Append `nodes` after the existing managed criteria.
pub fn append_criteria(root: &mut CriteriaNode, nodes: &[CriteriaNode]) -> bool {
    match managed_children_mut(root) {
        Some(children) => {
            children.extend_from_slice(nodes);
            true
        }
        None => false,
    }
}

/// Drop every direct criterion on `key_id`. Returns `true` if anything was
/// removed.
pub fn remove_key(root: &mut CriteriaNode, key_id: KeyId) -> bool {
    match managed_children_mut(root) {
        Some(children) => {
            let before = children.len();
            children.retain(|node| node.key_id() != Some(key_id));
            children.len() != before
        }
        None => false,
    }
}

/// Swap whatever targets `key_id` for `replacement`, which goes last.
pub fn replace_key(root: &mut CriteriaNode, key_id: KeyId, replacement: CriteriaNode) -> bool {
    match managed_children_mut(root) {
        Some(children) => {
            children.retain(|node| node.key_id() != Some(key_id));
            children.push(replacement);
            true
        }
        None => false,
    }
}
