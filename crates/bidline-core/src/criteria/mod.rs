//! Custom targeting criteria trees.
//!
//! - `CriteriaNode`: one criterion or a boolean set of nodes, serialized in
//!   the ad server's `xsi_type`-tagged shape
//! - `compiler`: builds the AND-of-OR-sets tree attached to each line item
//! - `edit`: in-place edits on trees already stored on the ad server

pub mod compiler;
pub mod edit;

use std::str::FromStr;

use adserver_state::{KeyId, ValueId};
use serde::{Deserialize, Serialize};

use crate::domain::error::SetupError;

pub use compiler::{
    BidderSelection, CustomTargeting, CustomValues, TargetingCompiler, TargetingKeyNames,
    TargetingOptions,
};

/// Comparison applied by a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Is,
    IsNot,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Is => "IS",
            Operator::IsNot => "IS_NOT",
        }
    }
}

impl FromStr for Operator {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IS" => Ok(Operator::Is),
            "IS_NOT" => Ok(Operator::IsNot),
            other => Err(SetupError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// A node of a custom targeting tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "xsi_type")]
pub enum CriteriaNode {
    #[serde(rename = "CustomCriteria", rename_all = "camelCase")]
    Criterion {
        key_id: KeyId,
        value_ids: Vec<ValueId>,
        operator: Operator,
    },
    #[serde(rename = "CustomCriteriaSet", rename_all = "camelCase")]
    Set {
        logical_operator: LogicalOperator,
        children: Vec<CriteriaNode>,
    },
}

impl CriteriaNode {
    pub fn criterion(key_id: KeyId, value_id: ValueId, operator: Operator) -> Self {
        CriteriaNode::Criterion {
            key_id,
            value_ids: vec![value_id],
            operator,
        }
    }

    pub fn set(logical_operator: LogicalOperator, children: Vec<CriteriaNode>) -> Self {
        CriteriaNode::Set {
            logical_operator,
            children,
        }
    }

    pub fn and(children: Vec<CriteriaNode>) -> Self {
        Self::set(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<CriteriaNode>) -> Self {
        Self::set(LogicalOperator::Or, children)
    }

    /// Key targeted by a criterion; `None` for sets.
    pub fn key_id(&self) -> Option<KeyId> {
        match self {
            CriteriaNode::Criterion { key_id, .. } => Some(*key_id),
            CriteriaNode::Set { .. } => None,
        }
    }

    pub fn children(&self) -> &[CriteriaNode] {
        match self {
            CriteriaNode::Set { children, .. } => children,
            CriteriaNode::Criterion { .. } => &[],
        }
    }

    pub fn is_set_of(&self, op: LogicalOperator) -> bool {
        matches!(self, CriteriaNode::Set { logical_operator, .. } if *logical_operator == op)
    }

    /// Number of criteria in the tree, at any depth.
    pub fn criteria_count(&self) -> usize {
        match self {
            CriteriaNode::Criterion { .. } => 1,
            CriteriaNode::Set { children, .. } => {
                children.iter().map(CriteriaNode::criteria_count).sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse() {
        assert_eq!("IS".parse::<Operator>().unwrap(), Operator::Is);
        assert_eq!("IS_NOT".parse::<Operator>().unwrap(), Operator::IsNot);
        assert!(matches!(
            "CONTAINS".parse::<Operator>(),
            Err(SetupError::UnsupportedOperator(op)) if op == "CONTAINS"
        ));
    }

    #[test]
    fn test_node_wire_shape() {
        let tree = CriteriaNode::and(vec![CriteriaNode::criterion(
            KeyId(1),
            ValueId(2),
            Operator::IsNot,
        )]);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            value,
            json!({
                "xsi_type": "CustomCriteriaSet",
                "logicalOperator": "AND",
                "children": [{
                    "xsi_type": "CustomCriteria",
                    "keyId": 1,
                    "valueIds": [2],
                    "operator": "IS_NOT"
                }]
            })
        );
        let back: CriteriaNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_criteria_count_is_recursive() {
        let tree = CriteriaNode::and(vec![
            CriteriaNode::criterion(KeyId(1), ValueId(1), Operator::Is),
            CriteriaNode::or(vec![
                CriteriaNode::criterion(KeyId(2), ValueId(2), Operator::Is),
                CriteriaNode::criterion(KeyId(2), ValueId(3), Operator::Is),
            ]),
        ]);
        assert_eq!(tree.criteria_count(), 3);
        assert_eq!(tree.children().len(), 2);
        assert!(tree.is_set_of(LogicalOperator::And));
    }
}
