//! Criteria tree compilation.
//!
//! The compiled tree is always an AND set:
//!
//! ```text
//! AND
//! ├── marker IS "1"                  (always first)
//! ├── platform IS <label>            (omitted for in-app)
//! ├── bidder IS x | OR[bidder IS ..] (omitted when any bidder may serve)
//! ├── OR[price IS <label> ...]       (always present)
//! └── custom criteria, in configured order
//! ```
//!
//! Bidder, platform and custom criteria are resolved once when set and reused
//! for every line item; only the price branch changes per line item.

use adserver_state::{KeyId, KeyType, MatchType, ValueId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CriteriaNode, LogicalOperator, Operator};
use crate::domain::creative::CreativeType;
use crate::domain::error::{Result, SetupError};
use crate::domain::price::PriceBucket;
use crate::targeting::ValueResolver;

/// Which bidders a line item serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BidderSelection {
    Single(String),
    Many(Vec<String>),
}

impl BidderSelection {
    pub fn codes(&self) -> Vec<&str> {
        match self {
            BidderSelection::Single(code) => vec![code.as_str()],
            BidderSelection::Many(codes) => codes.iter().map(String::as_str).collect(),
        }
    }

    /// Name used in summaries (`pubmatic`, `a_b`).
    pub fn display_name(&self) -> String {
        self.codes().join("_")
    }
}

/// Value side of a custom targeting entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValues {
    One(String),
    Many(Vec<String>),
}

/// One `(key, operator, values)` custom targeting entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTargeting {
    pub key: String,
    pub operator: Operator,
    pub values: CustomValues,
}

impl CustomTargeting {
    pub fn new(key: impl Into<String>, operator: Operator, values: CustomValues) -> Self {
        Self {
            key: key.into(),
            operator,
            values,
        }
    }
}

/// Names of the keys the compiler manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingKeyNames {
    pub bidder: String,
    pub marker: String,
    pub marker_value: String,
    pub price: String,
    pub platform: String,
}

impl Default for TargetingKeyNames {
    fn default() -> Self {
        Self {
            bidder: "pwtpid".to_string(),
            marker: "pwtbst".to_string(),
            marker_value: "1".to_string(),
            price: "pwtecp".to_string(),
            platform: "pwtplt".to_string(),
        }
    }
}

/// Everything needed to compile one tree in a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetingOptions {
    pub bidder: Option<BidderSelection>,
    pub creative_type: CreativeType,
    pub price_labels: Vec<String>,
    pub custom: Vec<CustomTargeting>,
}

#[derive(Debug, Clone, Copy)]
struct ManagedKeys {
    bidder: KeyId,
    marker: KeyId,
    marker_value: ValueId,
    price: KeyId,
    platform: KeyId,
}

pub struct TargetingCompiler<'r, 'a> {
    resolver: &'r mut ValueResolver<'a>,
    names: TargetingKeyNames,
    keys: ManagedKeys,
    bidder: Option<CriteriaNode>,
    platform: Option<CriteriaNode>,
    custom: Vec<CriteriaNode>,
    price_labels: Option<Vec<String>>,
}

impl<'r, 'a> TargetingCompiler<'r, 'a> {
    /// Resolve (creating if needed) the managed keys and the marker value.
    pub fn new(resolver: &'r mut ValueResolver<'a>, names: TargetingKeyNames) -> Result<Self> {
        let bidder = resolver.get_key_id(&names.bidder, KeyType::Predefined)?;
        let marker = resolver.get_key_id(&names.marker, KeyType::Predefined)?;
        let price = resolver.get_key_id(&names.price, KeyType::Freeform)?;
        let platform = resolver.get_key_id(&names.platform, KeyType::Predefined)?;
        let marker_value =
            resolver.get_value_id(&names.marker, &names.marker_value, MatchType::Exact)?;

        Ok(Self {
            resolver,
            names,
            keys: ManagedKeys {
                bidder,
                marker,
                marker_value,
                price,
                platform,
            },
            bidder: None,
            platform: None,
            custom: Vec::new(),
            price_labels: None,
        })
    }

    /// Restrict to one or more bidders; `None` allows any bidder.
    pub fn set_bidder_value(&mut self, bidder: Option<&BidderSelection>) -> Result<()> {
        self.bidder = match bidder {
            None => None,
            Some(BidderSelection::Single(code)) => Some(self.bidder_criterion(code)?),
            Some(BidderSelection::Many(codes)) => {
                if codes.is_empty() {
                    return Err(SetupError::config(
                        "bidder code list must not be empty; omit it to allow any bidder",
                    ));
                }
                let children = codes
                    .iter()
                    .map(|code| self.bidder_criterion(code))
                    .collect::<Result<Vec<_>>>()?;
                Some(CriteriaNode::or(children))
            }
        };
        Ok(())
    }

    fn bidder_criterion(&mut self, code: &str) -> Result<CriteriaNode> {
        let value = self
            .resolver
            .get_value_id(&self.names.bidder, code, MatchType::Exact)?;
        Ok(CriteriaNode::criterion(self.keys.bidder, value, Operator::Is))
    }

    /// Target the platform of `creative_type`, or clear it for surfaces
    /// without one.
    pub fn set_platform(&mut self, creative_type: CreativeType) -> Result<()> {
        self.platform = match creative_type.platform_label() {
            Some(label) => {
                let value = self
                    .resolver
                    .get_value_id(&self.names.platform, label, MatchType::Exact)?;
                Some(CriteriaNode::criterion(self.keys.platform, value, Operator::Is))
            }
            None => None,
        };
        Ok(())
    }

    /// Replace the custom targeting criteria.
    ///
    /// A list of values under `IS` becomes an OR set; under `IS_NOT` it
    /// becomes an AND set, since "not any of A, B" is "not A and not B".
    pub fn set_custom_targeting(&mut self, entries: &[CustomTargeting]) -> Result<()> {
        let mut compiled = Vec::with_capacity(entries.len());
        for entry in entries {
            compiled.push(self.custom_criteria(entry)?);
        }
        self.custom = compiled;
        Ok(())
    }

    fn custom_criteria(&mut self, entry: &CustomTargeting) -> Result<CriteriaNode> {
        let key_id = self.resolver.get_key_id(&entry.key, KeyType::Freeform)?;
        match &entry.values {
            CustomValues::One(value) => {
                let value_id = self
                    .resolver
                    .get_value_id(&entry.key, value, MatchType::Exact)?;
                Ok(CriteriaNode::criterion(key_id, value_id, entry.operator))
            }
            CustomValues::Many(values) => {
                if values.is_empty() {
                    return Err(SetupError::config(format!(
                        "custom targeting on '{}' has an empty value list",
                        entry.key
                    )));
                }
                let mut children = Vec::with_capacity(values.len());
                for value in values {
                    let value_id = self
                        .resolver
                        .get_value_id(&entry.key, value, MatchType::Exact)?;
                    children.push(CriteriaNode::criterion(key_id, value_id, entry.operator));
                }
                let logical = match entry.operator {
                    Operator::Is => LogicalOperator::Or,
                    Operator::IsNot => LogicalOperator::And,
                };
                Ok(CriteriaNode::set(logical, children))
            }
        }
    }

    /// Set the price labels targeted by the next compiled tree.
    pub fn set_price_value(&mut self, labels: Vec<String>) {
        self.price_labels = Some(labels);
    }

    /// Partition a bucket and target its labels.
    pub fn set_price_bucket(&mut self, bucket: &PriceBucket) -> Result<()> {
        self.set_price_value(bucket.labels()?);
        Ok(())
    }

    /// Build the tree for the current price labels.
    pub fn compile(&mut self) -> Result<CriteriaNode> {
        let labels = match &self.price_labels {
            Some(labels) if !labels.is_empty() => labels.clone(),
            _ => {
                return Err(SetupError::config(
                    "no price buckets set; every line item needs a price branch",
                ))
            }
        };

        let mut price_children = Vec::with_capacity(labels.len());
        for label in &labels {
            let value = self
                .resolver
                .get_value_id(&self.names.price, label, MatchType::Prefix)?;
            price_children.push(CriteriaNode::criterion(self.keys.price, value, Operator::Is));
        }

        let mut children = vec![CriteriaNode::criterion(
            self.keys.marker,
            self.keys.marker_value,
            Operator::Is,
        )];
        children.extend(self.platform.clone());
        children.extend(self.bidder.clone());
        children.push(CriteriaNode::or(price_children));
        children.extend(self.custom.iter().cloned());

        debug!(
            children = children.len(),
            price_labels = labels.len(),
            "compiled targeting tree"
        );
        Ok(CriteriaNode::and(children))
    }
}

/// Compile one tree from `options` in a single call.
pub fn compile_options(
    resolver: &mut ValueResolver<'_>,
    names: TargetingKeyNames,
    options: &TargetingOptions,
) -> Result<CriteriaNode> {
    let mut compiler = TargetingCompiler::new(resolver, names)?;
    compiler.set_platform(options.creative_type)?;
    compiler.set_bidder_value(options.bidder.as_ref())?;
    compiler.set_custom_targeting(&options.custom)?;
    compiler.set_price_value(options.price_labels.clone());
    compiler.compile()
}
