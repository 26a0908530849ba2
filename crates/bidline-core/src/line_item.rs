//! Line item assembly.
//!
//! [`LineItemContext`] holds everything shared by the line items of one
//! order. [`LineItemContext::assemble`] merges it with one price bucket and
//! that bucket's compiled criteria tree into a [`LineItemDescriptor`], which
//! serializes to the ad server's camelCase line item shape.

use adserver_state::{AdUnitId, PlacementId, TechnologyId};
use serde::{Deserialize, Serialize};

use crate::criteria::CriteriaNode;
use crate::domain::creative::{CreativeType, LineItemType, RoadblockType};
use crate::domain::price::PriceBucket;
use crate::settings::{Size, ValidatedSettings};

/// Daily impression goal for line item kinds that need one.
pub const DAILY_GOAL_UNITS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdUnitRef {
    pub ad_unit_id: AdUnitId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTargeting {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targeted_placement_ids: Vec<PlacementId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targeted_ad_units: Vec<AdUnitRef>,
}

impl InventoryTargeting {
    pub fn placements(ids: Vec<PlacementId>) -> Self {
        Self {
            targeted_placement_ids: ids,
            targeted_ad_units: Vec::new(),
        }
    }

    /// Run-of-network: the whole tree under the root ad unit.
    pub fn run_of_network(root: AdUnitId) -> Self {
        Self {
            targeted_placement_ids: Vec::new(),
            targeted_ad_units: vec![AdUnitRef { ad_unit_id: root }],
        }
    }
}

/// Technology id as the ad server expects it in targeting (a string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechRef {
    pub id: String,
}

impl From<TechnologyId> for TechRef {
    fn from(id: TechnologyId) -> Self {
        Self {
            id: id.0.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCategoryTargeting {
    pub targeted_device_categories: Vec<TechRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilityTargeting {
    pub targeted_device_capabilities: Vec<TechRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyTargeting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_category_targeting: Option<DeviceCategoryTargeting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_capability_targeting: Option<DeviceCapabilityTargeting>,
}

impl TechnologyTargeting {
    /// `None` when there is nothing to target.
    pub fn from_ids(categories: &[TechnologyId], capabilities: &[TechnologyId]) -> Option<Self> {
        if categories.is_empty() && capabilities.is_empty() {
            return None;
        }
        let refs = |ids: &[TechnologyId]| -> Vec<TechRef> {
            ids.iter().copied().map(TechRef::from).collect()
        };
        Some(Self {
            device_category_targeting: (!categories.is_empty()).then(|| DeviceCategoryTargeting {
                targeted_device_categories: refs(categories),
            }),
            device_capability_targeting: (!capabilities.is_empty()).then(|| {
                DeviceCapabilityTargeting {
                    targeted_device_capabilities: refs(capabilities),
                }
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPlatformTargeting {
    pub target_request_platforms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Targeting {
    pub inventory_targeting: InventoryTargeting,
    pub custom_targeting: CriteriaNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_targeting: Option<TechnologyTargeting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_platform_targeting: Option<RequestPlatformTargeting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub goal_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i64>,
}

impl Goal {
    pub fn for_line_item_type(line_item_type: LineItemType) -> Self {
        match line_item_type {
            LineItemType::PricePriority => Self {
                goal_type: "NONE".to_string(),
                unit_type: None,
                units: None,
            },
            LineItemType::Network | LineItemType::House => Self {
                goal_type: "DAILY".to_string(),
                unit_type: Some("IMPRESSIONS".to_string()),
                units: Some(DAILY_GOAL_UNITS),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    pub micro_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativePlaceholder {
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_template_id: Option<i64>,
}

/// One line item in the ad server's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDescriptor {
    pub name: String,
    pub order_id: i64,
    pub targeting: Targeting,
    pub start_date_time_type: String,
    pub unlimited_end_date_time: bool,
    pub line_item_type: LineItemType,
    pub cost_type: String,
    pub cost_per_unit: Money,
    pub value_cost_per_unit: Money,
    pub roadblocking_type: RoadblockType,
    pub creative_rotation_type: String,
    pub primary_goal: Goal,
    pub creative_placeholders: Vec<CreativePlaceholder>,
    pub disable_same_advertiser_competitive_exclusion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_type: Option<String>,
}

/// `{prefix}_{rate}` with the rate at two decimals.
pub fn line_item_name(prefix: &str, rate: f64) -> String {
    format!("{}_{:.2}", prefix, rate)
}

/// Fresh line item prefix tagged with the creative surface, e.g.
/// `DISPLAY_3f2a...`.
pub fn unique_prefix(creative_type: CreativeType) -> String {
    format!(
        "{}_{}",
        creative_type.unique_id_tag(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Fields shared by every line item of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemContext {
    pub order_id: i64,
    pub prefix: String,
    pub line_item_type: LineItemType,
    pub creative_type: CreativeType,
    pub currency_code: String,
    pub roadblock_type: RoadblockType,
    pub same_adv_exception: bool,
    pub sizes: Vec<Size>,
    pub creative_templates: Vec<i64>,
    pub inventory: InventoryTargeting,
    pub technology: Option<TechnologyTargeting>,
}

impl LineItemContext {
    /// Build the context from validated settings and resolved inventory.
    ///
    /// The configured prefix is used when set; otherwise a unique one is
    /// generated.
    pub fn new(
        settings: &ValidatedSettings,
        order_id: i64,
        inventory: InventoryTargeting,
        technology: Option<TechnologyTargeting>,
    ) -> Self {
        let prefix = settings
            .line_item_prefix
            .clone()
            .unwrap_or_else(|| unique_prefix(settings.creative_type));
        Self {
            order_id,
            prefix,
            line_item_type: settings.line_item_type,
            creative_type: settings.creative_type,
            currency_code: settings.currency_code.clone(),
            roadblock_type: settings.roadblock_type,
            same_adv_exception: settings.same_adv_exception,
            sizes: settings.sizes.clone(),
            creative_templates: settings.creative_templates.clone(),
            inventory,
            technology,
        }
    }

    fn creative_placeholders(&self) -> Vec<CreativePlaceholder> {
        match self.creative_type {
            // Native creatives render from templates, so every placeholder is 1x1.
            CreativeType::Native => self
                .creative_templates
                .iter()
                .map(|&id| CreativePlaceholder {
                    size: Size::ONE_BY_ONE,
                    creative_template_id: Some(id),
                })
                .collect(),
            _ => self
                .sizes
                .iter()
                .map(|&size| CreativePlaceholder {
                    size,
                    creative_template_id: None,
                })
                .collect(),
        }
    }

    /// Merge one bucket and its criteria tree into a line item.
    pub fn assemble(
        &self,
        bucket: &PriceBucket,
        custom_targeting: CriteriaNode,
    ) -> LineItemDescriptor {
        let cost = Money {
            currency_code: self.currency_code.clone(),
            micro_amount: bucket.micro_amount(),
        };
        let video = self.creative_type.is_video();

        LineItemDescriptor {
            name: line_item_name(&self.prefix, bucket.rate),
            order_id: self.order_id,
            targeting: Targeting {
                inventory_targeting: self.inventory.clone(),
                custom_targeting,
                technology_targeting: self.technology.clone(),
                request_platform_targeting: video.then(|| RequestPlatformTargeting {
                    target_request_platforms: vec!["VIDEO_PLAYER".to_string()],
                }),
            },
            start_date_time_type: "IMMEDIATELY".to_string(),
            unlimited_end_date_time: true,
            line_item_type: self.line_item_type,
            cost_type: "CPM".to_string(),
            value_cost_per_unit: cost.clone(),
            cost_per_unit: cost,
            roadblocking_type: self.roadblock_type,
            creative_rotation_type: "EVEN".to_string(),
            primary_goal: Goal::for_line_item_type(self.line_item_type),
            creative_placeholders: self.creative_placeholders(),
            disable_same_advertiser_competitive_exclusion: self.same_adv_exception,
            environment_type: video.then(|| "VIDEO_PLAYER".to_string()),
        }
    }
}
