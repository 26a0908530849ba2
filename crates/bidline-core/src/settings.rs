//! Run settings.
//!
//! Settings are read from a TOML file and checked once by
//! [`Settings::validate`], which also applies the fixed overrides of the
//! in-app and JW Player surfaces. Everything downstream works on
//! [`ValidatedSettings`].
//!
//! ```toml
//! order_name = "Prebid Display"
//! user_email = "ops@example.com"
//! advertiser_name = "PubMatic"
//! line_item_type = "PRICE_PRIORITY"
//! placements = ["top_leaderboard"]
//! sizes = [{ width = 728, height = 90 }]
//! bidder_code = ["pubmatic", "appnexus"]
//! bucket_csv = "buckets.csv"
//! custom_targeting = [{ key = "region", operator = "IS_NOT", values = ["EU", "US"] }]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::criteria::{BidderSelection, CustomTargeting, CustomValues, TargetingKeyNames};
use crate::domain::creative::{AdvertiserType, CreativeType, LineItemType, RoadblockType};
use crate::domain::error::{Result, SetupError};

/// Device capabilities targeted by every in-app line item.
pub const IN_APP_DEVICE_CAPABILITIES: [&str; 3] = ["Mobile Apps", "MRAID v1", "MRAID v2"];

/// The only bidder JW Player line items serve.
pub const JWPLAYER_BIDDER: &str = "pubmatic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ONE_BY_ONE: Size = Size {
        width: 1,
        height: 1,
    };
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Custom targeting as written in the settings file; the operator is
/// checked during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCustomTargeting {
    pub key: String,
    pub operator: String,
    pub values: CustomValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum StringList {
    One(String),
    Many(Vec<String>),
}

impl From<StringList> for Vec<String> {
    fn from(list: StringList) -> Self {
        match list {
            StringList::One(s) => vec![s],
            StringList::Many(v) => v,
        }
    }
}

/// Settings as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub order_name: Option<String>,
    pub user_email: Option<String>,
    pub advertiser_name: Option<String>,
    #[serde(default)]
    pub advertiser_type: AdvertiserType,
    pub line_item_type: Option<LineItemType>,
    #[serde(default)]
    pub placements: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<Size>,
    pub num_creatives: Option<u32>,
    pub currency_code: Option<String>,
    #[serde(default)]
    pub same_adv_exception: bool,
    device_categories: Option<StringList>,
    pub roadblock_type: Option<RoadblockType>,
    pub line_item_prefix: Option<String>,
    pub bidder_code: Option<BidderSelection>,
    pub bucket_csv: Option<PathBuf>,
    #[serde(default)]
    pub custom_targeting: Vec<RawCustomTargeting>,
    #[serde(default)]
    pub creative_type: CreativeType,
    #[serde(default)]
    pub creative_templates: Vec<i64>,
    pub exchange_rate: Option<f64>,
    #[serde(default)]
    pub targeting_keys: TargetingKeyNames,
}

/// Settings that passed validation, with defaults and overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedSettings {
    pub order_name: String,
    pub user_email: String,
    pub advertiser_name: String,
    pub advertiser_type: AdvertiserType,
    pub line_item_type: LineItemType,
    pub placements: Vec<String>,
    pub sizes: Vec<Size>,
    pub num_creatives: u32,
    pub currency_code: String,
    pub same_adv_exception: bool,
    pub device_categories: Option<Vec<String>>,
    pub device_capabilities: Option<Vec<String>>,
    pub roadblock_type: RoadblockType,
    pub line_item_prefix: Option<String>,
    pub bidder: Option<BidderSelection>,
    pub bucket_csv: PathBuf,
    pub custom_targeting: Vec<CustomTargeting>,
    pub creative_type: CreativeType,
    pub creative_templates: Vec<i64>,
    pub exchange_rate: f64,
    pub targeting_keys: TargetingKeyNames,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(SetupError::config(format!("setting '{name}' must not be empty"))),
        None => Err(SetupError::config(format!("missing setting '{name}'"))),
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Use `path` as the price bucket CSV instead of the configured one.
    pub fn with_bucket_csv(mut self, path: PathBuf) -> Self {
        self.bucket_csv = Some(path);
        self
    }

    pub fn validate(self) -> Result<ValidatedSettings> {
        let user_email = required(self.user_email, "user_email")?;
        let advertiser_name = required(self.advertiser_name, "advertiser_name")?;
        let order_name = required(self.order_name, "order_name")?;
        let line_item_type = self
            .line_item_type
            .ok_or_else(|| SetupError::config("missing setting 'line_item_type'"))?;

        if self.sizes.is_empty() {
            return Err(SetupError::config(
                "setting 'sizes' must contain at least one size",
            ));
        }
        if let Some(size) = self.sizes.iter().find(|s| s.width == 0 || s.height == 0) {
            return Err(SetupError::config(format!("invalid size {size}")));
        }

        // Run-of-network counts as one placement.
        let num_creatives = match self.num_creatives {
            Some(0) => {
                return Err(SetupError::config("setting 'num_creatives' must be at least 1"))
            }
            Some(n) => n,
            None => self.placements.len().max(1) as u32,
        };

        let currency_code = self.currency_code.unwrap_or_else(|| "USD".to_string());
        if currency_code.len() != 3 || !currency_code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(SetupError::config(format!(
                "currency code '{currency_code}' must be three uppercase letters"
            )));
        }

        if let Some(prefix) = &self.line_item_prefix {
            if prefix.trim().is_empty() {
                return Err(SetupError::config("setting 'line_item_prefix' must not be empty"));
            }
        }

        match &self.bidder_code {
            Some(BidderSelection::Many(codes)) if codes.is_empty() => {
                return Err(SetupError::config(
                    "setting 'bidder_code' must not be an empty list",
                ))
            }
            Some(sel) if sel.codes().iter().any(|c| c.trim().is_empty()) => {
                return Err(SetupError::config("setting 'bidder_code' has an empty code"))
            }
            _ => {}
        }

        let mut custom_targeting = Vec::with_capacity(self.custom_targeting.len());
        for raw in self.custom_targeting {
            if raw.key.trim().is_empty() {
                return Err(SetupError::config("custom targeting key must not be empty"));
            }
            if matches!(&raw.values, CustomValues::Many(v) if v.is_empty()) {
                return Err(SetupError::config(format!(
                    "custom targeting on '{}' has an empty value list",
                    raw.key
                )));
            }
            custom_targeting.push(CustomTargeting {
                operator: raw.operator.parse()?,
                key: raw.key,
                values: raw.values,
            });
        }

        let bucket_csv = self
            .bucket_csv
            .ok_or_else(|| SetupError::config("missing setting 'bucket_csv'"))?;

        if self.creative_type == CreativeType::Native && self.creative_templates.is_empty() {
            return Err(SetupError::config(
                "NATIVE line items need at least one entry in 'creative_templates'",
            ));
        }

        let exchange_rate = match self.creative_type {
            // These surfaces are always priced in the configured currency.
            CreativeType::Amp | CreativeType::InApp => 1.0,
            _ => self.exchange_rate.unwrap_or(1.0),
        };
        if !(exchange_rate.is_finite() && exchange_rate > 0.0) {
            return Err(SetupError::config(format!(
                "exchange rate {exchange_rate} must be a positive number"
            )));
        }

        let mut validated = ValidatedSettings {
            order_name,
            user_email,
            advertiser_name,
            advertiser_type: self.advertiser_type,
            line_item_type,
            placements: self.placements,
            sizes: self.sizes,
            num_creatives,
            currency_code,
            same_adv_exception: self.same_adv_exception,
            device_categories: self.device_categories.map(Vec::from),
            device_capabilities: None,
            roadblock_type: self.roadblock_type.unwrap_or_default(),
            line_item_prefix: self.line_item_prefix,
            bidder: self.bidder_code,
            bucket_csv,
            custom_targeting,
            creative_type: self.creative_type,
            creative_templates: self.creative_templates,
            exchange_rate,
            targeting_keys: self.targeting_keys,
        };
        validated.apply_creative_overrides();
        Ok(validated)
    }
}

impl ValidatedSettings {
    fn apply_creative_overrides(&mut self) {
        match self.creative_type {
            CreativeType::InApp => {
                self.roadblock_type = RoadblockType::AsManyAsPossible;
                self.bidder = None;
                self.custom_targeting.clear();
                self.device_categories = None;
                self.device_capabilities = Some(
                    IN_APP_DEVICE_CAPABILITIES
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                );
                debug!("applied in-app overrides");
            }
            CreativeType::Jwplayer => {
                self.bidder = Some(BidderSelection::Many(vec![JWPLAYER_BIDDER.to_string()]));
                self.custom_targeting.clear();
                self.device_categories = None;
                debug!("applied JW Player overrides");
            }
            _ => {}
        }
    }

    /// Bidder summary, `All` when any bidder may serve.
    pub fn bidder_display(&self) -> String {
        self.bidder
            .as_ref()
            .map(BidderSelection::display_name)
            .unwrap_or_else(|| "All".to_string())
    }
}
