//! Creative surfaces and line item enums.

use serde::{Deserialize, Serialize};

/// Surface the partner's creatives render on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreativeType {
    #[default]
    Web,
    WebSafeframe,
    Amp,
    InApp,
    Native,
    Video,
    Jwplayer,
}

impl CreativeType {
    pub const ALL: [CreativeType; 7] = [
        CreativeType::Web,
        CreativeType::WebSafeframe,
        CreativeType::Amp,
        CreativeType::InApp,
        CreativeType::Native,
        CreativeType::Video,
        CreativeType::Jwplayer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CreativeType::Web => "WEB",
            CreativeType::WebSafeframe => "WEB_SAFEFRAME",
            CreativeType::Amp => "AMP",
            CreativeType::InApp => "IN_APP",
            CreativeType::Native => "NATIVE",
            CreativeType::Video => "VIDEO",
            CreativeType::Jwplayer => "JWPLAYER",
        }
    }

    /// Value targeted on the platform key. In-app line items carry no
    /// platform criterion.
    pub fn platform_label(&self) -> Option<&'static str> {
        match self {
            CreativeType::Web | CreativeType::WebSafeframe => Some("display"),
            CreativeType::Amp => Some("amp"),
            CreativeType::Native => Some("native"),
            CreativeType::Video | CreativeType::Jwplayer => Some("video"),
            CreativeType::InApp => None,
        }
    }

    /// Tag prepended to generated line item prefixes.
    pub fn unique_id_tag(&self) -> &'static str {
        match self {
            CreativeType::Web | CreativeType::WebSafeframe => "DISPLAY",
            CreativeType::Amp => "AMP",
            CreativeType::InApp => "INAPP",
            CreativeType::Native => "NATIVE",
            CreativeType::Video => "VIDEO",
            CreativeType::Jwplayer => "JWP",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, CreativeType::Video | CreativeType::Jwplayer)
    }
}

impl std::fmt::Display for CreativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemType {
    PricePriority,
    Network,
    House,
}

impl LineItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemType::PricePriority => "PRICE_PRIORITY",
            LineItemType::Network => "NETWORK",
            LineItemType::House => "HOUSE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadblockType {
    #[default]
    OneOrMore,
    AsManyAsPossible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvertiserType {
    #[default]
    Advertiser,
    AdNetwork,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_labels() {
        assert_eq!(CreativeType::Web.platform_label(), Some("display"));
        assert_eq!(CreativeType::WebSafeframe.platform_label(), Some("display"));
        assert_eq!(CreativeType::Jwplayer.platform_label(), Some("video"));
        assert_eq!(CreativeType::InApp.platform_label(), None);
    }

    #[test]
    fn test_wire_names_round_trip() {
        for ct in CreativeType::ALL {
            let json = serde_json::to_string(&ct).unwrap();
            assert_eq!(json, format!("\"{}\"", ct.as_str()));
        }
        let t: RoadblockType = serde_json::from_str("\"AS_MANY_AS_POSSIBLE\"").unwrap();
        assert_eq!(t, RoadblockType::AsManyAsPossible);
    }
}
