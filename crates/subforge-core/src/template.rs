//! Conversion templates.
//!
//! A template is a JSON array `[baseConfig, metadata]`. `baseConfig` is a
//! routing-engine configuration holding group shapes (no nodes yet) and
//! route rules; `metadata` says which group each shape belongs to and how
//! nodes are filtered into groups.
//!
//! Everything the synthesizer does not touch is kept in `extra` maps and
//! emitted unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::coerce_port;
use crate::error::{Result, TemplateError};
use crate::outbound::Endpoint;

/// Outbound types that hold member tags instead of a server.
pub const GROUP_TYPES: [&str; 4] = ["selector", "urltest", "fallback", "balancer"];

/// A parsed `[baseConfig, metadata]` template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub base: BaseConfig,
    pub metadata: Metadata,
}

impl Template {
    /// Parses template JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Builds a template from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(parts) = value else {
            return Err(TemplateError::NotAPair);
        };
        let Ok([base, metadata]) = <[Value; 2]>::try_from(parts) else {
            return Err(TemplateError::NotAPair);
        };

        Ok(Self {
            base: serde_json::from_value(base).map_err(TemplateError::BaseConfig)?,
            metadata: serde_json::from_value(metadata).map_err(TemplateError::Metadata)?,
        })
    }

    /// Renders the template back to its `[baseConfig, metadata]` form.
    pub fn to_value(&self) -> Result<Value> {
        Ok(Value::Array(vec![
            serde_json::to_value(&self.base)?,
            serde_json::to_value(&self.metadata)?,
        ]))
    }
}

/// The base configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    /// `log`, `dns`, `inbounds`, `experimental` and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub outbounds: Vec<OutboundShape>,
    #[serde(default)]
    pub endpoints: Vec<Value>,
    #[serde(default)]
    pub route: RouteConfig,
}

/// An outbound as written in the template: a group shape or a custom node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundShape {
    pub tag: String,
    #[serde(rename = "type", default = "default_group_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbounds: Option<Vec<String>>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

fn default_group_type() -> String {
    "selector".to_string()
}

impl OutboundShape {
    /// An empty group of the given type.
    pub fn group(tag: impl Into<String>, kind: &str) -> Self {
        Self {
            tag: tag.into(),
            kind: kind.to_string(),
            outbounds: Some(Vec::new()),
            settings: Map::new(),
        }
    }

    /// A copy of this shape under another tag with no members.
    pub fn instantiate(&self, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            outbounds: Some(Vec::new()),
            ..self.clone()
        }
    }

    pub fn is_group(&self) -> bool {
        GROUP_TYPES.contains(&self.kind.as_str())
    }

    pub fn members(&self) -> &[String] {
        self.outbounds.as_deref().unwrap_or_default()
    }

    /// Moves a WireGuard shape's server into a separate [`Endpoint`].
    pub fn promote_endpoint(&mut self) -> Option<Endpoint> {
        if self.kind != "wireguard" {
            return None;
        }
        let address = match self.settings.get("server") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return None,
        };
        self.settings.remove("server");
        let port = self
            .settings
            .remove("server_port")
            .as_ref()
            .and_then(coerce_port);

        let tag = format!("ep-{}", self.tag);
        self.settings
            .insert("endpoint".to_string(), Value::String(tag.clone()));
        Some(Endpoint::wireguard(tag, address, port))
    }
}

/// The `route` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One route rule; only the fields the ruleset sync reads are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<RuleSetRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clash_mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteRule {
    /// A rule sending one rule set to one outbound.
    pub fn for_rule_set(rule_set: &str, outbound: &str) -> Self {
        Self {
            rule_set: Some(RuleSetRef::One(rule_set.to_string())),
            outbound: Some(outbound.to_string()),
            clash_mode: None,
            extra: Map::new(),
        }
    }

    pub fn references(&self, rule_set: &str) -> bool {
        self.rule_set
            .as_ref()
            .is_some_and(|r| r.contains(rule_set))
    }
}

/// A rule's `rule_set`: one id or a list of ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSetRef {
    One(String),
    Many(Vec<String>),
}

impl RuleSetRef {
    pub fn contains(&self, id: &str) -> bool {
        match self {
            RuleSetRef::One(one) => one == id,
            RuleSetRef::Many(many) => many.iter().any(|m| m == id),
        }
    }
}

/// How a group in `outboundGroupMap` is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCategory {
    /// `地区分类`: filled by country filters, pruned when empty.
    Region,
    /// `应用规则`: aggregates every lower level.
    RuleLevel,
    /// `基本分组`: the fixed select/auto/direct groups.
    Basic,
    Custom,
}

impl GroupCategory {
    pub fn parse(category: &str) -> Self {
        match category {
            "地区分类" => GroupCategory::Region,
            "应用规则" => GroupCategory::RuleLevel,
            "基本分组" => GroupCategory::Basic,
            _ => GroupCategory::Custom,
        }
    }
}

/// Template metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Group tag to category, in template order.
    #[serde(rename = "outboundGroupMap")]
    pub outbound_group_map: Map<String, Value>,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Rule-set id to target outbound (a tag or a list whose head is used).
    #[serde(default)]
    pub ruleset_outbound_map: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Group tags with their category, in template order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, GroupCategory)> {
        self.outbound_group_map.iter().map(|(tag, category)| {
            let category = category
                .as_str()
                .map(GroupCategory::parse)
                .unwrap_or(GroupCategory::Custom);
            (tag.as_str(), category)
        })
    }

    /// Tags of one category, in template order.
    pub fn tags_of(&self, category: GroupCategory) -> Vec<String> {
        self.groups()
            .filter(|(_, c)| *c == category)
            .map(|(tag, _)| tag.to_string())
            .collect()
    }

    pub fn is_mapped(&self, tag: &str) -> bool {
        self.outbound_group_map.contains_key(tag)
    }

    /// Rule-set ids with their target outbound; empty targets are skipped.
    pub fn ruleset_targets(&self) -> Vec<(&str, &str)> {
        self.ruleset_outbound_map
            .iter()
            .filter_map(|(id, target)| {
                let target = match target {
                    Value::String(s) => s.as_str(),
                    Value::Array(items) => items.first()?.as_str()?,
                    _ => return None,
                };
                (!target.is_empty()).then_some((id.as_str(), target))
            })
            .collect()
    }
}

/// `metadata.filter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub excluded_outbounds: Vec<String>,
    #[serde(default)]
    pub country_filter: Vec<CountryFilter>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sends nodes whose tag matches `regex` to the `outbound` region group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryFilter {
    pub regex: String,
    pub outbound: String,
}
