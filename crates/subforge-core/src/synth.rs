//! Group synthesis.
//!
//! [`synthesize`] merges per-source node batches into a template and builds
//! the four-level group hierarchy:
//!
//! | Level | Groups | Members |
//! |---|---|---|
//! | 1 | region groups | nodes picked by country filters |
//! | 2 | auto-select, manual-select, direct | region groups / every node |
//! | 3 | default proxy | levels 1-2 |
//! | 4 | rule-level groups and the fixed fallbacks | levels 1-3 |
//!
//! With more than one source, node tags get a `-N` suffix. With `split` on
//! as well, levels 1-2 are duplicated per source under the same suffix.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::filter::{self, is_regional_indicator, TagFilter};
use crate::outbound::{Endpoint, Outbound};
use crate::template::{
    BaseConfig, GroupCategory, Metadata, OutboundShape, RouteConfig, RouteRule, Template,
};

pub const AUTO_SELECT: &str = "♻️ 自动选择";
pub const MANUAL_SELECT: &str = "🐸 手动选择";
pub const GLOBAL_DIRECT: &str = "🎯 全球直连";
pub const DEFAULT_PROXY: &str = "🚀 默认代理";
pub const LATENCY_ASSIST: &str = "🍃 延迟辅助";
pub const FALLTHROUGH: &str = "🐠 漏网之鱼";
pub const GLOBAL_PROXY: &str = "🌍 全局代理";

/// Built-in outbounds that are never treated as custom nodes.
pub const SYSTEM_TAGS: [&str; 4] = ["direct", "block", "dns-out", "bypass"];

/// Where new rule-set rules go when no anchor rule exists.
const RULESET_FALLBACK_INDEX: usize = 6;

/// The `-N` suffix for source `index` (1-based), or nothing when disabled.
pub fn source_suffix(index: usize, enabled: bool) -> String {
    if enabled {
        format!("-{index}")
    } else {
        String::new()
    }
}

/// Trims a tag and separates a leading flag emoji from the name.
///
/// `🇯🇵Tokyo` becomes `🇯🇵 Tokyo`.
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim();
    let mut chars = tag.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), Some(c))
            if is_regional_indicator(a) && is_regional_indicator(b) && !c.is_whitespace() =>
        {
            let split = a.len_utf8() + b.len_utf8();
            format!("{} {}", &tag[..split], &tag[split..])
        }
        _ => tag.to_string(),
    }
}

/// The final configuration document.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub outbounds: Vec<ConfigOutbound>,
    pub endpoints: Vec<ConfigEndpoint>,
    pub route: RouteConfig,
}

impl Configuration {
    /// Looks up an outbound by tag.
    pub fn outbound(&self, tag: &str) -> Option<&ConfigOutbound> {
        self.outbounds.iter().find(|o| o.tag() == tag)
    }

    /// Member tags of a group, `None` when there is no such group.
    pub fn members(&self, tag: &str) -> Option<&[String]> {
        match self.outbound(tag)? {
            ConfigOutbound::Shape(shape) => Some(shape.members()),
            ConfigOutbound::Node(_) => None,
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.outbounds.iter().map(ConfigOutbound::tag)
    }
}

/// An entry of the final `outbounds` list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConfigOutbound {
    /// A group or custom outbound taken from the template.
    Shape(OutboundShape),
    /// A converted subscription node.
    Node(Outbound),
}

impl ConfigOutbound {
    pub fn tag(&self) -> &str {
        match self {
            ConfigOutbound::Shape(shape) => &shape.tag,
            ConfigOutbound::Node(node) => &node.tag,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ConfigOutbound::Shape(shape) => &shape.kind,
            ConfigOutbound::Node(node) => node.kind(),
        }
    }
}

/// An entry of the final `endpoints` list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConfigEndpoint {
    Template(Value),
    Promoted(Endpoint),
}

/// Builds the final configuration.
///
/// Takes the template by value: callers sharing one template clone it first.
pub fn synthesize(template: Template, batches: Vec<Vec<Outbound>>, split: bool) -> Configuration {
    let Template { base, metadata } = template;
    let BaseConfig {
        extra,
        outbounds: shapes,
        endpoints,
        mut route,
    } = base;

    sync_rulesets(&mut route.rules, &metadata);

    let sources = batches.len();
    let split_groups = split && sources > 1;
    let regions = metadata.tags_of(GroupCategory::Region);

    let mut builder = Builder {
        outbounds: Vec::new(),
        endpoints: endpoints.into_iter().map(ConfigEndpoint::Template).collect(),
    };
    let shape = |tag: &str| shapes.iter().find(|s| s.tag == tag);

    // Levels 1 and 2.
    let mut level1 = Vec::new();
    let mut level2 = Vec::new();
    if split_groups {
        for index in 1..=sources {
            let suffix = source_suffix(index, true);
            for region in &regions {
                let tag = format!("{region}{suffix}");
                builder.push_shape(instantiate(shape(region), &tag, "urltest"));
                level1.push(tag);
            }
            for basic in [AUTO_SELECT, MANUAL_SELECT] {
                let tag = format!("{basic}{suffix}");
                builder.push_shape(instantiate(shape(basic), &tag, "selector"));
                level2.push(tag);
            }
        }
        level2.push(GLOBAL_DIRECT.to_string());
        if let Some(direct) = shape(GLOBAL_DIRECT) {
            builder.push_shape(direct.clone());
        }
    } else {
        level1.clone_from(&regions);
        level2.extend([AUTO_SELECT, MANUAL_SELECT, GLOBAL_DIRECT].map(String::from));
        for tag in level1.iter().chain(&level2) {
            if let Some(existing) = shape(tag) {
                builder.push_shape(existing.clone());
            }
        }
    }

    // Levels 3 and 4 are never duplicated and always exist.
    let level3 = vec![DEFAULT_PROXY.to_string()];
    let mut level4 = metadata.tags_of(GroupCategory::RuleLevel);
    for fixed in [LATENCY_ASSIST, FALLTHROUGH, GLOBAL_PROXY] {
        if !level4.iter().any(|t| t == fixed) {
            level4.push(fixed.to_string());
        }
    }
    for tag in level3.iter().chain(&level4) {
        if builder.contains(tag) {
            continue;
        }
        let group = match shape(tag) {
            Some(existing) => existing.clone(),
            None => OutboundShape::group(tag.as_str(), "selector"),
        };
        builder.push_shape(group);
    }

    // Custom outbounds and built-ins from the template.
    let reserved: HashSet<&str> = level1
        .iter()
        .chain(&level2)
        .chain(&level3)
        .chain(&level4)
        .map(String::as_str)
        .chain(regions.iter().map(String::as_str))
        .chain([AUTO_SELECT, MANUAL_SELECT])
        .collect();
    let mut custom_node_tags = Vec::new();
    let mut system = Vec::new();
    for template_shape in &shapes {
        if metadata.is_mapped(&template_shape.tag) || reserved.contains(template_shape.tag.as_str())
        {
            continue;
        }
        if SYSTEM_TAGS.contains(&template_shape.tag.as_str()) {
            system.push(template_shape.clone());
            continue;
        }
        if builder.contains(&template_shape.tag) {
            warn!(tag = %template_shape.tag, "duplicate custom outbound in template, skipping");
            continue;
        }
        let mut custom = template_shape.clone();
        if let Some(endpoint) = custom.promote_endpoint() {
            builder.endpoints.push(ConfigEndpoint::Promoted(endpoint));
        }
        if !custom.is_group() {
            custom_node_tags.push(custom.tag.clone());
        }
        builder.push_shape(custom);
    }
    for built_in in system {
        builder.push_shape(built_in);
    }

    // Node placement.
    let excluded = filter::compile_all(metadata.filter.excluded_outbounds.iter().map(String::as_str));
    let country_filters: Vec<(TagFilter, &str)> = metadata
        .filter
        .country_filter
        .iter()
        .filter_map(|cf| match TagFilter::compile(&cf.regex) {
            Ok(compiled) => Some((compiled, cf.outbound.as_str())),
            Err(e) => {
                warn!(error = %e, "ignoring country filter");
                None
            }
        })
        .collect();

    let mut taken: HashSet<String> = builder.tags().map(str::to_string).collect();
    let multi_source = sources > 1;
    for (position, batch) in batches.into_iter().enumerate() {
        let index = position + 1;
        let node_suffix = source_suffix(index, multi_source);
        let group_suffix = source_suffix(index, split_groups);
        let manual = format!("{MANUAL_SELECT}{group_suffix}");

        for tag in &custom_node_tags {
            builder.add_member(&manual, tag);
            builder.add_member(GLOBAL_PROXY, tag);
        }

        for mut node in batch {
            let original = normalize_tag(&node.tag);
            if excluded.iter().any(|f| f.is_match(&original)) {
                debug!(tag = %original, "node excluded by filter");
                continue;
            }

            let final_tag = format!("{original}{node_suffix}");
            if !taken.insert(final_tag.clone()) {
                warn!(tag = %final_tag, "duplicate outbound tag, keeping the first");
                continue;
            }
            node.tag = final_tag.clone();
            if let Some(endpoint) = node.promote_endpoint() {
                builder.endpoints.push(ConfigEndpoint::Promoted(endpoint));
            }
            builder.outbounds.push(ConfigOutbound::Node(node));

            builder.add_member(&manual, &final_tag);
            builder.add_member(GLOBAL_PROXY, &final_tag);

            if let Some((_, region)) = country_filters.iter().find(|(f, _)| f.is_match(&original)) {
                builder.add_member(&format!("{region}{group_suffix}"), &final_tag);
            }
        }
    }

    // Prune empty region groups.
    let live: HashSet<String> = level1
        .iter()
        .filter(|tag| builder.members(tag).is_some_and(|m| !m.is_empty()))
        .cloned()
        .collect();
    builder.outbounds.retain(|o| match o {
        ConfigOutbound::Shape(s) => !level1.contains(&s.tag) || live.contains(&s.tag),
        ConfigOutbound::Node(_) => true,
    });
    level1.retain(|tag| live.contains(tag));

    // Region groups feed the auto-select group of their source.
    if split_groups {
        for index in 1..=sources {
            let suffix = source_suffix(index, true);
            let auto = format!("{AUTO_SELECT}{suffix}");
            for region in &regions {
                let tag = format!("{region}{suffix}");
                if live.contains(&tag) {
                    builder.add_member(&auto, &tag);
                }
            }
        }
    } else {
        for region in regions.iter().filter(|r| live.contains(*r)) {
            builder.add_member(AUTO_SELECT, region);
        }
    }

    // Levels 3 and 4 aggregate everything below them.
    let lower: Vec<String> = level1
        .iter()
        .chain(&level2)
        .filter(|tag| builder.contains(tag))
        .cloned()
        .collect();
    for group in &level3 {
        for member in &lower {
            builder.add_member(group, member);
        }
    }
    let lower: Vec<String> = lower
        .into_iter()
        .chain(level3.iter().filter(|tag| builder.contains(tag)).cloned())
        .collect();
    for group in &level4 {
        for member in &lower {
            builder.add_member(group, member);
        }
    }

    if let Some(position) = builder.position(DEFAULT_PROXY) {
        let default_proxy = builder.outbounds.remove(position);
        builder.outbounds.insert(0, default_proxy);
    }

    debug!(
        outbounds = builder.outbounds.len(),
        endpoints = builder.endpoints.len(),
        "configuration synthesized"
    );

    Configuration {
        extra,
        outbounds: builder.outbounds,
        endpoints: builder.endpoints,
        route,
    }
}

/// Writes `ruleset_outbound_map` into the route rules.
fn sync_rulesets(rules: &mut Vec<RouteRule>, metadata: &Metadata) {
    let mut insert_at = rules
        .iter()
        .rposition(|r| r.clash_mode.as_deref() == Some("global"))
        .or_else(|| rules.iter().rposition(|r| r.rule_set.is_some()))
        .map(|i| i + 1)
        .unwrap_or_else(|| RULESET_FALLBACK_INDEX.min(rules.len()));

    for (rule_set, target) in metadata.ruleset_targets() {
        match rules.iter_mut().find(|r| r.references(rule_set)) {
            Some(rule) => rule.outbound = Some(target.to_string()),
            None => {
                rules.insert(insert_at, RouteRule::for_rule_set(rule_set, target));
                insert_at += 1;
            }
        }
    }
}

/// A per-source copy of a template group, or a bare group of `kind`.
fn instantiate(shape: Option<&OutboundShape>, tag: &str, kind: &str) -> OutboundShape {
    match shape {
        Some(shape) => shape.instantiate(tag),
        None => OutboundShape::group(tag, kind),
    }
}

struct Builder {
    outbounds: Vec<ConfigOutbound>,
    endpoints: Vec<ConfigEndpoint>,
}

impl Builder {
    fn push_shape(&mut self, shape: OutboundShape) {
        self.outbounds.push(ConfigOutbound::Shape(shape));
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.outbounds.iter().position(|o| o.tag() == tag)
    }

    fn contains(&self, tag: &str) -> bool {
        self.position(tag).is_some()
    }

    fn tags(&self) -> impl Iterator<Item = &str> {
        self.outbounds.iter().map(ConfigOutbound::tag)
    }

    fn members(&self, tag: &str) -> Option<&[String]> {
        self.outbounds.iter().find_map(|o| match o {
            ConfigOutbound::Shape(s) if s.tag == tag => Some(s.members()),
            _ => None,
        })
    }

    /// Appends `member` to group `group` once; missing groups are ignored.
    fn add_member(&mut self, group: &str, member: &str) {
        if group == member {
            return;
        }
        let target = self.outbounds.iter_mut().find_map(|o| match o {
            ConfigOutbound::Shape(s) if s.tag == group && s.is_group() => Some(s),
            _ => None,
        });
        if let Some(shape) = target {
            let members = shape.outbounds.get_or_insert_with(Vec::new);
            if !members.iter().any(|m| m == member) {
                members.push(member.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::OutboundSettings;
    use serde_json::json;

    fn template() -> Template {
        Template::from_value(json!([
            {
                "log": {"level": "warn"},
                "inbounds": [{"type": "tun", "tag": "tun-in"}],
                "outbounds": [
                    {"tag": "🚀 默认代理", "type": "selector", "outbounds": []},
                    {"tag": "🐸 手动选择", "type": "selector", "outbounds": []},
                    {"tag": "♻️ 自动选择", "type": "urltest", "outbounds": [], "interval": "3m"},
                    {"tag": "🎯 全球直连", "type": "selector", "outbounds": ["direct"]},
                    {"tag": "🇭🇰 香港节点", "type": "urltest", "outbounds": []},
                    {"tag": "🇺🇸 美国节点", "type": "urltest", "outbounds": []},
                    {"tag": "🇯🇵 日本节点", "type": "urltest", "outbounds": []},
                    {"tag": "🤖 AI", "type": "selector", "outbounds": []},
                    {"tag": "🌍 全局代理", "type": "selector", "outbounds": []},
                    {"tag": "🏠 Home", "type": "socks", "server": "192.168.1.2", "server_port": 1080},
                    {"tag": "direct", "type": "direct"}
                ],
                "route": {
                    "rules": [
                        {"action": "sniff"},
                        {"protocol": "dns", "action": "hijack-dns"},
                        {"clash_mode": "direct", "outbound": "🎯 全球直连"},
                        {"clash_mode": "global", "outbound": "🌍 全局代理"},
                        {"rule_set": "geosite-openai", "outbound": "🚀 默认代理"}
                    ],
                    "final": "🐠 漏网之鱼"
                }
            },
            {
                "outboundGroupMap": {
                    "🚀 默认代理": "基本分组",
                    "🐸 手动选择": "基本分组",
                    "♻️ 自动选择": "基本分组",
                    "🎯 全球直连": "基本分组",
                    "🇭🇰 香港节点": "地区分类",
                    "🇺🇸 美国节点": "地区分类",
                    "🇯🇵 日本节点": "地区分类",
                    "🤖 AI": "应用规则",
                    "🌍 全局代理": "应用规则"
                },
                "filter": {
                    "excluded_outbounds": ["(?i)expire|剩余流量"],
                    "country_filter": [
                        {"regex": "(?i)香港|HK", "outbound": "🇭🇰 香港节点"},
                        {"regex": "(?i)美国|US", "outbound": "🇺🇸 美国节点"},
                        {"regex": "(?i)日本|JP", "outbound": "🇯🇵 日本节点"}
                    ]
                },
                "ruleset_outbound_map": {
                    "geosite-openai": "🤖 AI",
                    "geosite-netflix": ["🎬 流媒体"]
                }
            }
        ]))
        .unwrap()
    }

    fn socks(tag: &str) -> Outbound {
        Outbound::new(
            tag,
            "203.0.113.10",
            1080,
            OutboundSettings::Socks {
                version: "5".to_string(),
                username: None,
                password: None,
            },
        )
    }

    fn wireguard(tag: &str) -> Outbound {
        Outbound::new(
            tag,
            "198.51.100.7",
            51820,
            OutboundSettings::Wireguard {
                endpoint: None,
                private_key: "k".to_string(),
                peer_public_key: None,
                pre_shared_key: None,
                mtu: None,
                local_address: vec!["10.0.0.2/32".to_string()],
                reserved: None,
            },
        )
    }

    fn members(config: &Configuration, tag: &str) -> Vec<String> {
        config.members(tag).unwrap_or_default().to_vec()
    }

    fn all_members(config: &Configuration) -> Vec<String> {
        config
            .outbounds
            .iter()
            .filter_map(|o| match o {
                ConfigOutbound::Shape(s) => Some(s.members().to_vec()),
                ConfigOutbound::Node(_) => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_source_suffix() {
        assert_eq!(source_suffix(1, true), "-1");
        assert_eq!(source_suffix(12, true), "-12");
        assert_eq!(source_suffix(3, false), "");
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("🇯🇵Tokyo"), "🇯🇵 Tokyo");
        assert_eq!(normalize_tag(" 🇯🇵 Tokyo "), "🇯🇵 Tokyo");
        assert_eq!(normalize_tag("Tokyo"), "Tokyo");
        assert_eq!(normalize_tag("🇯🇵"), "🇯🇵");
    }

    #[test]
    fn test_single_source_places_nodes_and_groups() {
        let batch = vec![socks("🇭🇰 HK 01"), socks("🇺🇸Los Angeles"), socks("Other")];
        let config = synthesize(template(), vec![batch], false);

        assert_eq!(config.outbounds[0].tag(), DEFAULT_PROXY);
        assert!(config.outbound("🇺🇸 Los Angeles").is_some());
        assert_eq!(
            members(&config, MANUAL_SELECT),
            vec!["🏠 Home", "🇭🇰 HK 01", "🇺🇸 Los Angeles", "Other"]
        );
        assert_eq!(members(&config, "🇭🇰 香港节点"), vec!["🇭🇰 HK 01"]);
        assert_eq!(members(&config, "🇺🇸 美国节点"), vec!["🇺🇸 Los Angeles"]);
        assert_eq!(
            members(&config, AUTO_SELECT),
            vec!["🇭🇰 香港节点", "🇺🇸 美国节点"]
        );
        assert_eq!(members(&config, GLOBAL_DIRECT), vec!["direct"]);
        assert!(config.outbound("direct").is_some());
        assert_eq!(config.extra["log"], json!({"level": "warn"}));
    }

    #[test]
    fn test_empty_region_is_pruned_everywhere() {
        let config = synthesize(template(), vec![vec![socks("HK 01")]], false);

        assert!(config.outbound("🇯🇵 日本节点").is_none());
        assert!(!all_members(&config).iter().any(|m| m == "🇯🇵 日本节点"));
        assert!(members(&config, DEFAULT_PROXY).contains(&"🇭🇰 香港节点".to_string()));
    }

    #[test]
    fn test_level_aggregation() {
        let config = synthesize(template(), vec![vec![socks("HK 01")]], false);

        assert_eq!(
            members(&config, DEFAULT_PROXY),
            vec!["🇭🇰 香港节点", AUTO_SELECT, MANUAL_SELECT, GLOBAL_DIRECT]
        );
        let ai = members(&config, "🤖 AI");
        assert_eq!(
            ai,
            vec!["🇭🇰 香港节点", AUTO_SELECT, MANUAL_SELECT, GLOBAL_DIRECT, DEFAULT_PROXY]
        );
        // Missing fixed groups are synthesized as selectors.
        let fallthrough = config.outbound(FALLTHROUGH).unwrap();
        assert_eq!(fallthrough.kind(), "selector");
        assert!(members(&config, LATENCY_ASSIST).contains(&DEFAULT_PROXY.to_string()));
        // The global group holds nodes and every lower level.
        let global = members(&config, GLOBAL_PROXY);
        assert!(global.contains(&"HK 01".to_string()));
        assert!(global.contains(&DEFAULT_PROXY.to_string()));
    }

    #[test]
    fn test_multi_source_without_split() {
        let config = synthesize(
            template(),
            vec![vec![socks("HK 01")], vec![socks("HK 01"), socks("JP 02")]],
            false,
        );

        assert!(config.outbound("HK 01-1").is_some());
        assert!(config.outbound("HK 01-2").is_some());
        assert!(config.outbound("JP 02-2").is_some());
        assert!(config.outbound("🐸 手动选择-1").is_none());
        assert!(config.outbound("🇭🇰 香港节点-1").is_none());
        assert_eq!(members(&config, "🇭🇰 香港节点"), vec!["HK 01-1", "HK 01-2"]);
        let groups = config.outbounds.iter().filter_map(|o| match o {
            ConfigOutbound::Shape(s) if s.is_group() => Some(s.tag.as_str()),
            _ => None,
        });
        for tag in groups {
            assert!(!tag.ends_with("-1") && !tag.ends_with("-2"), "{tag}");
        }
    }

    #[test]
    fn test_split_duplicates_groups_per_source() {
        let config = synthesize(
            template(),
            vec![vec![socks("HK 01"), socks("JP 01")], vec![socks("HK 02")]],
            true,
        );

        assert_eq!(members(&config, "🐸 手动选择-1"), vec!["🏠 Home", "HK 01-1", "JP 01-1"]);
        assert_eq!(members(&config, "🐸 手动选择-2"), vec!["🏠 Home", "HK 02-2"]);
        assert_eq!(members(&config, "🇭🇰 香港节点-1"), vec!["HK 01-1"]);
        assert_eq!(members(&config, "🇭🇰 香港节点-2"), vec!["HK 02-2"]);
        assert_eq!(members(&config, "🇯🇵 日本节点-1"), vec!["JP 01-1"]);
        assert!(config.outbound("🇯🇵 日本节点-2").is_none());
        assert_eq!(members(&config, "♻️ 自动选择-2"), vec!["🇭🇰 香港节点-2"]);
        // Split copies keep the template's static settings.
        let ConfigOutbound::Shape(auto) = config.outbound("♻️ 自动选择-1").unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(auto.settings["interval"], json!("3m"));
        // Unsuffixed copies are not emitted and direct stays shared.
        assert!(config.outbound(MANUAL_SELECT).is_none());
        assert!(config.outbound(GLOBAL_DIRECT).is_some());
        assert!(config.outbound("🎯 全球直连-1").is_none());
        // The global group is never suffixed.
        assert!(config.outbound("🌍 全局代理-1").is_none());
        let global = members(&config, GLOBAL_PROXY);
        assert!(global.contains(&"HK 01-1".to_string()));
        assert!(global.contains(&"HK 02-2".to_string()));
    }

    #[test]
    fn test_split_with_single_source_behaves_like_merged() {
        let config = synthesize(template(), vec![vec![socks("HK 01")]], true);
        assert!(config.outbound("HK 01").is_some());
        assert!(config.outbound(MANUAL_SELECT).is_some());
        assert!(config.outbound("🐸 手动选择-1").is_none());
    }

    #[test]
    fn test_excluded_nodes_never_appear() {
        let config = synthesize(
            template(),
            vec![vec![socks("HK Expire 2027-08-14"), socks("剩余流量：149 GB"), socks("HK 01")]],
            false,
        );

        let tags: Vec<_> = config.tags().collect();
        assert!(!tags.iter().any(|t| t.contains("Expire") || t.contains("剩余流量")));
        assert!(!all_members(&config)
            .iter()
            .any(|m| m.contains("Expire") || m.contains("剩余流量")));
        assert!(config.outbound("HK 01").is_some());
    }

    #[test]
    fn test_first_country_filter_wins() {
        // Matches both the HK and US filters; only the first applies.
        let config = synthesize(template(), vec![vec![socks("HK-US relay")]], false);
        assert_eq!(members(&config, "🇭🇰 香港节点"), vec!["HK-US relay"]);
        assert!(config.outbound("🇺🇸 美国节点").is_none());
    }

    #[test]
    fn test_duplicate_tags_keep_first() {
        let mut second = socks("Dup");
        second.server = Some("203.0.113.99".to_string());
        let config = synthesize(template(), vec![vec![socks("Dup"), second]], false);

        let dups: Vec<_> = config.tags().filter(|t| *t == "Dup").collect();
        assert_eq!(dups.len(), 1);
        let Some(ConfigOutbound::Node(node)) = config.outbound("Dup") else {
            panic!("expected a node");
        };
        assert_eq!(node.server.as_deref(), Some("203.0.113.10"));
        assert_eq!(
            members(&config, MANUAL_SELECT)
                .iter()
                .filter(|m| *m == "Dup")
                .count(),
            1
        );
    }

    #[test]
    fn test_wireguard_nodes_become_endpoints() {
        let config = synthesize(template(), vec![vec![wireguard("WG")], vec![]], false);

        let value = serde_json::to_value(&config).unwrap();
        let endpoints = value["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0],
            json!({"tag": "ep-WG-1", "type": "wireguard", "address": "198.51.100.7", "port": 51820})
        );

        let node = value["outbounds"]
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["tag"] == "WG-1")
            .unwrap();
        assert_eq!(node["endpoint"], "ep-WG-1");
        assert!(node.get("server").is_none());
        assert!(node.get("server_port").is_none());
    }

    #[test]
    fn test_empty_batches_produce_valid_groups() {
        let config = synthesize(template(), vec![vec![], vec![]], true);
        assert!(config.outbound("🇭🇰 香港节点-1").is_none());
        assert_eq!(members(&config, "🐸 手动选择-1"), vec!["🏠 Home"]);
        assert!(members(&config, "♻️ 自动选择-2").is_empty());

        let config = synthesize(template(), Vec::new(), false);
        assert!(config.outbound(DEFAULT_PROXY).is_some());
    }

    #[test]
    fn test_ruleset_sync() {
        let config = synthesize(template(), vec![vec![socks("HK 01")]], false);
        let rules = &config.route.rules;

        assert_eq!(rules.len(), 6);
        // New rules land right after the global clash-mode rule.
        assert!(rules[4].references("geosite-netflix"));
        // The existing rule is retargeted in place.
        assert!(rules[5].references("geosite-openai"));
        assert_eq!(rules[5].outbound.as_deref(), Some("🤖 AI"));
        assert_eq!(rules[4].outbound.as_deref(), Some("🎬 流媒体"));
    }

    #[test]
    fn test_ruleset_insert_positions() {
        let metadata = |map: Value| -> Metadata {
            serde_json::from_value(json!({"outboundGroupMap": {}, "ruleset_outbound_map": map}))
                .unwrap()
        };
        let rule = |v: Value| -> RouteRule { serde_json::from_value(v).unwrap() };

        let mut rules = vec![
            rule(json!({"action": "sniff"})),
            rule(json!({"rule_set": "a", "outbound": "x"})),
            rule(json!({"ip_is_private": true, "outbound": "direct"})),
        ];
        sync_rulesets(&mut rules, &metadata(json!({"b": "y", "c": "z"})));
        assert!(rules[2].references("b"));
        assert!(rules[3].references("c"));

        let mut rules: Vec<RouteRule> = (0..8).map(|i| rule(json!({"port": i}))).collect();
        sync_rulesets(&mut rules, &metadata(json!({"b": "y"})));
        assert!(rules[6].references("b"));

        let mut rules = Vec::new();
        sync_rulesets(&mut rules, &metadata(json!({"b": "y"})));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_template_is_not_shared_state() {
        let shared = template();
        let first = synthesize(shared.clone(), vec![vec![socks("HK 01")]], false);
        let second = synthesize(shared.clone(), vec![vec![socks("JP 01")]], false);

        assert!(first.outbound("JP 01").is_none());
        assert!(second.outbound("HK 01").is_none());
        assert_eq!(shared, template());
    }

    #[test]
    fn test_serialized_document_shape() {
        let config = synthesize(template(), vec![vec![socks("HK 01")]], false);
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["inbounds"][0]["tag"], "tun-in");
        assert_eq!(value["route"]["final"], "🐠 漏网之鱼");
        assert!(value["endpoints"].as_array().unwrap().is_empty());
        let first = &value["outbounds"][0];
        assert_eq!(first["tag"], DEFAULT_PROXY);
        assert_eq!(first["type"], "selector");
    }
}
