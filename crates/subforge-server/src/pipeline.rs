//! Per-request conversion pipeline: fetch every source, recognise and convert
//! its body, then synthesize the configuration.

use futures::future::join_all;
use percent_encoding::percent_decode_str;
use tracing::{info, warn};

use subforge_core::template::Metadata;
use subforge_core::{convert_batch, extract, filter, synthesize, Configuration, Outbound, Template};

use crate::fetch::Fetcher;

/// How many rounds of percent-decoding URL input gets.
const MAX_URL_DECODE_ROUNDS: usize = 3;

/// The outcome of one source.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub outbounds: Vec<Outbound>,
    /// Content hash; `None` when the source failed.
    pub hash: Option<String>,
    pub user_info: Option<String>,
}

/// A synthesized configuration with the per-source results behind it.
#[derive(Debug)]
pub struct Build {
    pub config: Configuration,
    pub sources: Vec<SourceBatch>,
}

/// Extracts subscription URLs from free-form input.
///
/// Input may arrive percent-encoded, sometimes more than once.
pub fn parse_subscription_urls(raw: &str) -> Vec<String> {
    let mut decoded = raw.to_string();
    for _ in 0..MAX_URL_DECODE_ROUNDS {
        if !decoded.contains('%') {
            break;
        }
        match percent_decode_str(&decoded).decode_utf8() {
            Ok(next) => decoded = next.into_owned(),
            Err(_) => break,
        }
    }

    decoded
        .split_whitespace()
        .filter(|token| token.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Splits a comma or newline separated URL list.
pub fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|token| token.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Percent-decodes a fetched body when that makes it shorter.
fn decode_body(body: String) -> String {
    if !body.contains('%') {
        return body;
    }
    match percent_decode_str(&body).decode_utf8() {
        Ok(decoded) if decoded.len() < body.len() => decoded.into_owned(),
        _ => body,
    }
}

/// Fetches and converts every source concurrently.
///
/// The result has one batch per URL in input order. A source that cannot be
/// fetched or recognised yields an empty batch.
pub async fn fetch_batches(
    fetcher: &dyn Fetcher,
    urls: &[String],
    metadata: &Metadata,
) -> Vec<SourceBatch> {
    let excluded =
        filter::compile_all(metadata.filter.excluded_outbounds.iter().map(String::as_str));

    let batches = join_all(urls.iter().map(|url| fetch_one(fetcher, url))).await;
    batches
        .into_iter()
        .map(|mut batch| {
            batch
                .outbounds
                .retain(|o| !excluded.iter().any(|f| f.is_match(&o.tag)));
            batch
        })
        .collect()
}

async fn fetch_one(fetcher: &dyn Fetcher, url: &str) -> SourceBatch {
    let fetched = match fetcher.fetch(url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(url, error = %e, "subscription fetch failed");
            return SourceBatch::default();
        }
    };

    match extract(&decode_body(fetched.body)) {
        Ok(extracted) => {
            let outbounds = convert_batch(extracted.records);
            info!(url, nodes = outbounds.len(), "source converted");
            SourceBatch {
                outbounds,
                hash: Some(extracted.hash),
                user_info: fetched.user_info,
            }
        }
        Err(e) => {
            warn!(url, error = %e, "subscription body not recognised");
            SourceBatch {
                user_info: fetched.user_info,
                ..SourceBatch::default()
            }
        }
    }
}

/// Runs the whole pipeline for one template.
pub async fn build(fetcher: &dyn Fetcher, urls: &[String], template: Template, split: bool) -> Build {
    let sources = fetch_batches(fetcher, urls, &template.metadata).await;
    let batches = sources.iter().map(|s| s.outbounds.clone()).collect();
    let config = synthesize(template, batches, split);

    Build { config, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use serde_json::json;

    fn metadata() -> Metadata {
        serde_json::from_value(json!({
            "outboundGroupMap": {},
            "filter": {"excluded_outbounds": ["(?i)expire"]}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_urls_decodes_and_filters() {
        let raw = "https%253A%252F%252Fa.example%252Fsub%0Aftp://x https://b.example/s";
        assert_eq!(
            parse_subscription_urls(raw),
            vec!["https://a.example/sub", "https://b.example/s"]
        );
    }

    #[test]
    fn test_parse_urls_without_encoding() {
        assert_eq!(
            parse_subscription_urls("  https://a.example\n\n http://b.example  "),
            vec!["https://a.example", "http://b.example"]
        );
        assert!(parse_subscription_urls("not a url").is_empty());
    }

    #[test]
    fn test_split_url_list() {
        assert_eq!(
            split_url_list("https://a.example, https://b.example\nfoo"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_decode_body_only_when_shorter() {
        assert_eq!(decode_body("plain".into()), "plain");
        assert_eq!(decode_body("a%20b".into()), "a b");
        // Not valid percent-encoding: nothing decodes, length unchanged.
        assert_eq!(decode_body("100%".into()), "100%");
    }

    #[tokio::test]
    async fn test_batches_keep_order_and_isolate_failures() {
        let fetcher = StubFetcher::new([
            (
                "https://a.example",
                "trojan://p@a.example.com:443#A1\ntrojan://p@a.example.com:443#Expire 2030",
            ),
            ("https://c.example", "<html>nope</html>"),
            ("https://d.example", "ss://YWVzLTEyOC1nY206dGVzdA@d.example.com:8388#D1"),
        ]);
        let urls: Vec<String> = ["https://a.example", "https://b.example", "https://c.example", "https://d.example"]
            .into_iter()
            .map(String::from)
            .collect();

        let batches = fetch_batches(&fetcher, &urls, &metadata()).await;
        assert_eq!(batches.len(), 4);

        let tags: Vec<_> = batches[0].outbounds.iter().map(|o| o.tag.as_str()).collect();
        assert_eq!(tags, vec!["A1"]);
        assert!(batches[0].hash.is_some());

        // 404
        assert!(batches[1].outbounds.is_empty());
        assert!(batches[1].hash.is_none());
        // Unrecognised body
        assert!(batches[2].outbounds.is_empty());
        assert!(batches[2].hash.is_none());

        assert_eq!(batches[3].outbounds[0].tag, "D1");
    }

    #[tokio::test]
    async fn test_build_synthesizes() {
        let fetcher = StubFetcher::new([("https://a.example", "trojan://p@a.example.com:443#A1")]);
        let template = Template::from_value(json!([
            {"outbounds": [{"tag": "🐸 手动选择", "type": "selector"}]},
            {"outboundGroupMap": {"🐸 手动选择": "基本分组"}}
        ]))
        .unwrap();

        let build = build(&fetcher, &["https://a.example".to_string()], template, false).await;
        assert_eq!(build.sources.len(), 1);
        assert_eq!(
            build.config.members("🐸 手动选择").unwrap(),
            ["A1".to_string()].as_slice()
        );
    }
}
