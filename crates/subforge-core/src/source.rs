//! Subscription body recognition.
//!
//! A subscription is one of: a Clash-style YAML document with a `proxies`
//! list, a plain share-link list, or either of those wrapped in Base64.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value as YamlValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::codec::try_decode_base64;
use crate::error::SourceError;
use crate::link;
use crate::model::ProxyRecord;

static LINK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(vless|vmess|ss|ssr|trojan|hysteria2|hy2|tuic|socks5)://")
        .expect("Invalid regex pattern")
});

/// Records recovered from one subscription body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub records: Vec<ProxyRecord>,
    /// SHA-256 of the text interpretation that was accepted.
    pub hash: String,
}

/// Interprets a subscription body.
pub fn extract(raw: &str) -> Result<Extracted, SourceError> {
    if raw.trim().is_empty() {
        return Err(SourceError::Empty);
    }

    if let Some(records) = parse_content(raw) {
        return Ok(Extracted {
            records,
            hash: content_hash(raw),
        });
    }

    debug!("raw content not recognized, trying Base64");
    let decoded = try_decode_base64(raw).ok_or(SourceError::Unrecognized)?;
    let records = parse_content(&decoded).ok_or(SourceError::Unrecognized)?;
    Ok(Extracted {
        records,
        hash: content_hash(&decoded),
    })
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_content(text: &str) -> Option<Vec<ProxyRecord>> {
    if let Some(records) = parse_yaml(text) {
        info!(count = records.len(), "parsed structured proxy document");
        return Some(records);
    }

    if LINK_LINE.is_match(text) {
        let records = link::decode_list(text);
        if !records.is_empty() {
            info!(count = records.len(), "parsed share-link list");
            return Some(records);
        }
    }
    None
}

/// Reads the `proxies` list of a YAML document, skipping bad entries.
fn parse_yaml(text: &str) -> Option<Vec<ProxyRecord>> {
    let document: YamlValue = serde_yaml::from_str(text).ok()?;
    let entries = document.get("proxies")?.as_sequence()?;

    let records = entries
        .iter()
        .cloned()
        .filter_map(|mut entry| {
            if let Some(YamlValue::String(kind)) = entry.get_mut("type") {
                *kind = kind.to_lowercase();
            }
            match serde_yaml::from_value::<ProxyRecord>(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "skipping proxy entry");
                    None
                }
            }
        })
        .collect();
    Some(records)
}

mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut hex = String::with_capacity(bytes.len() * 2);
        for &byte in bytes {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }
}
