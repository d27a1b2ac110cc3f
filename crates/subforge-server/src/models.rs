//! API request and response models.

use serde::{Deserialize, Serialize};
use subforge_core::codec::de;
use subforge_core::{Configuration, Outbound};

/// Body of `POST /convert` and `POST /sub`.
///
/// Flags accept booleans as well as the strings sent by HTML forms.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    /// Whitespace separated subscription URLs, possibly percent-encoded.
    #[serde(default)]
    pub urls: String,
    /// Give every source its own region and selection groups.
    #[serde(default, deserialize_with = "de::flag")]
    pub is_split: bool,
    /// Use the session draft instead of the default template.
    #[serde(default, deserialize_with = "de::flag")]
    pub is_customer: bool,
}

/// Query of `GET /sub`.
#[derive(Debug, Deserialize)]
pub struct SubQuery {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_split: bool,
}

/// Response of `POST /sub`.
#[derive(Debug, Serialize)]
pub struct SubResponse {
    #[serde(rename = "subscriptionUrl")]
    pub subscription_url: String,
    pub config: Configuration,
}

/// Response of `POST /cus/save`.
#[derive(Debug, Serialize)]
pub struct DraftSavedResponse {
    pub success: bool,
    pub message: String,
}

/// Response of `GET /cus/check_draft`.
#[derive(Debug, Serialize)]
pub struct DraftStatusResponse {
    #[serde(rename = "hasDraft")]
    pub has_draft: bool,
}

/// Query of `GET /cus/fetch_proxies`.
#[derive(Debug, Deserialize)]
pub struct FetchProxiesQuery {
    /// Comma or newline separated URLs.
    #[serde(default)]
    pub urls: String,
}

/// Response of `GET /cus/fetch_proxies`.
#[derive(Debug, Serialize)]
pub struct ProxiesResponse {
    pub success: bool,
    pub proxies: Vec<Outbound>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flags_accept_strings_and_bools() {
        let req: ConvertRequest = serde_json::from_value(json!({
            "urls": "https://a.example",
            "is_split": "true",
            "is_customer": true
        }))
        .unwrap();
        assert!(req.is_split);
        assert!(req.is_customer);

        let req: ConvertRequest = serde_json::from_value(json!({"urls": "x"})).unwrap();
        assert!(!req.is_split);
        assert!(!req.is_customer);
    }

    #[test]
    fn test_camel_case_fields() {
        let status = serde_json::to_value(DraftStatusResponse { has_draft: true }).unwrap();
        assert_eq!(status, json!({"hasDraft": true}));
    }
}
