//! Data models for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version string recorded with cached configurations.
pub const DEFAULT_CONFIG_VERSION: &str = "1.8.0";

/// A persisted customer template, deduplicated by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerConfig {
    pub id: i64,
    /// SHA-256 of `json_content`.
    pub config_hash: String,
    /// The template as the client submitted it.
    pub json_content: String,
}

/// An issued subscription identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 24 hex characters.
    pub id: String,
    /// Customer template to rebuild with; `None` means the bundled default.
    pub customer_config_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One upstream subscription source of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub url: String,
    /// Content hash of the last successful fetch.
    pub last_hash: Option<String>,
    /// Raw `subscription-userinfo` header of the last fetch.
    pub user_info: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parameters for recording a subscription source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSubscription {
    pub name: String,
    pub url: String,
    pub last_hash: Option<String>,
    pub user_info: Option<String>,
}

/// A generated configuration kept as a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingboxConfig {
    pub id: i64,
    pub user_id: String,
    pub json_content: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// A session-scoped template being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftConfig {
    pub session_id: String,
    pub json_content: String,
    pub created_at: DateTime<Utc>,
}
