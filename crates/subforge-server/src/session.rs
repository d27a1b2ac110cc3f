//! Draft sessions carried in a cookie.
//!
//! A session id is `<creation millis>_<random hex>`. Ids whose timestamp is
//! more than a day old are treated as absent.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use rand::Rng;

/// Cookie holding the session id.
pub const SESSION_COOKIE: &str = "sub_session_id";

/// Lifetime of a session and of its draft.
pub const SESSION_TTL: Duration = Duration::hours(24);

/// A draft session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session id stamped with the current time.
    pub fn generate() -> Self {
        Self(format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            random_hex(16)
        ))
    }

    /// Reads the session cookie, ignoring expired ids.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
            })?;

        Self::parse(raw, Utc::now().timestamp_millis())
    }

    fn parse(raw: &str, now_millis: i64) -> Option<Self> {
        if let Some((stamp, _)) = raw.split_once('_') {
            if let Ok(created) = stamp.parse::<i64>() {
                if now_millis - created > SESSION_TTL.num_milliseconds() {
                    return None;
                }
            }
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Set-Cookie` value issuing this session.
    pub fn set_cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.0)
    }
}

/// `len` random bytes as lowercase hex.
pub(crate) fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
