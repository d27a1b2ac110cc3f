//! Database repositories for each table.

pub mod customer_configs;
pub mod drafts;
pub mod singbox_configs;
pub mod subscriptions;
pub mod users;

pub use customer_configs::CustomerConfigRepo;
pub use drafts::DraftRepo;
pub use singbox_configs::SingboxConfigRepo;
pub use subscriptions::SubscriptionRepo;
pub use users::UserRepo;

use chrono::{DateTime, SecondsFormat, Utc};

/// Reads a stored timestamp; rows written by SQLite defaults use
/// `YYYY-MM-DD HH:MM:SS`, rows written here use RFC 3339.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Fixed-width UTC form, so stored timestamps compare as text.
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
