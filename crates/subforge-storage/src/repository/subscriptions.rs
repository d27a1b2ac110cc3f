//! Subscription sources repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{format_datetime, parse_datetime};
use crate::error::Result;
use crate::models::{NewSubscription, Subscription};

/// Repository for the upstream sources of a user.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// Insert a source.
    pub fn insert(
        conn: &Connection,
        user_id: &str,
        subscription: &NewSubscription,
        updated_at: DateTime<Utc>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO subscriptions (user_id, name, url, last_hash, user_info, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                subscription.name,
                subscription.url,
                subscription.last_hash,
                subscription.user_info,
                format_datetime(updated_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Sources of a user in insertion order.
    pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Subscription>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, url, last_hash, user_info, updated_at
             FROM subscriptions WHERE user_id = ?1 ORDER BY id",
        )?;

        let subscriptions = stmt
            .query_map([user_id], |row| {
                Ok(Subscription {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    url: row.get(3)?,
                    last_hash: row.get(4)?,
                    user_info: row.get(5)?,
                    updated_at: row
                        .get::<_, Option<String>>(6)?
                        .map(|s| parse_datetime(&s)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    /// Record the outcome of a refetch.
    pub fn update_hash(
        conn: &Connection,
        id: i64,
        last_hash: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE subscriptions SET last_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![last_hash, format_datetime(updated_at), id],
        )?;
        Ok(updated > 0)
    }
}
