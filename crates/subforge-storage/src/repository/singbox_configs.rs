//! Generated configuration cache.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime};
use crate::error::Result;
use crate::models::SingboxConfig;

/// Repository for cached configurations.
pub struct SingboxConfigRepo;

impl SingboxConfigRepo {
    /// Insert a cached configuration.
    pub fn insert(
        conn: &Connection,
        user_id: &str,
        json_content: &str,
        version: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO singbox_configs (user_id, json_content, version, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, json_content, version, format_datetime(created_at)],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// The most recent cache entry of a user.
    pub fn latest_for_user(conn: &Connection, user_id: &str) -> Result<Option<SingboxConfig>> {
        let config = conn
            .query_row(
                "SELECT id, user_id, json_content, version, created_at
                 FROM singbox_configs WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                [user_id],
                |row| {
                    Ok(SingboxConfig {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        json_content: row.get(2)?,
                        version: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;

        Ok(config)
    }
}
