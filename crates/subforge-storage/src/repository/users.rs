//! Users repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime};
use crate::error::Result;
use crate::models::User;

/// Repository for issued subscription identities.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user.
    pub fn insert(
        conn: &Connection,
        id: &str,
        customer_config_hash: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO users (id, customer_config_hash, created_at) VALUES (?1, ?2, ?3)",
            params![id, customer_config_hash, format_datetime(created_at)],
        )?;
        Ok(())
    }

    /// Get a user by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, customer_config_hash, created_at FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        customer_config_hash: row.get(1)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    /// Delete a user together with its sources and cached configurations.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}
