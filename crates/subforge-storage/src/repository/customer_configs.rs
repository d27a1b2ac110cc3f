//! Customer template repository.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::CustomerConfig;

/// Repository for content-addressed customer templates.
pub struct CustomerConfigRepo;

impl CustomerConfigRepo {
    /// Stores a template under its hash unless that hash is already present.
    ///
    /// Returns true when a new row was written.
    pub fn insert_if_absent(conn: &Connection, config_hash: &str, json_content: &str) -> Result<bool> {
        let inserted = conn.execute(
            "INSERT INTO customer_configs (config_hash, json_content) VALUES (?1, ?2)
             ON CONFLICT(config_hash) DO NOTHING",
            params![config_hash, json_content],
        )?;
        Ok(inserted > 0)
    }

    /// Look up a template by hash.
    pub fn get_by_hash(conn: &Connection, config_hash: &str) -> Result<Option<CustomerConfig>> {
        let config = conn
            .query_row(
                "SELECT id, config_hash, json_content FROM customer_configs WHERE config_hash = ?1",
                [config_hash],
                |row| {
                    Ok(CustomerConfig {
                        id: row.get(0)?,
                        config_hash: row.get(1)?,
                        json_content: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(config)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM customer_configs", [], |row| row.get(0))?;
        Ok(count)
    }
}
