//! Draft template repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime};
use crate::error::Result;
use crate::models::DraftConfig;

/// Repository for session-scoped drafts.
pub struct DraftRepo;

impl DraftRepo {
    /// Insert or replace the content of a draft.
    ///
    /// Replacing keeps the original `created_at`, so a draft still expires a
    /// day after it was first saved.
    pub fn upsert(
        conn: &Connection,
        session_id: &str,
        json_content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO draft_configs (session_id, json_content, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET json_content = ?2",
            params![session_id, json_content, format_datetime(created_at)],
        )?;
        Ok(())
    }

    /// Get the draft of a session.
    pub fn get(conn: &Connection, session_id: &str) -> Result<Option<DraftConfig>> {
        let draft = conn
            .query_row(
                "SELECT session_id, json_content, created_at FROM draft_configs WHERE session_id = ?1",
                [session_id],
                |row| {
                    Ok(DraftConfig {
                        session_id: row.get(0)?,
                        json_content: row.get(1)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(draft)
    }

    /// Delete the draft of a session.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM draft_configs WHERE session_id = ?1", [session_id])?;
        Ok(deleted > 0)
    }

    /// Delete drafts created before `before`.
    pub fn delete_older_than(conn: &Connection, before: DateTime<Utc>) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM draft_configs WHERE created_at < ?1",
            [format_datetime(before)],
        )?;
        Ok(deleted)
    }
}
