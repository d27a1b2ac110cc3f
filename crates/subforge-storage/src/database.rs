//! High-level database interface.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use directories::ProjectDirs;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::models::{
    CustomerConfig, DraftConfig, NewSubscription, SingboxConfig, Subscription, User,
    DEFAULT_CONFIG_VERSION,
};
use crate::pool::ConnectionPool;
use crate::repository::{
    CustomerConfigRepo, DraftRepo, SingboxConfigRepo, SubscriptionRepo, UserRepo,
};

/// High-level database interface for Subforge.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "subforge", "subforge")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("subforge.db"))
    }

    // === Customer templates ===

    /// Persist a template keyed by the SHA-256 of its text and return the key.
    pub fn save_customer_config(&self, json_content: &str) -> Result<String> {
        let conn = self.pool.get()?;
        let hash = subforge_core::content_hash(json_content);

        if CustomerConfigRepo::insert_if_absent(&conn, &hash, json_content)? {
            info!(hash = %hash, "stored new customer template");
        }
        Ok(hash)
    }

    /// Look up a customer template by hash.
    pub fn customer_config(&self, hash: &str) -> Result<Option<CustomerConfig>> {
        let conn = self.pool.get()?;
        CustomerConfigRepo::get_by_hash(&conn, hash)
    }

    // === Users ===

    /// Issue a user with its sources and the configuration built for them.
    ///
    /// All rows are written in one transaction.
    pub fn create_user(
        &self,
        id: &str,
        customer_config_hash: Option<&str>,
        subscriptions: &[NewSubscription],
        config_json: &str,
    ) -> Result<User> {
        let conn = self.pool.get()?;
        let now = Utc::now();

        let tx = conn.unchecked_transaction()?;
        UserRepo::insert(&tx, id, customer_config_hash, now)?;
        for subscription in subscriptions {
            SubscriptionRepo::insert(&tx, id, subscription, now)?;
        }
        SingboxConfigRepo::insert(&tx, id, config_json, DEFAULT_CONFIG_VERSION, now)?;
        tx.commit()?;

        info!(user = id, sources = subscriptions.len(), "created subscription user");
        UserRepo::get(&conn, id)?.ok_or_else(|| StorageError::NotFound(format!("user {id}")))
    }

    /// Get a user by ID.
    pub fn user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        UserRepo::get(&conn, id)
    }

    /// Delete a user and everything attached to it.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        UserRepo::delete(&conn, id)
    }

    /// Sources of a user in the order they were submitted.
    pub fn subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let conn = self.pool.get()?;
        SubscriptionRepo::list_for_user(&conn, user_id)
    }

    /// Record the hash of a refetched source.
    pub fn touch_subscription(&self, id: i64, last_hash: Option<&str>) -> Result<bool> {
        let conn = self.pool.get()?;
        SubscriptionRepo::update_hash(&conn, id, last_hash, Utc::now())
    }

    /// Latest cached configuration of a user.
    pub fn cached_config(&self, user_id: &str) -> Result<Option<SingboxConfig>> {
        let conn = self.pool.get()?;
        SingboxConfigRepo::latest_for_user(&conn, user_id)
    }

    // === Drafts ===

    /// Save the draft of a session.
    pub fn save_draft(&self, session_id: &str, json_content: &str) -> Result<()> {
        let conn = self.pool.get()?;
        DraftRepo::upsert(&conn, session_id, json_content, Utc::now())
    }

    /// Get the draft of a session.
    pub fn draft(&self, session_id: &str) -> Result<Option<DraftConfig>> {
        let conn = self.pool.get()?;
        DraftRepo::get(&conn, session_id)
    }

    pub fn has_draft(&self, session_id: &str) -> Result<bool> {
        Ok(self.draft(session_id)?.is_some())
    }

    /// Delete the draft of a session.
    pub fn delete_draft(&self, session_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        DraftRepo::delete(&conn, session_id)
    }

    /// Delete drafts older than `max_age`.
    pub fn prune_drafts(&self, max_age: Duration) -> Result<usize> {
        let conn = self.pool.get()?;
        let removed = DraftRepo::delete_older_than(&conn, Utc::now() - max_age)?;
        if removed > 0 {
            debug!(removed, "pruned expired drafts");
        }
        Ok(removed)
    }
}
