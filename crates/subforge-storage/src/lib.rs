//! Subforge Storage - SQLite persistence layer.
//!
//! Keeps what a generated subscription link needs to be rebuilt later:
//!
//! - Users, the identity behind a subscription link
//! - Their upstream subscription sources with the last content hash
//! - Customer templates, deduplicated by SHA-256
//! - Session drafts of templates under edit
//! - A cache of each generated configuration
//!
//! # Example
//!
//! ```no_run
//! use subforge_storage::{Database, NewSubscription};
//!
//! let db = Database::in_memory().unwrap();
//!
//! let hash = db.save_customer_config("[{\"outbounds\":[]},{\"outboundGroupMap\":{}}]").unwrap();
//! db.create_user(
//!     "0123456789abcdef01234567",
//!     Some(&hash),
//!     &[NewSubscription {
//!         name: "Subscription 1".into(),
//!         url: "https://example.com/sub".into(),
//!         ..Default::default()
//!     }],
//!     "{}",
//! )
//! .unwrap();
//! ```

mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{
    CustomerConfig, DraftConfig, NewSubscription, SingboxConfig, Subscription, User,
    DEFAULT_CONFIG_VERSION,
};
pub use pool::ConnectionPool;
