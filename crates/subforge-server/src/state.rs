//! Application state for the API server.

use std::sync::Arc;

use serde_json::Value;
use subforge_core::{Template, TemplateError};
use subforge_storage::Database;

use crate::fetch::Fetcher;

/// The bundled default template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/template.json");

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Arc<Database>,
    /// Source of subscription bodies.
    pub fetcher: Arc<dyn Fetcher>,
    /// Default template as served to clients.
    pub default_template: Arc<Value>,
}

impl AppState {
    /// Creates state around the bundled default template.
    pub fn new(db: Database, fetcher: Arc<dyn Fetcher>) -> Result<Self, TemplateError> {
        Self::with_template(db, fetcher, serde_json::from_str(DEFAULT_TEMPLATE)?)
    }

    /// Creates state with a custom default template.
    ///
    /// The template is validated up front so later parses cannot fail.
    pub fn with_template(
        db: Database,
        fetcher: Arc<dyn Fetcher>,
        default_template: Value,
    ) -> Result<Self, TemplateError> {
        Template::from_value(default_template.clone())?;

        Ok(Self {
            db: Arc::new(db),
            fetcher,
            default_template: Arc::new(default_template),
        })
    }

    /// A fresh copy of the default template.
    pub fn default_template(&self) -> Result<Template, TemplateError> {
        Template::from_value(self.default_template.as_ref().clone())
    }
}
